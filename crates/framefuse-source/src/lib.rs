//! Byte-oriented frame sources.
//!
//! A frame source wraps one point-to-point link and hands out fixed-size
//! chunks of bytes, never partial ones:
//! - Serial links (Unix termios)
//! - In-memory links (tests, replay)
//! - Short-range and local-network wireless (not yet available)
//!
//! This is the lowest layer of framefuse. Channel readers sit on top of the
//! [`FrameSource`] trait defined here.

pub mod config;
pub mod error;
pub mod memory;
pub mod stub;
pub mod traits;

#[cfg(unix)]
pub mod serial;

pub use config::{BluetoothConfig, SerialConfig, TransportConfig, WifiConfig};
pub use error::{Result, SourceError};
pub use memory::{MemoryLink, MemorySource};
pub use stub::{BluetoothSource, WifiSource};
pub use traits::{FrameSource, TransportKind};

#[cfg(unix)]
pub use serial::{available_ports, SerialSource};
