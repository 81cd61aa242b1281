use std::fmt;

use bytes::Bytes;

use crate::error::Result;

/// The medium a frame source talks over.
///
/// Closed set: adding a transport means adding a variant here and a matching
/// [`TransportConfig`](crate::TransportConfig) arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Point-to-point serial link.
    Serial,
    /// Short-range wireless (placeholder).
    Bluetooth,
    /// Local-network wireless (placeholder).
    Wifi,
    /// In-process byte link.
    Memory,
}

impl TransportKind {
    /// Stable lowercase name, as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Serial => "serial",
            TransportKind::Bluetooth => "bluetooth",
            TransportKind::Wifi => "wifi",
            TransportKind::Memory => "memory",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A byte-oriented link that yields whole frames' worth of bytes.
///
/// Implementations must never block waiting for data and never return a
/// partial read: `read(n)` is either exactly `n` bytes or `None`.
pub trait FrameSource: Send {
    /// Open the underlying link. Reconnecting closes the previous link first.
    fn connect(&mut self) -> Result<()>;

    /// Take exactly `n` bytes if at least `n` are buffered, otherwise `None`.
    fn read(&mut self, n: usize) -> Result<Option<Bytes>>;

    /// Release the link. Safe to call any number of times.
    fn close(&mut self) -> Result<()>;

    /// Whether the link is currently open.
    fn is_connected(&self) -> bool;

    /// Transport name for diagnostics.
    fn kind(&self) -> TransportKind;
}

impl fmt::Debug for dyn FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("kind", &self.kind())
            .field("connected", &self.is_connected())
            .finish()
    }
}
