//! Fan-in of fixed-shape sensor frames from many links into one combination
//! step.
//!
//! Each channel reads raw frames from its own link on its own thread; a single
//! combiner keeps the latest frame of every channel and runs an
//! application-provided step once per received frame.
//!
//! # Crate Structure
//!
//! - [`source`]: link abstraction (serial, in-memory, wireless placeholders)
//! - [`frame`]: frame descriptors and the raw fixed-shape codec
//! - [`pipeline`]: channel readers, the hand-off queue and the combiner

/// Re-export source types.
pub mod source {
    pub use framefuse_source::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framefuse_frame::*;
}

/// Re-export pipeline types.
pub mod pipeline {
    pub use framefuse_pipeline::*;
}
