//! Fan-in pipeline: many channel readers, one combiner.
//!
//! Each [`ChannelReader`] owns a frame source and runs on its own thread,
//! decoding fixed-size frames and pushing them onto one shared
//! [`HandoffQueue`]. The [`Combiner`] drains that queue, keeps the most
//! recent frame per channel in [`LatestFrames`], and calls the injected
//! [`CombineStep`] once per received frame with the whole mapping.

pub mod channel;
pub mod combiner;
pub mod error;
pub mod latest;
pub mod queue;
pub mod reader;
pub mod step;

pub use channel::{ChannelId, TaggedFrame};
pub use combiner::{
    Combiner, CombinerConfig, ErrorPolicy, StalePolicy, StopHandle, DEFAULT_POLL_TIMEOUT,
};
pub use error::{PipelineError, Result};
pub use latest::LatestFrames;
pub use queue::{FrameSink, Handoff, HandoffQueue, QueueClosed};
pub use reader::{
    ChannelReader, ReaderConfig, ReaderHandle, ReaderState, ReaderStats, DEFAULT_POLL_INTERVAL,
};
pub use step::{CombineError, CombineStep, MissingStep};
