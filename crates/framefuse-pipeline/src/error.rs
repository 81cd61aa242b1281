use crate::channel::ChannelId;
use crate::reader::ReaderState;
use crate::step::CombineError;

/// Errors that can occur in pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Frame source error.
    #[error("source error: {0}")]
    Source(#[from] framefuse_source::SourceError),

    /// Frame description or codec error.
    #[error("frame error: {0}")]
    Frame(#[from] framefuse_frame::FrameError),

    /// A reader with this channel identity is already attached.
    #[error("channel {0} is already attached")]
    DuplicateChannel(ChannelId),

    /// No reader with this channel identity is attached.
    #[error("channel {0} is not attached")]
    UnknownChannel(ChannelId),

    /// The reader is not in a state that allows the operation.
    #[error("cannot {action} reader {channel} while {state}")]
    InvalidState {
        channel: ChannelId,
        state: ReaderState,
        action: &'static str,
    },

    /// The combination step was never provided.
    #[error("combination step is not implemented")]
    NotImplemented,

    /// The combination step failed and the error policy is `Stop`.
    #[error("combination step failed: {0}")]
    Combine(#[source] CombineError),

    /// `run` or `poll` was called while another loop holds the combiner.
    #[error("combiner loop is already running")]
    AlreadyRunning,

    /// The reader thread panicked instead of exiting cleanly.
    #[error("reader thread for channel {0} panicked")]
    ReaderPanicked(ChannelId),

    /// The OS refused to spawn a reader thread.
    #[error("failed to spawn reader thread for channel {channel}: {source}")]
    Spawn {
        channel: ChannelId,
        source: std::io::Error,
    },
}

impl From<CombineError> for PipelineError {
    fn from(err: CombineError) -> Self {
        match err {
            CombineError::NotImplemented => PipelineError::NotImplemented,
            other => PipelineError::Combine(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
