use crate::latest::LatestFrames;

/// Errors a combination step can report.
#[derive(Debug, thiserror::Error)]
pub enum CombineError {
    /// No combination algorithm was supplied.
    #[error("combination step is not implemented")]
    NotImplemented,

    /// The algorithm rejected its input or failed internally.
    #[error(transparent)]
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl CombineError {
    pub fn failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        CombineError::Failed(err.into())
    }
}

/// The per-application algorithm run once per received frame.
///
/// `combine` sees the latest frame of every channel that has produced one so
/// far, not just the frame that triggered the call. Channels that have not
/// produced yet are simply absent.
///
/// Closures of the form `FnMut(&LatestFrames) -> Result<(), CombineError>`
/// implement this trait.
pub trait CombineStep: Send {
    fn combine(&mut self, latest: &LatestFrames) -> Result<(), CombineError> {
        let _ = latest;
        Err(CombineError::NotImplemented)
    }
}

impl<F> CombineStep for F
where
    F: FnMut(&LatestFrames) -> Result<(), CombineError> + Send,
{
    fn combine(&mut self, latest: &LatestFrames) -> Result<(), CombineError> {
        self(latest)
    }
}

/// Placeholder step for a combiner whose algorithm has not been written yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingStep;

impl CombineStep for MissingStep {}
