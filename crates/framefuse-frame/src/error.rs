/// Errors that can occur while describing, decoding or encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame shape needs at least one dimension.
    #[error("frame shape must have at least one dimension")]
    EmptyShape,

    /// Every dimension must be positive.
    #[error("frame dimension {axis} is zero")]
    ZeroDimension { axis: usize },

    /// The frame byte size does not fit in `usize`.
    #[error("frame size overflows for shape {shape:?}")]
    SizeOverflow { shape: Vec<usize> },

    /// The raw buffer is not exactly one frame long.
    #[error("frame buffer is {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A frame does not match the descriptor it is encoded against.
    #[error("frame does not match descriptor: {0}")]
    ShapeMismatch(String),

    /// An element type name could not be parsed.
    #[error("unknown element type {0:?}")]
    UnknownElementType(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
