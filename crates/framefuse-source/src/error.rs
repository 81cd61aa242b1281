use std::path::PathBuf;

use crate::traits::TransportKind;

/// Errors that can occur in frame source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No address was configured and no link of this medium was found.
    #[error("no {kind} link available")]
    NoLinkAvailable { kind: TransportKind },

    /// Failed to open or configure the link.
    #[error("failed to connect to {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The transport exists as a placeholder only.
    #[error("{kind} transport is not implemented")]
    NotImplemented { kind: TransportKind },

    /// A read was attempted before `connect` succeeded (or after `close`).
    #[error("source is not connected")]
    NotConnected,

    /// An I/O error occurred on an open link.
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
