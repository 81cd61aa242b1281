use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::traits::{FrameSource, TransportKind};

type Shared = Arc<Mutex<BytesMut>>;

fn lock(buf: &Shared) -> MutexGuard<'_, BytesMut> {
    // A panicking writer cannot leave a BytesMut half-updated.
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process frame source.
///
/// Bytes written through the paired [`MemoryLink`] become readable here,
/// with the same all-or-nothing `read(n)` contract as a serial port.
#[derive(Debug)]
pub struct MemorySource {
    buf: Shared,
    connected: bool,
}

/// Writing end of a [`MemorySource`].
#[derive(Debug, Clone)]
pub struct MemoryLink {
    buf: Shared,
}

impl MemorySource {
    /// Create a connected source and the link that feeds it.
    pub fn pair() -> (Self, MemoryLink) {
        let buf = Shared::default();
        let source = Self {
            buf: Arc::clone(&buf),
            connected: true,
        };
        (source, MemoryLink { buf })
    }

    /// Create a connected source preloaded with `bytes`.
    pub fn with_bytes(bytes: &[u8]) -> (Self, MemoryLink) {
        let (source, link) = Self::pair();
        link.write(bytes);
        (source, link)
    }
}

impl MemoryLink {
    /// Append bytes to the link.
    pub fn write(&self, bytes: &[u8]) {
        lock(&self.buf).extend_from_slice(bytes);
    }

    /// Bytes written but not yet read.
    pub fn pending(&self) -> usize {
        lock(&self.buf).len()
    }
}

impl FrameSource for MemorySource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Option<Bytes>> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        let mut buf = lock(&self.buf);
        if buf.len() < n {
            return Ok(None);
        }
        Ok(Some(buf.split_to(n).freeze()))
    }

    fn close(&mut self) -> Result<()> {
        if self.connected {
            debug!("closing memory link");
        }
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Memory
    }
}
