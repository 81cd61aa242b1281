use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use framefuse_frame::{decode_frame, ByteOrder, ElementType, FrameDescriptor};
use framefuse_source::{FrameSource, SourceError, TransportConfig, TransportKind};
use tracing::{debug, error, info, trace, warn};

use crate::channel::{ChannelId, TaggedFrame};
use crate::error::{PipelineError, Result};
use crate::queue::FrameSink;

/// Idle wait between reads when the source has no complete frame.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2);

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle of a channel reader. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Constructed, loop not started.
    Idle,
    /// Loop thread is running.
    Running,
    /// Loop has been asked to stop or has exited.
    Stopped,
}

impl ReaderState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            IDLE => ReaderState::Idle,
            RUNNING => ReaderState::Running,
            _ => ReaderState::Stopped,
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReaderState::Idle => "idle",
            ReaderState::Running => "running",
            ReaderState::Stopped => "stopped",
        })
    }
}

/// Construction-time configuration of one channel reader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    /// Channel identity; must be unique among attached readers.
    pub name: String,
    pub element_type: ElementType,
    pub shape: Vec<usize>,
    pub byte_order: ByteOrder,
    pub transport: TransportConfig,
    /// Sleep between polls when no complete frame is buffered.
    pub poll_interval: Duration,
}

impl ReaderConfig {
    pub fn new(
        name: impl Into<String>,
        element_type: ElementType,
        shape: impl Into<Vec<usize>>,
        transport: TransportConfig,
    ) -> Self {
        Self {
            name: name.into(),
            element_type,
            shape: shape.into(),
            byte_order: ByteOrder::default(),
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn descriptor(&self) -> Result<FrameDescriptor> {
        Ok(FrameDescriptor::with_byte_order(
            self.element_type,
            self.shape.clone(),
            self.byte_order,
        )?)
    }
}

/// Live counters of one reader.
#[derive(Debug, Default)]
pub struct ReaderStats {
    frames: AtomicU64,
    decode_errors: AtomicU64,
    read_errors: AtomicU64,
}

impl ReaderStats {
    /// Frames decoded and handed to the queue.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Raw buffers dropped because they did not decode.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Failed read attempts on the source.
    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: AtomicU8,
    stop: AtomicBool,
    stats: ReaderStats,
}

impl Shared {
    fn state(&self) -> ReaderState {
        ReaderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: u8) {
        self.state.store(state, Ordering::Release);
    }
}

/// Cheap, cloneable view of a reader for introspection.
#[derive(Debug, Clone)]
pub struct ReaderHandle {
    id: ChannelId,
    descriptor: FrameDescriptor,
    transport: TransportKind,
    shared: Arc<Shared>,
}

impl ReaderHandle {
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn state(&self) -> ReaderState {
        self.shared.state()
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.shared.stats
    }
}

/// One channel: a frame source, its descriptor and the thread that reads it.
///
/// `start` hands the source to a dedicated thread which loops
/// read -> decode -> push until `stop` is requested. `join` waits for that
/// thread and takes the source back. Dropping a running reader stops and
/// joins it.
pub struct ChannelReader {
    id: ChannelId,
    descriptor: FrameDescriptor,
    transport: TransportKind,
    poll_interval: Duration,
    source: Option<Box<dyn FrameSource>>,
    worker: Option<JoinHandle<Box<dyn FrameSource>>>,
    shared: Arc<Shared>,
}

impl ChannelReader {
    /// Create an idle reader over an already prepared source.
    pub fn new(
        id: impl Into<ChannelId>,
        descriptor: FrameDescriptor,
        source: Box<dyn FrameSource>,
    ) -> Self {
        Self {
            id: id.into(),
            descriptor,
            transport: source.kind(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            source: Some(source),
            worker: None,
            shared: Arc::default(),
        }
    }

    /// Build the source described by `config` and connect it.
    ///
    /// Placeholder transports fail here with `NotImplemented`. Any other
    /// connect failure is logged and the reader is returned unconnected; its
    /// loop then reports read errors instead of frames. Connecting is not
    /// retried.
    pub fn from_config(config: &ReaderConfig) -> Result<Self> {
        let descriptor = config.descriptor()?;
        let mut source = config.transport.build()?;

        match source.connect() {
            Ok(()) => {}
            Err(err @ SourceError::NotImplemented { .. }) => return Err(err.into()),
            Err(err) => {
                error!(channel = %config.name, error = %err, "channel source failed to connect");
            }
        }

        let reader = Self::new(config.name.as_str(), descriptor, source);
        Ok(reader.with_poll_interval(config.poll_interval))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ReaderState {
        self.shared.state()
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.shared.stats
    }

    pub fn handle(&self) -> ReaderHandle {
        ReaderHandle {
            id: self.id.clone(),
            descriptor: self.descriptor.clone(),
            transport: self.transport,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether the source is connected. Only known while the loop is not
    /// running (the thread owns the source meanwhile).
    pub fn is_connected(&self) -> Option<bool> {
        self.source.as_ref().map(|s| s.is_connected())
    }

    /// Start the read loop on its own thread, pushing into `sink`.
    pub fn start(&mut self, sink: FrameSink) -> Result<()> {
        let state = self.state();
        let source = match (state, self.source.take()) {
            (ReaderState::Idle, Some(source)) => source,
            (_, source) => {
                self.source = source;
                return Err(PipelineError::InvalidState {
                    channel: self.id.clone(),
                    state,
                    action: "start",
                });
            }
        };

        self.shared.set_state(RUNNING);
        let worker = ReadLoop {
            id: self.id.clone(),
            descriptor: self.descriptor.clone(),
            poll_interval: self.poll_interval,
            sink,
            shared: Arc::clone(&self.shared),
        };

        let spawned = thread::Builder::new()
            .name(format!("framefuse-{}", self.id))
            .spawn(move || worker.run(source));
        match spawned {
            Ok(handle) => {
                debug!(channel = %self.id, "reader thread started");
                self.worker = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.shared.set_state(STOPPED);
                Err(PipelineError::Spawn {
                    channel: self.id.clone(),
                    source,
                })
            }
        }
    }

    /// Ask the loop to exit. Returns immediately; the loop notices within
    /// one poll interval. A reader that was never started becomes stopped.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        let _ = self.shared.state.compare_exchange(
            IDLE,
            STOPPED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Wait for the loop thread to exit and take the source back.
    pub fn join(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let joined = worker.join();
        self.shared.set_state(STOPPED);
        match joined {
            Ok(source) => {
                self.source = Some(source);
                debug!(channel = %self.id, "reader thread joined");
                Ok(())
            }
            Err(_) => Err(PipelineError::ReaderPanicked(self.id.clone())),
        }
    }

    /// `stop` followed by `join`.
    pub fn shutdown(&mut self) -> Result<()> {
        self.stop();
        self.join()
    }

    /// Close the source. Fails while the loop is running.
    pub fn close(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(PipelineError::InvalidState {
                channel: self.id.clone(),
                state: self.state(),
                action: "close",
            });
        }
        if let Some(source) = self.source.as_mut() {
            source.close()?;
        }
        Ok(())
    }
}

impl Drop for ChannelReader {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(channel = %self.id, error = %err, "reader did not shut down cleanly");
        }
        if let Some(source) = self.source.as_mut() {
            if let Err(err) = source.close() {
                warn!(channel = %self.id, error = %err, "source did not close cleanly");
            }
        }
    }
}

impl fmt::Debug for ChannelReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelReader")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("transport", &self.transport)
            .field("state", &self.state())
            .finish()
    }
}

/// Everything the reader thread needs besides the source itself.
struct ReadLoop {
    id: ChannelId,
    descriptor: FrameDescriptor,
    poll_interval: Duration,
    sink: FrameSink,
    shared: Arc<Shared>,
}

impl ReadLoop {
    fn run(self, mut source: Box<dyn FrameSource>) -> Box<dyn FrameSource> {
        let frame_size = self.descriptor.frame_size();
        let stats = &self.shared.stats;
        let mut failing = false;

        info!(channel = %self.id, frame_size, transport = %source.kind(), "reader loop started");

        while !self.shared.stop.load(Ordering::Acquire) {
            let raw = match source.read(frame_size) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    thread::sleep(self.poll_interval);
                    continue;
                }
                Err(err) => {
                    stats.read_errors.fetch_add(1, Ordering::Relaxed);
                    if !failing {
                        warn!(channel = %self.id, error = %err, "channel read failed; still polling");
                        failing = true;
                    }
                    thread::sleep(self.poll_interval);
                    continue;
                }
            };

            if failing {
                info!(channel = %self.id, "channel recovered");
                failing = false;
            }

            let frame = match decode_frame(&self.descriptor, &raw) {
                Ok(frame) => frame,
                Err(err) => {
                    stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(channel = %self.id, error = %err, "dropping undecodable frame");
                    continue;
                }
            };

            stats.frames.fetch_add(1, Ordering::Relaxed);
            trace!(channel = %self.id, "frame decoded");
            if self.sink.push(TaggedFrame::new(self.id.clone(), frame)).is_err() {
                debug!(channel = %self.id, "hand-off queue closed; reader exiting");
                break;
            }
        }

        self.shared.set_state(STOPPED);
        info!(channel = %self.id, frames = stats.frames(), "reader loop stopped");
        source
    }
}
