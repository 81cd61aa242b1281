use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channel::ChannelId;
use crate::error::{PipelineError, Result};
use crate::latest::LatestFrames;
use crate::queue::{Handoff, HandoffQueue};
use crate::reader::{ChannelReader, ReaderHandle};
use crate::step::{CombineError, CombineStep};

/// How long one dequeue waits before re-checking the stop flag.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// What happens to a channel's last value when its reader is detached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Drop the entry once every frame the reader queued has been consumed.
    #[default]
    Remove,
    /// Keep the last value until a new reader with the same name replaces it.
    Retain,
}

/// What happens when the combination step returns an error.
///
/// `NotImplemented` always ends the loop regardless of policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log the error and keep consuming frames.
    #[default]
    LogAndContinue,
    /// End `run` with the error.
    Stop,
}

/// Combiner behavior config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinerConfig {
    /// Dequeue timeout; bounds how long `stop` takes to be noticed.
    pub poll_timeout: Duration,
    pub stale_policy: StalePolicy,
    pub error_policy: ErrorPolicy,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            stale_policy: StalePolicy::default(),
            error_policy: ErrorPolicy::default(),
        }
    }
}

/// Shared stop request of a combiner loop.
///
/// A request is sticky: once `stop` is called, a loop that has not started
/// yet returns as soon as it does.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the loop exit after its current iteration.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// State owned by the consuming loop.
struct Core<C> {
    step: C,
    latest: LatestFrames,
    combined: u64,
}

/// Fans any number of channel readers into one combination step.
///
/// Readers are attached and detached at any time from any thread. The loop
/// (`run`, or `poll` for one iteration) is the only code that touches the
/// latest-value mapping; readers only ever talk to the hand-off queue.
///
/// `stop` ends the loop but leaves readers running. Use `shutdown`, or drop
/// the combiner, to stop and join every reader.
pub struct Combiner<C> {
    config: CombinerConfig,
    registry: Mutex<HashMap<ChannelId, ChannelReader>>,
    queue: HandoffQueue,
    core: Mutex<Core<C>>,
    stop: StopHandle,
    active: AtomicBool,
}

impl<C: CombineStep> Combiner<C> {
    /// Create a combiner with default configuration.
    pub fn new(step: C) -> Self {
        Self::with_config(step, CombinerConfig::default())
    }

    /// Create a combiner with explicit configuration.
    pub fn with_config(step: C, config: CombinerConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(HashMap::new()),
            queue: HandoffQueue::new(),
            core: Mutex::new(Core {
                step,
                latest: LatestFrames::new(),
                combined: 0,
            }),
            stop: StopHandle::new(),
            active: AtomicBool::new(false),
        }
    }

    /// Share a stop request created elsewhere (e.g. handed to the step or a
    /// signal handler before the combiner existed). A request already made
    /// through `handle` carries over.
    pub fn with_stop_handle(mut self, handle: StopHandle) -> Self {
        self.stop = handle;
        self
    }

    pub fn config(&self) -> &CombinerConfig {
        &self.config
    }

    /// Register `reader` and start its loop.
    ///
    /// Fails with `DuplicateChannel` if a reader of the same name is already
    /// attached; the registry is left untouched and `reader` is dropped.
    pub fn attach(&self, mut reader: ChannelReader) -> Result<ReaderHandle> {
        let mut registry = self.lock_registry();
        if registry.contains_key(reader.id()) {
            return Err(PipelineError::DuplicateChannel(reader.id().clone()));
        }

        reader.start(self.queue.sink())?;
        let handle = reader.handle();
        info!(channel = %reader.id(), "reader attached");
        registry.insert(reader.id().clone(), reader);
        Ok(handle)
    }

    /// Stop the reader of `channel`, wait for its thread, and unregister it.
    ///
    /// Returns the stopped reader; its source is still open.
    pub fn detach(&self, channel: &str) -> Result<ChannelReader> {
        let mut registry = self.lock_registry();
        let mut reader = registry
            .remove(channel)
            .ok_or_else(|| PipelineError::UnknownChannel(ChannelId::new(channel)))?;

        let joined = reader.shutdown();
        if self.config.stale_policy == StalePolicy::Remove {
            // Queued behind every frame this reader pushed.
            self.queue.push_detached(reader.id().clone());
        }
        info!(channel = %reader.id(), "reader detached");
        joined.map(|()| reader)
    }

    /// Handle of the attached reader named `channel`.
    pub fn get(&self, channel: &str) -> Option<ReaderHandle> {
        self.lock_registry().get(channel).map(ChannelReader::handle)
    }

    /// Names of attached readers, sorted.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = self.lock_registry().keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Items waiting on the hand-off queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Consume the hand-off queue until stopped.
    ///
    /// Each frame updates the latest-value mapping and then runs the
    /// combination step once with the whole mapping. Returns `Ok(())` after
    /// `stop`, or the first fatal error. Returns at once if `stop` was called
    /// before the loop started.
    pub fn run(&self) -> Result<()> {
        let mut core = self.lock_core()?;
        if self.stop.is_stopped() {
            debug!("stop requested before the combiner loop started");
            return Ok(());
        }
        self.active.store(true, Ordering::Release);
        info!(channels = self.lock_registry().len(), "combiner loop started");

        let result = loop {
            if self.stop.is_stopped() {
                break Ok(());
            }
            if let Err(err) = self.step_once(&mut core, self.config.poll_timeout) {
                break Err(err);
            }
        };

        self.active.store(false, Ordering::Release);
        info!(frames = core.combined, "combiner loop stopped");
        result
    }

    /// Run one loop iteration, waiting up to `timeout` for an item.
    ///
    /// Returns the channel whose frame was combined, or `None` on timeout or
    /// when the item was a detach marker. Fails with `AlreadyRunning` while
    /// `run` is active.
    pub fn poll(&self, timeout: Duration) -> Result<Option<ChannelId>> {
        let mut core = self.lock_core()?;
        self.step_once(&mut core, timeout)
    }

    /// Ask the loop to exit after its current iteration, or not to start.
    ///
    /// Attached readers keep running and keep queueing frames.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether `run` is currently looping.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop the loop and detach every reader.
    ///
    /// Every reader is stopped even if one fails; the first failure is
    /// returned.
    pub fn shutdown(&self) -> Result<()> {
        self.stop();
        let mut registry = self.lock_registry();
        let mut first_err = None;
        for (id, mut reader) in registry.drain() {
            if let Err(err) = reader.shutdown() {
                warn!(channel = %id, error = %err, "reader did not shut down cleanly");
                first_err.get_or_insert(err);
            }
            if self.config.stale_policy == StalePolicy::Remove {
                self.queue.push_detached(id);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn step_once(&self, core: &mut Core<C>, timeout: Duration) -> Result<Option<ChannelId>> {
        let tagged = match self.queue.recv_timeout(timeout) {
            None => return Ok(None),
            Some(Handoff::Detached(channel)) => {
                if core.latest.remove(channel.as_str()).is_some() {
                    debug!(channel = %channel, "dropped last value of detached channel");
                }
                return Ok(None);
            }
            Some(Handoff::Frame(tagged)) => tagged,
        };

        let channel = tagged.channel.clone();
        core.latest.update(tagged);
        core.combined += 1;

        match core.step.combine(&core.latest) {
            Ok(()) => Ok(Some(channel)),
            Err(CombineError::NotImplemented) => Err(PipelineError::NotImplemented),
            Err(err) => match self.config.error_policy {
                ErrorPolicy::LogAndContinue => {
                    warn!(channel = %channel, error = %err, "combination step failed");
                    Ok(Some(channel))
                }
                ErrorPolicy::Stop => Err(PipelineError::Combine(err)),
            },
        }
    }

    fn lock_core(&self) -> Result<MutexGuard<'_, Core<C>>> {
        match self.core.try_lock() {
            Ok(core) => Ok(core),
            // A panicking step leaves the mapping consistent: it only ever
            // had shared access.
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(PipelineError::AlreadyRunning),
        }
    }
}

impl<C> Combiner<C> {
    fn lock_registry(&self) -> MutexGuard<'_, HashMap<ChannelId, ChannelReader>> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C> Drop for Combiner<C> {
    fn drop(&mut self) {
        self.stop.stop();
        let mut registry = self.lock_registry();
        for (id, mut reader) in registry.drain() {
            if let Err(err) = reader.shutdown() {
                warn!(channel = %id, error = %err, "reader did not shut down cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    use framefuse_frame::{ElementType, Frame, FrameDescriptor};
    use framefuse_source::{MemoryLink, MemorySource};

    use super::*;
    use crate::reader::ReaderState;

    const WAIT: Duration = Duration::from_secs(2);

    type StepResult = std::result::Result<(), CombineError>;

    fn reader(name: &str, ty: ElementType, bytes: &[u8]) -> (ChannelReader, MemoryLink) {
        let (source, link) = MemorySource::with_bytes(bytes);
        let desc = FrameDescriptor::new(ty, [1]).unwrap();
        let reader = ChannelReader::new(name, desc, Box::new(source))
            .with_poll_interval(Duration::from_millis(1));
        (reader, link)
    }

    /// Step that records a clone of every mapping it is called with.
    fn recording() -> (
        impl FnMut(&LatestFrames) -> StepResult + Send,
        Arc<Mutex<Vec<LatestFrames>>>,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let step = move |latest: &LatestFrames| -> StepResult {
            sink.lock().unwrap().push(latest.clone());
            Ok(())
        };
        (step, seen)
    }

    /// Poll until `n` frames have been combined.
    fn combine_n<C: CombineStep>(combiner: &Combiner<C>, n: usize) -> Vec<ChannelId> {
        let deadline = Instant::now() + WAIT;
        let mut combined = Vec::new();
        while combined.len() < n {
            assert!(Instant::now() < deadline, "timed out waiting for frames");
            if let Some(channel) = combiner.poll(Duration::from_millis(50)).unwrap() {
                combined.push(channel);
            }
        }
        combined
    }

    fn value(latest: &LatestFrames, channel: &str) -> Option<i16> {
        latest.get(channel).and_then(Frame::as_i16).map(|v| v[0])
    }

    #[test]
    fn latest_value_follows_each_frame() {
        let (step, seen) = recording();
        let combiner = Combiner::new(step);
        let (a, _link) = reader("A", ElementType::I16, &[0x01, 0x00, 0x02, 0x00]);
        combiner.attach(a).unwrap();

        combine_n(&combiner, 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(value(&seen[0], "A"), Some(1));
        assert_eq!(value(&seen[1], "A"), Some(2));
    }

    #[test]
    fn mapping_has_one_entry_per_channel() {
        let (step, seen) = recording();
        let combiner = Combiner::new(step);
        let mut links = Vec::new();
        for name in ["x", "y", "z", "w"] {
            let (r, link) = reader(name, ElementType::I16, &[0x09, 0x00]);
            combiner.attach(r).unwrap();
            links.push(link);
        }

        let mut order = combine_n(&combiner, 4);
        order.sort();
        assert_eq!(order, combiner.channels());

        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.len(), 4);
        for name in ["x", "y", "z", "w"] {
            assert_eq!(value(&last, name), Some(9));
        }
    }

    #[test]
    fn silent_channel_does_not_block_others() {
        let (step, seen) = recording();
        let combiner = Combiner::new(step);
        let (a, _la) = reader("A", ElementType::I16, &[1, 0, 2, 0, 3, 0]);
        let (b, _lb) = reader("B", ElementType::I16, &[]);
        combiner.attach(a).unwrap();
        combiner.attach(b).unwrap();

        let combined = combine_n(&combiner, 3);
        assert!(combined.iter().all(|c| c.as_str() == "A"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        for (i, latest) in seen.iter().enumerate() {
            assert_eq!(value(latest, "A"), Some(i as i16 + 1));
            assert!(!latest.contains("B"));
            assert_eq!(latest.last_updated().map(ChannelId::as_str), Some("A"));
        }
    }

    #[test]
    fn duplicate_attach_leaves_registry_unchanged() {
        let combiner = Combiner::new(crate::step::MissingStep);
        let (first, _l1) = reader("A", ElementType::I16, &[]);
        let (second, _l2) = reader("A", ElementType::U8, &[]);

        combiner.attach(first).unwrap();
        let err = combiner.attach(second).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateChannel(ref id) if id.as_str() == "A"));

        assert_eq!(combiner.channels(), vec![ChannelId::from("A")]);
        let handle = combiner.get("A").unwrap();
        assert_eq!(handle.descriptor().element_type(), ElementType::I16);
        assert_eq!(handle.state(), ReaderState::Running);
    }

    #[test]
    fn detach_unknown_channel_fails() {
        let combiner = Combiner::new(crate::step::MissingStep);
        let (a, _link) = reader("A", ElementType::I16, &[]);
        combiner.attach(a).unwrap();

        let err = combiner.detach("B").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownChannel(ref id) if id.as_str() == "B"));
        assert_eq!(combiner.channels(), vec![ChannelId::from("A")]);
        assert!(combiner.get("B").is_none());
    }

    #[test]
    fn detach_joins_reader_thread() {
        let (step, _seen) = recording();
        let combiner = Combiner::new(step);
        let (a, link) = reader("A", ElementType::I16, &[1, 0]);
        let handle = combiner.attach(a).unwrap();
        combine_n(&combiner, 1);

        let detached = combiner.detach("A").unwrap();
        assert_eq!(detached.state(), ReaderState::Stopped);
        assert_eq!(handle.state(), ReaderState::Stopped);
        assert!(combiner.get("A").is_none());

        let frames = handle.stats().frames();
        let pending = combiner.pending();
        link.write(&[2, 0, 3, 0]);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.stats().frames(), frames);
        assert_eq!(combiner.pending(), pending);
        assert_eq!(link.pending(), 4, "nobody reads a detached channel");
    }

    #[test]
    fn detach_removes_stale_value_by_default() {
        let (step, seen) = recording();
        let combiner = Combiner::new(step);
        let (a, _la) = reader("A", ElementType::I16, &[1, 0]);
        combiner.attach(a).unwrap();
        combine_n(&combiner, 1);
        combiner.detach("A").unwrap();

        let (b, _lb) = reader("B", ElementType::I16, &[5, 0]);
        combiner.attach(b).unwrap();
        combine_n(&combiner, 1);

        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert!(!last.contains("A"));
        assert_eq!(value(&last, "B"), Some(5));
    }

    #[test]
    fn retain_policy_keeps_stale_value() {
        let (step, seen) = recording();
        let config = CombinerConfig {
            stale_policy: StalePolicy::Retain,
            ..CombinerConfig::default()
        };
        let combiner = Combiner::with_config(step, config);
        let (a, _la) = reader("A", ElementType::I16, &[1, 0]);
        combiner.attach(a).unwrap();
        combine_n(&combiner, 1);
        combiner.detach("A").unwrap();

        let (b, _lb) = reader("B", ElementType::I16, &[5, 0]);
        combiner.attach(b).unwrap();
        combine_n(&combiner, 1);

        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(value(&last, "A"), Some(1));
        assert_eq!(value(&last, "B"), Some(5));
    }

    #[test]
    fn frames_queued_before_detach_are_still_combined() {
        let (step, seen) = recording();
        let combiner = Combiner::new(step);
        let (a, _la) = reader("A", ElementType::I16, &[1, 0, 2, 0]);
        let handle = combiner.attach(a).unwrap();

        let deadline = Instant::now() + WAIT;
        while handle.stats().frames() < 2 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        combiner.detach("A").unwrap();

        combine_n(&combiner, 2);
        assert_eq!(combiner.poll(Duration::from_millis(10)).unwrap(), None);
        let seen = seen.lock().unwrap();
        assert_eq!(value(&seen[1], "A"), Some(2));
    }

    #[test]
    fn missing_step_ends_run() {
        let combiner = Combiner::new(crate::step::MissingStep);
        let (a, _link) = reader("A", ElementType::I16, &[1, 0]);
        combiner.attach(a).unwrap();

        let err = combiner.run().unwrap_err();
        assert!(matches!(err, PipelineError::NotImplemented));
        assert!(!combiner.is_running());
    }

    #[test]
    fn step_errors_are_logged_by_default() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let combiner = Combiner::new(move |_: &LatestFrames| -> StepResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CombineError::failed("bad sample"))
        });
        let (a, _link) = reader("A", ElementType::I16, &[1, 0, 2, 0]);
        combiner.attach(a).unwrap();

        combine_n(&combiner, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stop_policy_surfaces_step_error() {
        let config = CombinerConfig {
            error_policy: ErrorPolicy::Stop,
            poll_timeout: Duration::from_millis(20),
            ..CombinerConfig::default()
        };
        let combiner = Combiner::with_config(
            |_: &LatestFrames| -> StepResult { Err(CombineError::failed("bad sample")) },
            config,
        );
        let (a, _link) = reader("A", ElementType::I16, &[1, 0]);
        combiner.attach(a).unwrap();

        let err = combiner.run().unwrap_err();
        assert!(matches!(err, PipelineError::Combine(_)));
    }

    #[test]
    fn run_until_stopped_from_another_thread() {
        let combined = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&combined);
        let config = CombinerConfig {
            poll_timeout: Duration::from_millis(20),
            ..CombinerConfig::default()
        };
        let combiner = Arc::new(Combiner::with_config(
            move |_: &LatestFrames| -> StepResult {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            config,
        ));
        let (a, link) = reader("A", ElementType::I16, &[1, 0]);
        combiner.attach(a).unwrap();

        let runner = {
            let combiner = Arc::clone(&combiner);
            thread::spawn(move || combiner.run())
        };

        let deadline = Instant::now() + WAIT;
        while combined.load(Ordering::SeqCst) < 1 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        // Attaching while the loop runs is allowed.
        let (b, _lb) = reader("B", ElementType::I16, &[7, 0]);
        combiner.attach(b).unwrap();
        link.write(&[2, 0]);
        while combined.load(Ordering::SeqCst) < 3 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }

        assert!(matches!(
            combiner.poll(Duration::ZERO),
            Err(PipelineError::AlreadyRunning)
        ));
        combiner.stop();
        runner.join().unwrap().unwrap();

        // Readers outlive the loop until shut down.
        assert_eq!(combiner.get("A").unwrap().state(), ReaderState::Running);
        combiner.shutdown().unwrap();
        assert!(combiner.channels().is_empty());
    }

    #[test]
    fn shared_stop_handle_ends_run() {
        let stop = StopHandle::new();
        let from_step = stop.clone();
        let combiner = Combiner::new(move |latest: &LatestFrames| -> StepResult {
            if value(latest, "A") == Some(3) {
                from_step.stop();
            }
            Ok(())
        })
        .with_stop_handle(stop.clone());
        let (a, _link) = reader("A", ElementType::I16, &[1, 0, 2, 0, 3, 0]);
        combiner.attach(a).unwrap();

        combiner.run().unwrap();
        assert!(stop.is_stopped());
        assert!(!combiner.is_running());
    }

    #[test]
    fn stop_before_run_is_not_lost() {
        let combiner = Arc::new(Combiner::new(crate::step::MissingStep));
        let (a, _link) = reader("A", ElementType::I16, &[]);
        combiner.attach(a).unwrap();
        combiner.stop();

        let runner = {
            let combiner = Arc::clone(&combiner);
            thread::spawn(move || combiner.run())
        };
        let deadline = Instant::now() + WAIT;
        while !runner.is_finished() {
            assert!(Instant::now() < deadline, "run ignored an earlier stop");
            thread::sleep(Duration::from_millis(1));
        }
        runner.join().unwrap().unwrap();
        assert!(!combiner.is_running());
        assert_eq!(combiner.get("A").unwrap().state(), ReaderState::Running);
    }

    #[test]
    fn handle_stopped_before_combiner_exists_ends_run() {
        let stop = StopHandle::new();
        stop.stop();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let combiner = Combiner::new(move |_: &LatestFrames| -> StepResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .with_stop_handle(stop);
        let (a, _link) = reader("A", ElementType::I16, &[1, 0, 2, 0]);
        combiner.attach(a).unwrap();

        combiner.run().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_stops_attached_readers() {
        let combiner = Combiner::new(crate::step::MissingStep);
        let (a, _la) = reader("A", ElementType::I16, &[]);
        let (b, _lb) = reader("B", ElementType::I16, &[]);
        let ha = combiner.attach(a).unwrap();
        let hb = combiner.attach(b).unwrap();

        drop(combiner);
        assert_eq!(ha.state(), ReaderState::Stopped);
        assert_eq!(hb.state(), ReaderState::Stopped);
    }
}
