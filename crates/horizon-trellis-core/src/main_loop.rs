//! Cooperative main loop.
//!
//! The loop owns three kinds of pending work:
//!
//! - **Timeouts**: one-shot callbacks that fire once the loop's clock reaches
//!   their deadline. Ordered by deadline, ties in scheduling order.
//! - **Idle callbacks**: one-shot callbacks run in FIFO order on the next
//!   idle cycle.
//! - **Local futures**: futures spawned with [`MainLoop::spawn_local`], polled
//!   on the cycle after they are woken.
//!
//! The clock is virtual. It only moves when [`MainLoop::advance`] is called,
//! which makes timing behaviour deterministic: everything scheduled for a
//! given instant runs before the clock moves on.
//!
//! Callbacks never run while the loop's internal lock is held, so a callback
//! may freely schedule or cancel other work.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use horizon_trellis_core::MainLoop;
//!
//! let main_loop = MainLoop::new();
//! main_loop.idle_add_once(|| println!("idle"));
//! main_loop.timeout_add_once(Duration::from_millis(50), || println!("timeout"));
//!
//! main_loop.run_until_idle();                    // prints "idle"
//! main_loop.advance(Duration::from_millis(50));  // prints "timeout"
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Context;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::task::{ArcWake, waker};
use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};
use tokio::sync::oneshot;

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for an idle callback or timeout.
    ///
    /// Pass it to [`MainLoop::remove`] to cancel the pending callback.
    pub struct SourceId;
}

type SourceFn = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for a [`MainLoop`].
#[derive(Debug, Clone, Default)]
pub struct MainLoopConfig {
    /// Maximum number of idle callbacks run per cycle.
    ///
    /// `None` runs every callback that was queued when the cycle started.
    pub idle_batch_size: Option<usize>,
}

impl MainLoopConfig {
    /// Limit the number of idle callbacks run per cycle.
    pub fn with_idle_batch_size(mut self, size: usize) -> Self {
        self.idle_batch_size = Some(size.max(1));
        self
    }
}

/// An entry in the timeout queue (min-heap by deadline, then sequence).
#[derive(Debug, Clone, Copy)]
struct TimeoutEntry {
    id: SourceId,
    deadline: Duration,
    sequence: u64,
}

impl PartialEq for TimeoutEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for TimeoutEntry {}

impl PartialOrd for TimeoutEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeoutEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A future spawned on the loop.
struct LocalTask {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    woken: AtomicBool,
}

impl ArcWake for LocalTask {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
    }
}

struct LoopState {
    now: Duration,
    sequence: u64,
    sources: SlotMap<SourceId, SourceFn>,
    idle: VecDeque<SourceId>,
    timeouts: BinaryHeap<TimeoutEntry>,
    tasks: Vec<Arc<LocalTask>>,
}

impl LoopState {
    /// Drop cancelled timeouts from the front of the queue.
    fn prune_timeouts(&mut self) {
        while let Some(entry) = self.timeouts.peek() {
            if self.sources.contains_key(entry.id) {
                break;
            }
            self.timeouts.pop();
        }
    }
}

struct LoopInner {
    state: Mutex<LoopState>,
    config: MainLoopConfig,
}

/// A handle to a cooperative main loop.
///
/// Cloning the handle is cheap; all clones drive the same loop.
#[derive(Clone)]
pub struct MainLoop {
    inner: Arc<LoopInner>,
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainLoop {
    /// Create a loop with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MainLoopConfig::default())
    }

    /// Create a loop with a custom configuration.
    pub fn with_config(config: MainLoopConfig) -> Self {
        Self {
            inner: Arc::new(LoopInner {
                state: Mutex::new(LoopState {
                    now: Duration::ZERO,
                    sequence: 0,
                    sources: SlotMap::with_key(),
                    idle: VecDeque::new(),
                    timeouts: BinaryHeap::new(),
                    tasks: Vec::new(),
                }),
                config,
            }),
        }
    }

    /// The loop's current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.state.lock().now
    }

    /// Whether two handles drive the same loop.
    pub fn ptr_eq(&self, other: &MainLoop) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queue a callback for the next idle cycle.
    pub fn idle_add_once<F>(&self, callback: F) -> SourceId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        let id = state.sources.insert(Box::new(callback));
        state.idle.push_back(id);
        id
    }

    /// Schedule a callback to run once `delay` has elapsed on the loop clock.
    pub fn timeout_add_once<F>(&self, delay: Duration, callback: F) -> SourceId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        let id = state.sources.insert(Box::new(callback));
        let deadline = state.now + delay;
        let sequence = state.sequence;
        state.sequence += 1;
        state.timeouts.push(TimeoutEntry {
            id,
            deadline,
            sequence,
        });
        tracing::trace!(target: targets::MAIN_LOOP, ?id, ?deadline, "timeout scheduled");
        id
    }

    /// Cancel a pending idle callback or timeout.
    ///
    /// Returns `true` if the callback was still pending.
    pub fn remove(&self, id: SourceId) -> bool {
        self.inner.state.lock().sources.remove(id).is_some()
    }

    /// Whether a callback is still pending.
    pub fn is_pending(&self, id: SourceId) -> bool {
        self.inner.state.lock().sources.contains_key(id)
    }

    /// Number of pending idle callbacks and timeouts.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().sources.len()
    }

    /// The deadline of the earliest pending timeout.
    pub fn next_deadline(&self) -> Option<Duration> {
        let mut state = self.inner.state.lock();
        state.prune_timeouts();
        state.timeouts.peek().map(|entry| entry.deadline)
    }

    /// Spawn a future on the loop. It is first polled on the next cycle.
    pub fn spawn_local<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(LocalTask {
            future: Mutex::new(Some(Box::pin(future))),
            woken: AtomicBool::new(true),
        });
        self.inner.state.lock().tasks.push(task);
    }

    /// A future that completes on the next idle cycle.
    ///
    /// The idle callback is queued when this method is called.
    pub fn idle(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        let (tx, rx) = oneshot::channel::<()>();
        self.idle_add_once(move || {
            let _ = tx.send(());
        });
        async move {
            let _ = rx.await;
        }
    }

    /// A future that completes once `delay` has elapsed on the loop clock.
    ///
    /// The timeout is scheduled when this method is called.
    pub fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send + 'static + use<> {
        let (tx, rx) = oneshot::channel::<()>();
        self.timeout_add_once(delay, move || {
            let _ = tx.send(());
        });
        async move {
            let _ = rx.await;
        }
    }

    /// Fire every timeout whose deadline has been reached.
    fn dispatch_due_timeouts(&self) -> usize {
        let mut fired = 0;
        loop {
            let callback = {
                let mut state = self.inner.state.lock();
                state.prune_timeouts();
                match state.timeouts.peek() {
                    Some(entry) if entry.deadline <= state.now => {
                        let entry = state.timeouts.pop();
                        entry.and_then(|entry| state.sources.remove(entry.id))
                    }
                    _ => break,
                }
            };
            if let Some(callback) = callback {
                callback();
                fired += 1;
            }
        }
        fired
    }

    /// Run the idle callbacks queued before this cycle started.
    fn dispatch_idle(&self) -> usize {
        let batch: Vec<SourceId> = {
            let mut state = self.inner.state.lock();
            let count = self
                .inner
                .config
                .idle_batch_size
                .map_or(state.idle.len(), |size| size.min(state.idle.len()));
            state.idle.drain(..count).collect()
        };

        let mut ran = 0;
        for id in batch {
            // Removed one at a time so a callback can still cancel a later one.
            let callback = self.inner.state.lock().sources.remove(id);
            if let Some(callback) = callback {
                callback();
                ran += 1;
            }
        }
        ran
    }

    /// Poll every woken local future once.
    fn poll_tasks(&self) -> usize {
        let woken: Vec<Arc<LocalTask>> = {
            let state = self.inner.state.lock();
            state
                .tasks
                .iter()
                .filter(|task| task.woken.load(Ordering::Acquire))
                .cloned()
                .collect()
        };

        let mut polled = 0;
        for task in woken {
            if !task.woken.swap(false, Ordering::AcqRel) {
                continue;
            }
            let task_waker = waker(task.clone());
            let mut cx = Context::from_waker(&task_waker);
            let mut slot = task.future.lock();
            if let Some(future) = slot.as_mut() {
                polled += 1;
                if future.as_mut().poll(&mut cx).is_ready() {
                    *slot = None;
                }
            }
        }

        if polled > 0 {
            self.inner
                .state
                .lock()
                .tasks
                .retain(|task| task.future.lock().is_some());
        }
        polled
    }

    /// Run one cycle: due timeouts, then one idle batch, then woken futures.
    ///
    /// Returns `true` if any work was done.
    pub fn iterate(&self) -> bool {
        let fired = self.dispatch_due_timeouts();
        let idle = self.dispatch_idle();
        let polled = self.poll_tasks();
        tracing::trace!(target: targets::MAIN_LOOP, fired, idle, polled, "loop iteration");
        fired + idle + polled > 0
    }

    /// Iterate until no due timeout, idle callback or woken future remains.
    ///
    /// Returns the number of cycles that did work.
    pub fn run_until_idle(&self) -> usize {
        let mut cycles = 0;
        while self.iterate() {
            cycles += 1;
        }
        cycles
    }

    /// Move the clock forward by `delta`, firing timeouts in deadline order.
    ///
    /// After each timeout deadline is reached the loop runs until idle, so
    /// work triggered by a timeout completes before later timeouts fire.
    pub fn advance(&self, delta: Duration) {
        let target = self.now() + delta;
        loop {
            let next = self.next_deadline();
            match next {
                Some(deadline) if deadline <= target => {
                    {
                        let mut state = self.inner.state.lock();
                        if deadline > state.now {
                            state.now = deadline;
                        }
                    }
                    self.run_until_idle();
                }
                _ => break,
            }
        }
        self.inner.state.lock().now = target;
        self.run_until_idle();
    }

    /// Drive the loop until `future` completes, advancing the clock to the
    /// next timeout whenever the loop goes idle.
    ///
    /// Returns `None` if the future can no longer make progress: the loop is
    /// idle and no timeout is pending.
    pub fn run_until_complete<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, mut rx) = oneshot::channel();
        self.spawn_local(async move {
            let _ = tx.send(future.await);
        });

        loop {
            self.run_until_idle();
            match rx.try_recv() {
                Ok(output) => return Some(output),
                Err(oneshot::error::TryRecvError::Closed) => return None,
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
            let deadline = self.next_deadline()?;
            self.advance(deadline.saturating_sub(self.now()));
        }
    }
}

static_assertions::assert_impl_all!(MainLoop: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> SourceFn) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |label: &'static str| -> SourceFn {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_idle_runs_fifo() {
        let main_loop = MainLoop::new();
        let (log, make) = recorder();

        main_loop.idle_add_once(make("a"));
        main_loop.idle_add_once(make("b"));
        main_loop.idle_add_once(make("c"));

        assert!(main_loop.iterate());
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert!(!main_loop.iterate());
    }

    #[test]
    fn test_idle_added_during_cycle_runs_next_cycle() {
        let main_loop = MainLoop::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_loop = main_loop.clone();
        let log_clone = log.clone();
        main_loop.idle_add_once(move || {
            log_clone.lock().push(1);
            let log = log_clone.clone();
            inner_loop.idle_add_once(move || log.lock().push(2));
        });

        main_loop.iterate();
        assert_eq!(*log.lock(), vec![1]);
        main_loop.iterate();
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[test]
    fn test_batch_size_limits_cycle() {
        let main_loop = MainLoop::with_config(MainLoopConfig::default().with_idle_batch_size(2));
        let (log, make) = recorder();
        for label in ["a", "b", "c"] {
            main_loop.idle_add_once(make(label));
        }

        main_loop.iterate();
        assert_eq!(log.lock().len(), 2);
        main_loop.iterate();
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_cancels() {
        let main_loop = MainLoop::new();
        let (log, make) = recorder();

        let idle = main_loop.idle_add_once(make("idle"));
        let timeout = main_loop.timeout_add_once(Duration::from_millis(10), make("timeout"));
        assert!(main_loop.is_pending(idle));
        assert!(main_loop.remove(idle));
        assert!(main_loop.remove(timeout));
        assert!(!main_loop.remove(timeout));

        main_loop.advance(Duration::from_millis(20));
        assert!(log.lock().is_empty());
        assert_eq!(main_loop.pending_count(), 0);
    }

    #[test]
    fn test_timeouts_fire_in_deadline_order() {
        let main_loop = MainLoop::new();
        let (log, make) = recorder();

        main_loop.timeout_add_once(Duration::from_millis(30), make("late"));
        main_loop.timeout_add_once(Duration::from_millis(10), make("early"));
        main_loop.timeout_add_once(Duration::from_millis(10), make("early-second"));

        main_loop.advance(Duration::from_millis(9));
        assert!(log.lock().is_empty());

        main_loop.advance(Duration::from_millis(1));
        assert_eq!(*log.lock(), vec!["early", "early-second"]);

        main_loop.advance(Duration::from_millis(100));
        assert_eq!(*log.lock(), vec!["early", "early-second", "late"]);
        assert_eq!(main_loop.now(), Duration::from_millis(110));
    }

    #[test]
    fn test_clock_at_deadline_inside_callback() {
        let main_loop = MainLoop::new();
        let seen = Arc::new(Mutex::new(None));

        let loop_clone = main_loop.clone();
        let seen_clone = seen.clone();
        main_loop.timeout_add_once(Duration::from_millis(40), move || {
            *seen_clone.lock() = Some(loop_clone.now());
        });

        main_loop.advance(Duration::from_millis(100));
        assert_eq!(*seen.lock(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn test_spawn_local_with_sleep() {
        let main_loop = MainLoop::new();
        let done = Arc::new(AtomicBool::new(false));

        let sleep = main_loop.sleep(Duration::from_millis(25));
        let done_clone = done.clone();
        main_loop.spawn_local(async move {
            sleep.await;
            done_clone.store(true, Ordering::SeqCst);
        });

        main_loop.run_until_idle();
        assert!(!done.load(Ordering::SeqCst));

        main_loop.advance(Duration::from_millis(25));
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_until_complete_advances_clock() {
        let main_loop = MainLoop::new();
        let sleep = main_loop.sleep(Duration::from_secs(2));
        let idle = main_loop.idle();

        let output = main_loop.run_until_complete(async move {
            idle.await;
            sleep.await;
            7
        });

        assert_eq!(output, Some(7));
        assert_eq!(main_loop.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_run_until_complete_stalls() {
        let main_loop = MainLoop::new();
        let (_tx, rx) = oneshot::channel::<()>();
        let output = main_loop.run_until_complete(async move {
            let _ = rx.await;
        });
        assert_eq!(output, None);
    }
}
