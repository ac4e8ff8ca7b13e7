//! Per-instance debouncing.
//!
//! A [`Debounce`] wraps an operation so that bursts of calls on one instance
//! collapse into at most one leading and one trailing invocation. Every call
//! restarts the quiet interval. State lives in a data slot of the instance,
//! so one `Debounce` can serve any number of instances independently.
//!
//! ```
//! use std::time::Duration;
//! use horizon_trellis::{Debounce, DebounceMode};
//! use horizon_trellis_core::{Instance, MainLoop, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! let main_loop = MainLoop::new();
//! let search = Instance::new(&registry.widget_class(), &main_loop).unwrap();
//!
//! let run_query = Debounce::new(
//!     Duration::from_millis(300),
//!     DebounceMode::Trailing,
//!     |_: &Instance, query: String| println!("searching for {query}"),
//! );
//! run_query.call(&search, "h".into());
//! run_query.call(&search, "he".into());
//! main_loop.advance(Duration::from_millis(300));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use horizon_trellis_core::{Instance, SourceId};
use parking_lot::Mutex;

use crate::logging::targets;

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

/// Which edges of a burst invoke the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceMode {
    /// On the first call of a burst.
    Leading,
    /// After the burst, with the most recent arguments.
    #[default]
    Trailing,
    /// On the first call and, if further calls followed, after the burst.
    Both,
}

impl DebounceMode {
    fn leading(self) -> bool {
        matches!(self, Self::Leading | Self::Both)
    }

    fn trailing(self) -> bool {
        matches!(self, Self::Trailing | Self::Both)
    }
}

struct SlotState<Args> {
    timeout: Option<SourceId>,
    args: Option<Args>,
    trailing_pending: bool,
}

impl<Args> Default for SlotState<Args> {
    fn default() -> Self {
        Self {
            timeout: None,
            args: None,
            trailing_pending: false,
        }
    }
}

type Slot<Args> = Mutex<SlotState<Args>>;
type Operation<Args> = dyn Fn(&Instance, Args) + Send + Sync;

struct DebounceInner<Args> {
    interval: Duration,
    mode: DebounceMode,
    slot: String,
    operation: Box<Operation<Args>>,
}

/// A debounced operation.
///
/// Cloning is cheap; clones share the data slot and therefore the per-instance
/// state.
pub struct Debounce<Args> {
    inner: Arc<DebounceInner<Args>>,
}

impl<Args> Clone for Debounce<Args> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Args: Send + 'static> Debounce<Args> {
    /// Debounce `operation` with a quiet `interval`.
    pub fn new<F>(interval: Duration, mode: DebounceMode, operation: F) -> Self
    where
        F: Fn(&Instance, Args) + Send + Sync + 'static,
    {
        let slot = format!("horizon-trellis-debounce-{}", NEXT_SLOT.fetch_add(1, Ordering::Relaxed));
        Self {
            inner: Arc::new(DebounceInner {
                interval,
                mode,
                slot,
                operation: Box::new(operation),
            }),
        }
    }

    /// The quiet interval.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// The invocation mode.
    pub fn mode(&self) -> DebounceMode {
        self.inner.mode
    }

    /// Call the operation on `instance`, subject to debouncing.
    pub fn call(&self, instance: &Instance, args: Args) {
        let slot = instance.data_or_insert_with(&self.inner.slot, || -> Slot<Args> {
            Mutex::new(SlotState::default())
        });

        let immediate = {
            let mut state = slot.lock();
            let immediate = if self.inner.mode.leading() && state.timeout.is_none() {
                Some(args)
            } else {
                state.args = Some(args);
                state.trailing_pending = true;
                None
            };
            if let Some(previous) = state.timeout.take() {
                instance.main_loop().remove(previous);
            }
            state.timeout = Some(self.schedule(instance));
            immediate
        };

        if let Some(args) = immediate {
            tracing::trace!(target: targets::DEBOUNCE, slot = %self.inner.slot, "leading invocation");
            (self.inner.operation)(instance, args);
        }
    }

    fn schedule(&self, instance: &Instance) -> SourceId {
        let inner = Arc::clone(&self.inner);
        let weak = instance.downgrade();
        instance.main_loop().timeout_add_once(self.inner.interval, move || {
            let Some(instance) = weak.upgrade() else {
                return;
            };
            let Some(slot) = instance.data::<Slot<Args>>(&inner.slot) else {
                return;
            };
            let trailing = {
                let mut state = slot.lock();
                state.timeout = None;
                let args = state.args.take();
                if inner.mode.trailing() && std::mem::take(&mut state.trailing_pending) {
                    args
                } else {
                    state.trailing_pending = false;
                    None
                }
            };
            if let Some(args) = trailing {
                tracing::trace!(target: targets::DEBOUNCE, slot = %inner.slot, "trailing invocation");
                (inner.operation)(&instance, args);
            }
        })
    }

    /// Drop any pending invocation on `instance`.
    pub fn cancel(&self, instance: &Instance) {
        let Some(slot) = instance.data::<Slot<Args>>(&self.inner.slot) else {
            return;
        };
        let mut state = slot.lock();
        if let Some(timeout) = state.timeout.take() {
            instance.main_loop().remove(timeout);
        }
        state.args = None;
        state.trailing_pending = false;
    }

    /// Whether a quiet interval is running on `instance`.
    pub fn is_pending(&self, instance: &Instance) -> bool {
        instance
            .data::<Slot<Args>>(&self.inner.slot)
            .is_some_and(|slot| slot.lock().timeout.is_some())
    }
}

impl<Args> fmt::Debug for Debounce<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("interval", &self.inner.interval)
            .field("mode", &self.inner.mode)
            .field("slot", &self.inner.slot)
            .finish_non_exhaustive()
    }
}
