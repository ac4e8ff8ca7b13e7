//! Typed signal primitive.
//!
//! [`Signal<Args, R>`] carries the named signals of an
//! [`Instance`](crate::Instance) (`Args = Vec<Value>`, `R = Option<Value>`)
//! and the `activate` signal of a [`SimpleAction`](crate::SimpleAction).
//! Handlers run synchronously in connection order.
//!
//! Emission works on a snapshot taken under the lock; handlers are invoked
//! with the lock released and may connect, disconnect or emit. A handler
//! removed mid-emission still sees the emission it was snapshotted into.
//!
//! ```
//! use horizon_trellis_core::Signal;
//!
//! let resized = Signal::<(u32, u32)>::new();
//! let id = resized.connect(|(w, h)| println!("{w}x{h}"));
//! resized.emit((640, 480));
//! assert!(resized.disconnect(id));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Handle of one handler connected to a [`Signal`].
    pub struct ConnectionId;
}

type Handler<Args, R> = Arc<dyn Fn(&Args) -> R + Send + Sync>;

/// A list of handlers invoked with `&Args`, each returning an `R`.
pub struct Signal<Args, R = ()> {
    handlers: Mutex<SlotMap<ConnectionId, Handler<Args, R>>>,
}

impl<Args: 'static, R: 'static> Default for Signal<Args, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static, R: 'static> Signal<Args, R> {
    /// A signal without handlers.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Append a handler.
    pub fn connect<F>(&self, handler: F) -> ConnectionId
    where
        F: Fn(&Args) -> R + Send + Sync + 'static,
    {
        self.handlers.lock().insert(Arc::new(handler))
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.handlers.lock().remove(id).is_some()
    }

    /// Number of connected handlers.
    pub fn connection_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Invoke every handler, discarding results.
    pub fn emit(&self, args: Args) {
        self.emit_until(args, |_| false);
    }

    /// Invoke every handler and return their results in order.
    pub fn emit_collect(&self, args: Args) -> Vec<R> {
        self.emit_until(args, |_| false)
    }

    /// Invoke handlers until one returns a result matching `stop`.
    ///
    /// The returned results include the one that stopped emission.
    pub fn emit_until<P>(&self, args: Args, mut stop: P) -> Vec<R>
    where
        P: FnMut(&R) -> bool,
    {
        let snapshot: Vec<Handler<Args, R>> = self.handlers.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, handlers = snapshot.len(), "emit");

        let mut results = Vec::with_capacity(snapshot.len());
        for handler in snapshot {
            let result = handler(&args);
            let stopped = stop(&result);
            results.push(result);
            if stopped {
                break;
            }
        }
        results
    }
}

static_assertions::assert_impl_all!(Signal<Vec<crate::Value>, Option<crate::Value>>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_handlers_run_in_connection_order() {
        let signal = Signal::<u8>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = order.clone();
            signal.connect(move |n| order.lock().push(format!("{tag}{n}")));
        }

        signal.emit(1);
        assert_eq!(*order.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_disconnected_handler_is_skipped() {
        let signal = Signal::<u8>::new();
        let hits = Arc::new(Mutex::new(0));

        let counter = hits.clone();
        let id = signal.connect(move |_| *counter.lock() += 1);
        signal.emit(0);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(0);

        assert_eq!(*hits.lock(), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_handler_removed_mid_emission_still_sees_it() {
        let signal = Arc::new(Signal::<()>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(None::<ConnectionId>));

        let remover = signal.clone();
        let pending = second.clone();
        let log = seen.clone();
        signal.connect(move |_| {
            log.lock().push("first");
            if let Some(id) = pending.lock().take() {
                remover.disconnect(id);
            }
        });
        let log = seen.clone();
        *second.lock() = Some(signal.connect(move |_| log.lock().push("second")));

        signal.emit(());
        signal.emit(());
        assert_eq!(*seen.lock(), vec!["first", "second", "first"]);
    }

    #[test]
    fn test_emit_until_stops_on_handled_value() {
        let signal = Signal::<Vec<Value>, Option<Value>>::new();
        signal.connect(|_| None);
        signal.connect(|args| args.first().cloned());
        signal.connect(|_| panic!("emission should have stopped"));

        let results = signal.emit_until(vec![Value::Bool(true)], |result| {
            matches!(result, Some(Value::Bool(true)))
        });
        assert_eq!(results, vec![None, Some(Value::Bool(true))]);
    }

    #[test]
    fn test_emit_collect_returns_every_result() {
        let signal = Signal::<i32, i32>::new();
        signal.connect(|n| n + 1);
        signal.connect(|n| n * 2);
        assert_eq!(signal.emit_collect(5), vec![6, 10]);
    }
}
