//! One-shot bridge from signals to a future.
//!
//! [`connect_async`] subscribes to a resolve signal and optionally a reject
//! signal. Whichever is emitted first settles the future; both handlers are
//! disconnected before the result is delivered, so later emissions are not
//! observed.
//!
//! ```
//! use horizon_trellis::bridge::connect_async;
//! use horizon_trellis_core::{MainLoop, SignalSpec, ClassInfo, TypeRegistry, Instance, Value, ValueKind};
//!
//! let registry = TypeRegistry::new();
//! let mut info = ClassInfo::new("Loader", &registry.object_class());
//! info.signals.push(SignalSpec::new("loaded").with_param_types([ValueKind::Int]));
//! let class = registry.register(info).unwrap();
//!
//! let main_loop = MainLoop::new();
//! let loader = Instance::new(&class, &main_loop).unwrap();
//! let loaded = connect_async(&loader, "loaded", None).unwrap();
//!
//! let emitter = loader.clone();
//! main_loop.idle_add_once(move || {
//!     emitter.emit("loaded", vec![Value::Int(42)]).unwrap();
//! });
//! let args = main_loop.run_until_complete(loaded).unwrap().unwrap();
//! assert_eq!(args, vec![Value::Int(42)]);
//! ```

use std::future::Future;
use std::sync::Arc;

use horizon_trellis_core::{CoreResult, HandlerId, Instance, Value, WeakInstance};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::logging::targets;

/// Why a bridged future did not resolve.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// The reject signal was emitted first.
    #[error("Signal '{signal}' rejected the operation with {args:?}")]
    Rejected { signal: String, args: Vec<Value> },

    /// The handlers were dropped without any emission.
    #[error("Signal handlers were dropped before any emission")]
    Closed,
}

enum Outcome {
    Resolved(Vec<Value>),
    Rejected(String, Vec<Value>),
}

struct Pending {
    sender: Option<oneshot::Sender<Outcome>>,
    handlers: Vec<HandlerId>,
}

fn settle(pending: &Mutex<Pending>, instance: &WeakInstance, outcome: Outcome) {
    let (sender, handlers) = {
        let mut pending = pending.lock();
        (pending.sender.take(), std::mem::take(&mut pending.handlers))
    };
    let Some(sender) = sender else {
        return;
    };
    if let Some(instance) = instance.upgrade() {
        for handler in handlers {
            if let Err(err) = instance.disconnect(handler) {
                tracing::trace!(target: targets::BRIDGE, %err, "handler already gone");
            }
        }
    }
    // The receiver may have been dropped; nobody is waiting then.
    let _ = sender.send(outcome);
}

/// Await the first of `resolve` or `reject` on `instance`.
///
/// The future resolves with the arguments of `resolve`, or fails with
/// [`BridgeError::Rejected`] carrying the arguments of `reject`. Unknown
/// signal names fail here, before anything is connected.
pub fn connect_async(
    instance: &Instance,
    resolve: &str,
    reject: Option<&str>,
) -> CoreResult<impl Future<Output = Result<Vec<Value>, BridgeError>> + Send + 'static> {
    let (sender, receiver) = oneshot::channel();
    let pending = Arc::new(Mutex::new(Pending {
        sender: Some(sender),
        handlers: Vec::new(),
    }));

    let resolved = {
        let pending = Arc::clone(&pending);
        let weak = instance.downgrade();
        instance.connect(resolve, move |args| {
            settle(&pending, &weak, Outcome::Resolved(args.to_vec()));
        })?
    };
    pending.lock().handlers.push(resolved);

    if let Some(reject) = reject {
        let signal = reject.to_owned();
        let rejected = {
            let pending = Arc::clone(&pending);
            let weak = instance.downgrade();
            instance.connect(reject, move |args| {
                settle(&pending, &weak, Outcome::Rejected(signal.clone(), args.to_vec()));
            })
        };
        match rejected {
            Ok(id) => pending.lock().handlers.push(id),
            Err(err) => {
                instance.disconnect(resolved)?;
                return Err(err);
            }
        }
    }

    tracing::trace!(target: targets::BRIDGE, resolve, reject, "bridge connected");
    drop(pending);

    Ok(async move {
        match receiver.await {
            Ok(Outcome::Resolved(args)) => Ok(args),
            Ok(Outcome::Rejected(signal, args)) => Err(BridgeError::Rejected { signal, args }),
            Err(_) => Err(BridgeError::Closed),
        }
    })
}
