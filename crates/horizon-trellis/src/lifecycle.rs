//! Ready hooks.
//!
//! A class may declare a hook that runs once per instance on the next idle
//! cycle after construction. Hooks are synchronous or asynchronous; a hook
//! that returns an error, panics, or whose future fails is logged with the
//! class name and otherwise ignored.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use horizon_trellis_core::{Instance, SourceId};

use crate::error::RuntimeCallbackError;
use crate::logging::targets;

/// Error type returned by ready hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a ready hook.
pub type ReadyResult = std::result::Result<(), BoxError>;

type SyncHook = Arc<dyn Fn(&Instance) -> ReadyResult + Send + Sync>;
type AsyncHook = Arc<dyn Fn(Instance) -> BoxFuture<'static, ReadyResult> + Send + Sync>;

/// A post-construction hook.
#[derive(Clone)]
pub enum ReadyHook {
    /// Runs to completion inside the idle callback.
    Sync(SyncHook),
    /// Spawned on the main loop from the idle callback.
    Async(AsyncHook),
}

impl ReadyHook {
    /// A synchronous hook.
    pub fn from_fn<F>(hook: F) -> Self
    where
        F: Fn(&Instance) -> ReadyResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(hook))
    }

    /// An asynchronous hook.
    pub fn from_async<F, Fut>(hook: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ReadyResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |instance| hook(instance).boxed()))
    }
}

impl fmt::Debug for ReadyHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("ReadyHook::Sync"),
            Self::Async(_) => f.write_str("ReadyHook::Async"),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_owned()
    }
}

fn flatten(class: &str, outcome: std::thread::Result<ReadyResult>) -> Result<(), RuntimeCallbackError> {
    let message = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => err.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload)),
    };
    Err(RuntimeCallbackError {
        class: class.to_owned(),
        message,
    })
}

fn report(result: Result<(), RuntimeCallbackError>) {
    if let Err(err) = result {
        tracing::warn!(target: targets::LIFECYCLE, class = %err.class, error = %err, "ready hook failed");
    }
}

/// Schedule `hook` for `instance` on the next idle cycle.
///
/// The idle callback keeps the instance alive until it has run. It is not
/// cancelled once scheduled.
pub(crate) fn schedule_ready(instance: &Instance, hook: ReadyHook) -> SourceId {
    let class = instance.type_name().to_owned();
    let main_loop = instance.main_loop().clone();
    let target = instance.clone();

    tracing::trace!(target: targets::LIFECYCLE, class = %class, "ready hook scheduled");
    instance.main_loop().idle_add_once(move || match hook {
        ReadyHook::Sync(hook) => {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(&target)));
            report(flatten(&class, outcome));
        }
        ReadyHook::Async(hook) => {
            let future = match panic::catch_unwind(AssertUnwindSafe(|| hook(target))) {
                Ok(future) => future,
                Err(payload) => {
                    report(flatten(&class, Err(payload)));
                    return;
                }
            };
            main_loop.spawn_local(async move {
                let outcome = AssertUnwindSafe(future).catch_unwind().await;
                report(flatten(&class, outcome));
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_trellis_core::{MainLoop, TypeRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn instance(main_loop: &MainLoop) -> Instance {
        let registry = TypeRegistry::new();
        Instance::new(&registry.widget_class(), main_loop).unwrap()
    }

    #[test]
    fn test_sync_hook_runs_once_on_idle() {
        let main_loop = MainLoop::new();
        let target = instance(&main_loop);
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        schedule_ready(
            &target,
            ReadyHook::from_fn(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        main_loop.run_until_idle();
        main_loop.run_until_idle();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_isolated() {
        let main_loop = MainLoop::new();
        let target = instance(&main_loop);
        let after = Arc::new(AtomicUsize::new(0));

        schedule_ready(&target, ReadyHook::from_fn(|_| Err("broken".into())));
        schedule_ready(&target, ReadyHook::from_fn(|_| panic!("boom")));
        schedule_ready(
            &target,
            ReadyHook::from_async(|_| async { Err::<(), BoxError>("async broken".into()) }),
        );
        let after_clone = after.clone();
        schedule_ready(
            &target,
            ReadyHook::from_fn(move |_| {
                after_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        main_loop.run_until_idle();
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_async_hook_can_await_loop() {
        let main_loop = MainLoop::new();
        let target = instance(&main_loop);
        let done = Arc::new(AtomicUsize::new(0));

        let done_clone = done.clone();
        schedule_ready(
            &target,
            ReadyHook::from_async(move |instance| {
                let done = done_clone.clone();
                let sleep = instance.main_loop().sleep(std::time::Duration::from_millis(5));
                async move {
                    sleep.await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        main_loop.run_until_idle();
        assert_eq!(done.load(Ordering::SeqCst), 0);
        main_loop.advance(std::time::Duration::from_millis(5));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_flatten_reports_class() {
        let err = flatten("Panel", Ok(Err("nope".into()))).unwrap_err();
        assert_eq!(err.class, "Panel");
        assert_eq!(err.message, "nope");
    }
}
