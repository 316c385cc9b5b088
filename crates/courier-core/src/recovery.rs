//! Panic containment for units of work.
//!
//! [`invoke`] and [`invoke_sync`] run a unit of work and intercept any panic
//! it raises. An intercepted panic produces exactly one `error`-level event
//! carrying the panic message and the stack captured at the panic site, and
//! is handed back to the caller as a [`Panicked`] value. Work that completes
//! normally logs nothing.
//!
//! ```rust,ignore
//! match recovery::invoke(handler.oneshot(ctx)).await {
//!     Ok(result) => result,
//!     Err(panicked) => Err(panicked.into()),
//! }
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use futures::FutureExt;
use thiserror::Error;
use tracing::error;

/// A panic intercepted by the invoker.
#[derive(Debug, Clone, Error)]
#[error("panic: {message}")]
pub struct Panicked {
    /// Textual description of the panic payload.
    pub message: String,
    /// Stack snapshot taken where the panic was raised.
    pub stack: String,
}

thread_local! {
    /// Number of invoker frames currently polling on this thread.
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Backtrace of the last panic raised under a guard on this thread.
    static LAST_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chains a process panic hook that records the stack for guarded panics and
/// keeps the default report for everything else.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.with(Cell::get) > 0 {
                let stack = Backtrace::force_capture().to_string();
                LAST_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as running guarded work until dropped.
struct GuardScope;

impl GuardScope {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        GuardScope
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn report(payload: Box<dyn Any + Send>) -> Panicked {
    let message = panic_message(payload.as_ref());
    let stack = LAST_STACK
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| Backtrace::force_capture().to_string());

    error!(panic = %message, stack = %stack, "Recovered from panic");

    Panicked { message, stack }
}

/// Runs `fut` to completion, containing any panic raised while polling it.
///
/// The panic is logged once and returned as [`Panicked`]; it never unwinds
/// into the caller.
pub async fn invoke<F>(fut: F) -> Result<F::Output, Panicked>
where
    F: Future,
{
    install_hook();

    let mut fut = Box::pin(fut);
    let guarded = futures::future::poll_fn(move |cx| {
        let _scope = GuardScope::enter();
        fut.as_mut().poll(cx)
    });

    AssertUnwindSafe(guarded).catch_unwind().await.map_err(report)
}

/// Runs `f`, containing any panic it raises.
pub fn invoke_sync<F, T>(f: F) -> Result<T, Panicked>
where
    F: FnOnce() -> T,
{
    install_hook();

    panic::catch_unwind(AssertUnwindSafe(|| {
        let _scope = GuardScope::enter();
        f()
    }))
    .map_err(report)
}
