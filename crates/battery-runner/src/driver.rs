//! Invokes a selected test case and converts anything it does into an
//! [`Outcome`]. This is the fault-isolation boundary: an arbitrary test body
//! may return an error or panic, and neither may escape the session loop.

use crate::registry::{Case, CaseContext};
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Diagnostic text: error chain, or panic message + location + backtrace.
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

thread_local! {
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
    static CAPTURING: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

static HOOK_INIT: Once = Once::new();

/// Install a panic hook that, while a case is in flight on this thread,
/// captures the message, location, and a backtrace into thread-local
/// storage instead of printing to stderr. Panics outside a case invocation
/// keep the previous hook's behavior.
fn install_panic_hook() {
    HOOK_INIT.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !CAPTURING.with(|flag| flag.get()) {
                previous(info);
                return;
            }
            let message = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown location".to_string());
            let backtrace = Backtrace::force_capture();
            LAST_PANIC.with(|slot| {
                *slot.borrow_mut() = Some(format!(
                    "panicked at {}: {}\nbacktrace:\n{}",
                    location, message, backtrace
                ));
            });
        }));
    });
}

/// Run one case to completion. No retries: a failing case is recorded once
/// per selection and may simply be drawn again later.
pub fn run_case(case: &Case, ctx: &mut CaseContext) -> Outcome {
    install_panic_hook();
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
    CAPTURING.with(|flag| flag.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(|| (case.run)(ctx)));
    CAPTURING.with(|flag| flag.set(false));
    match result {
        Ok(Ok(())) => Outcome::Success,
        Ok(Err(err)) => Outcome::Failure(format!("{:#}", err)),
        Err(_payload) => {
            let captured = LAST_PANIC.with(|slot| slot.borrow_mut().take());
            Outcome::Failure(
                captured.unwrap_or_else(|| "panic with no captured diagnostic".to_string()),
            )
        }
    }
}
