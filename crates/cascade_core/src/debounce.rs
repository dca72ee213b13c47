//! Trailing-edge debounce
//!
//! A [`Debounced`] action runs once, `delay` after the last call in a burst.
//! Each call restarts the window. Pending runs are cancelled by
//! [`Debounced::cancel`] and when the handle is dropped, so nothing fires after
//! the owner has been torn down.
//!
//! Timers run on the ambient tokio runtime. Called outside of a runtime, the
//! action runs immediately.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cascade_core::Debounced;
//!
//! let on_scroll = Debounced::new(Duration::from_millis(200), || {
//!     println!("scroll settled");
//! });
//!
//! // Only the last of these schedules a run
//! on_scroll.call();
//! on_scroll.call();
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Action run when a debounce window closes
pub type DebounceAction = Arc<dyn Fn() + Send + Sync>;

/// A debounced action
pub struct Debounced {
    delay: Duration,
    action: DebounceAction,
    pending: Mutex<Option<AbortHandle>>,
}

impl Debounced {
    /// Debounce `action` by `delay`
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            delay,
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    /// The debounce window
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule the action, replacing any run that has not fired yet
    pub fn call(&self) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("Debounced::call outside of a tokio runtime - running immediately");
            (self.action)();
            return;
        };

        let action = Arc::clone(&self.action);
        let delay = self.delay;
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });

        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(task.abort_handle()) {
                previous.abort();
            }
        }
    }

    /// Drop a scheduled run, if any
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.take() {
                previous.abort();
            }
        }
    }

    /// Whether a run is scheduled and has not fired yet
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .ok()
            .is_some_and(|pending| pending.as_ref().is_some_and(|task| !task.is_finished()))
    }
}

impl Drop for Debounced {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Debounced {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debounced")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}
