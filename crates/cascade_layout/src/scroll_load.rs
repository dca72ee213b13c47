//! Scroll-triggered loading
//!
//! Scroll notifications are debounced, then the scroll target is checked for
//! proximity to the end of its content. When close enough, the host's loader
//! runs. At most one loader runs at a time; triggers that arrive while one is
//! in flight are dropped, not queued.
//!
//! ```text
//! scroll ─► debounce ─► check_scroll_load ──────────► spawned load
//!                         │ guards                    │ emit scrollLoadStart
//!                         │ proximity                 │ await loader
//!                         │ is_loading = true         │ emit scrollLoadEnd
//!                         │   (compare-exchange)      └ is_loading = false
//! ```
//!
//! `is_loading` is cleared when the load future completes or is dropped. A
//! loader that never settles keeps it set.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use cascade_core::{Debounced, EventEmitter, LoadError, WaterfallEvent};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::ScrollLoadConfig;
use crate::host::{ListenerId, ScrollBinding, ScrollListener, ScrollTarget};

/// Future returned by a [`Loader`]
pub type LoadFuture = BoxFuture<'static, Result<(), LoadError>>;

/// Host callback that fetches more items
pub type Loader = Arc<dyn Fn() -> LoadFuture + Send + Sync>;

/// Wrap an async closure as a [`Loader`]
pub fn loader<F, Fut>(f: F) -> Loader
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), LoadError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Result of a trigger attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The loader ran and succeeded
    Loaded,
    /// The loader ran and failed with this message
    Failed(String),
    /// No loader, loading disabled, or a load already in flight
    Skipped,
}

struct Attachment {
    target: ScrollTarget,
    listener: ListenerId,
}

struct ScrollLoadInner {
    loader: Option<Loader>,
    config: RwLock<ScrollLoadConfig>,
    is_loading: AtomicBool,
    scroll: Arc<ScrollBinding>,
    events: Arc<EventEmitter>,
    attachment: Mutex<Option<Attachment>>,
    on_scroll: Debounced,
}

/// A claimed loading flag, cleared when dropped
struct LoadingGuard {
    inner: Arc<ScrollLoadInner>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.inner.is_loading.store(false, Ordering::Release);
    }
}

/// Single-flight scroll loader
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct ScrollLoadController {
    inner: Arc<ScrollLoadInner>,
}

impl ScrollLoadController {
    /// Create a controller; `config.debounce_ms` is fixed from here on
    pub fn new(
        loader: Option<Loader>,
        config: ScrollLoadConfig,
        scroll: Arc<ScrollBinding>,
        events: Arc<EventEmitter>,
    ) -> Self {
        let delay = Duration::from_millis(config.debounce_ms);
        let inner = Arc::new_cyclic(|weak: &Weak<ScrollLoadInner>| {
            let weak = weak.clone();
            ScrollLoadInner {
                loader,
                config: RwLock::new(config),
                is_loading: AtomicBool::new(false),
                scroll,
                events,
                attachment: Mutex::new(None),
                on_scroll: Debounced::new(delay, move || {
                    if let Some(inner) = weak.upgrade() {
                        ScrollLoadController { inner }.check_scroll_load();
                    }
                }),
            }
        });
        Self { inner }
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Whether a loader is configured
    pub fn has_loader(&self) -> bool {
        self.inner.loader.is_some()
    }

    /// Whether a load is in flight
    pub fn is_loading(&self) -> bool {
        self.inner.is_loading.load(Ordering::Acquire)
    }

    /// Snapshot of the configuration
    pub fn config(&self) -> ScrollLoadConfig {
        match self.inner.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Suppress or re-enable loading
    pub fn set_disabled(&self, disabled: bool) {
        self.update_config(|config| config.disabled = disabled);
    }

    /// Change the proximity threshold
    pub fn set_threshold(&self, threshold: f32) {
        self.update_config(|config| config.threshold = threshold);
    }

    fn update_config(&self, f: impl FnOnce(&mut ScrollLoadConfig)) {
        match self.inner.config.write() {
            Ok(mut config) => f(&mut config),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    // =========================================================================
    // Triggering
    // =========================================================================

    /// Guards without the in-flight check
    fn loader_if_enabled(&self) -> Option<Loader> {
        let loader = self.inner.loader.clone()?;
        if self.config().disabled {
            return None;
        }
        Some(loader)
    }

    /// Set `is_loading` unless it is already set; check and set are one
    /// atomic step
    fn claim(&self) -> Option<(Loader, LoadingGuard)> {
        let loader = self.loader_if_enabled()?;
        self.inner
            .is_loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let guard = LoadingGuard {
            inner: Arc::clone(&self.inner),
        };
        Some((loader, guard))
    }

    /// Start a load if the scroll target is near the end of its content
    ///
    /// `is_loading` is already set when this returns `Some`. Returns `None`
    /// when the guards or the proximity check rejected the load.
    pub fn check_scroll_load(&self) -> Option<JoinHandle<LoadOutcome>> {
        self.loader_if_enabled()?;
        if self.is_loading() {
            return None;
        }

        let threshold = self.config().threshold;
        let metrics = self.inner.scroll.target().surface().metrics();
        if !metrics.is_near_end(threshold) {
            tracing::trace!(
                scroll_top = metrics.scroll_top,
                content_height = metrics.content_height,
                "Not near the end - no load"
            );
            return None;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("check_scroll_load outside of a tokio runtime - no load");
            return None;
        };
        let Some((loader, loading)) = self.claim() else {
            tracing::trace!("Load already in flight");
            return None;
        };
        let controller = self.clone();
        Some(runtime.spawn(async move { controller.run_load(loader, loading).await }))
    }

    /// Run the loader unless one is already in flight
    pub async fn trigger_scroll_load(&self) -> LoadOutcome {
        let Some((loader, loading)) = self.claim() else {
            tracing::trace!("Load skipped - disabled or already in flight");
            return LoadOutcome::Skipped;
        };
        self.run_load(loader, loading).await
    }

    async fn run_load(&self, loader: Loader, _loading: LoadingGuard) -> LoadOutcome {
        tracing::debug!("Scroll load started");
        self.inner.events.emit(&WaterfallEvent::ScrollLoadStart);

        match loader().await {
            Ok(()) => {
                tracing::debug!("Scroll load finished");
                self.inner
                    .events
                    .emit(&WaterfallEvent::ScrollLoadEnd { error: None });
                LoadOutcome::Loaded
            }
            Err(err) => {
                tracing::error!(error = %err, "Scroll load failed");
                let message = err.message().to_string();
                self.inner.events.emit(&WaterfallEvent::ScrollLoadEnd {
                    error: Some(message.clone()),
                });
                LoadOutcome::Failed(message)
            }
        }
    }

    // =========================================================================
    // Scroll Listener
    // =========================================================================

    /// Listen for scrolls on the current scroll target
    ///
    /// Does nothing without a loader or when already attached.
    pub fn attach(&self) {
        if !self.has_loader() {
            return;
        }
        let Ok(mut attachment) = self.inner.attachment.lock() else {
            return;
        };
        if attachment.is_some() {
            return;
        }

        let target = self.inner.scroll.target();
        let weak = Arc::downgrade(&self.inner);
        let listener: ScrollListener = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_scroll.call();
            }
        });
        let listener = target.surface().add_scroll_listener(listener);
        tracing::debug!(window = target.is_window(), "Scroll listener attached");
        *attachment = Some(Attachment { target, listener });
    }

    /// Stop listening and drop any pending debounced check
    pub fn detach(&self) {
        let previous = self
            .inner
            .attachment
            .lock()
            .ok()
            .and_then(|mut attachment| attachment.take());
        if let Some(Attachment { target, listener }) = previous {
            target.surface().remove_scroll_listener(listener);
            tracing::debug!(window = target.is_window(), "Scroll listener detached");
        }
        self.inner.on_scroll.cancel();
    }

    /// Move the listener if the scroll target changed
    pub fn retarget(&self) {
        let current = self.inner.scroll.target();
        let moved = self
            .inner
            .attachment
            .lock()
            .ok()
            .and_then(|attachment| {
                attachment
                    .as_ref()
                    .map(|attached| !attached.target.same_surface(&current))
            })
            .unwrap_or(false);
        if moved {
            self.detach();
            self.attach();
        }
    }

    /// Whether a scroll listener is registered
    pub fn is_attached(&self) -> bool {
        self.inner
            .attachment
            .lock()
            .is_ok_and(|attachment| attachment.is_some())
    }
}

impl std::fmt::Debug for ScrollLoadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollLoadController")
            .field("has_loader", &self.has_loader())
            .field("is_loading", &self.is_loading())
            .field("attached", &self.is_attached())
            .finish()
    }
}
