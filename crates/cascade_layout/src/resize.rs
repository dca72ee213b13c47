//! Container resize watching
//!
//! Prefers the host's resize observer. Hosts without one are polled: the
//! container width is sampled on an interval and the callback fires whenever
//! it differs from the previous sample.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use crate::host::{LayoutHost, ObserverId, ResizeCallback};

/// An active resize watch
#[derive(Debug)]
pub enum ResizeWatch {
    /// Registered with the host's resize observer
    Observer(ObserverId),
    /// Polling task sampling the container width
    Polling(AbortHandle),
    /// Nothing could be watched (no observer, no runtime to poll on)
    Inactive,
}

impl ResizeWatch {
    /// Start watching the root of `host`, calling `callback` on every change
    pub fn start<H: LayoutHost>(host: &Arc<H>, callback: ResizeCallback, poll_interval: Duration) -> Self {
        if let Some(id) = host.observe_resize(Arc::clone(&callback)) {
            tracing::debug!("Watching resizes with the host observer");
            return ResizeWatch::Observer(id);
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No resize observer and no tokio runtime - resizes are not watched");
            return ResizeWatch::Inactive;
        };

        tracing::debug!(interval_ms = poll_interval.as_millis() as u64, "Polling container width for resizes");
        let host = Arc::downgrade(host);
        let mut last_width = host.upgrade().and_then(|host| host.container_width());
        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(host) = host.upgrade() else {
                    break;
                };
                let width = host.container_width();
                if width != last_width {
                    tracing::trace!(?last_width, ?width, "Container width changed");
                    last_width = width;
                    callback();
                }
            }
        });
        ResizeWatch::Polling(task.abort_handle())
    }

    /// Stop watching
    pub fn stop<H: LayoutHost>(self, host: &H) {
        match self {
            ResizeWatch::Observer(id) => host.unobserve_resize(id),
            ResizeWatch::Polling(task) => task.abort(),
            ResizeWatch::Inactive => {}
        }
    }

    /// Whether this watch polls instead of observing
    pub fn is_polling(&self) -> bool {
        matches!(self, ResizeWatch::Polling(_))
    }
}
