//! Waterfall component
//!
//! Ties the pieces together for one waterfall instance:
//!
//! - a [`RedrawCoordinator`] that owns the columns
//! - a [`ScrollLoadController`] listening on the scroll target
//! - a [`ResizeWatch`] feeding a debounced, non-forced redraw
//!
//! Prop changes go through [`Waterfall::apply`]. Item and direction changes
//! force a full redraw; geometry changes redraw only if the column count
//! changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use cascade_core::{Debounced, EventEmitter, Result, SubscriberId, WaterfallEvent};
use futures::future::join_all;
use tokio::runtime::Handle;

use crate::config::{check_gap, ColumnWidth, WaterfallConfig};
use crate::engine::{ssr_columns, Column, ColumnBounds};
use crate::host::{LayoutHost, ResizeCallback, ScrollBinding, ScrollSurface};
use crate::redraw::{LayoutProps, RedrawCoordinator, RedrawOutcome};
use crate::resize::ResizeWatch;
use crate::scroll_load::{LoadOutcome, Loader, ScrollLoadController};

/// A change to one waterfall input
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The item list was replaced; carries the new length
    Items(usize),
    Rtl(bool),
    ColumnWidth(ColumnWidth),
    Gap(f32),
    MinColumns(Option<usize>),
    MaxColumns(Option<usize>),
}

struct WaterfallInner<H: LayoutHost> {
    host: Arc<H>,
    coordinator: RedrawCoordinator<H>,
    scroll_load: ScrollLoadController,
    scroll: Arc<ScrollBinding>,
    events: Arc<EventEmitter>,
    resize: Mutex<Option<ResizeWatch>>,
    resize_redraw: Debounced,
    resize_poll_interval: Duration,
    mounted: AtomicBool,
}

impl<H: LayoutHost> Drop for WaterfallInner<H> {
    fn drop(&mut self) {
        if let Some(watch) = self.resize.get_mut().ok().and_then(Option::take) {
            watch.stop(self.host.as_ref());
        }
    }
}

/// A reactive waterfall bound to a host
///
/// Cloning yields another handle to the same waterfall.
pub struct Waterfall<H: LayoutHost> {
    inner: Arc<WaterfallInner<H>>,
}

impl<H: LayoutHost> Clone for Waterfall<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: LayoutHost> Waterfall<H> {
    /// Create a waterfall over `item_count` items
    ///
    /// With `layout.ssr_columns > 0` the items are assigned round-robin right
    /// away, so something can be rendered before the first measurement.
    pub fn new(host: Arc<H>, config: WaterfallConfig, item_count: usize, loader: Option<Loader>) -> Result<Self> {
        config.validate()?;
        let WaterfallConfig { layout, scroll_load } = config;

        let events = Arc::new(EventEmitter::new());
        let scroll = Arc::new(ScrollBinding::new(host.window()));
        let props = LayoutProps {
            column_width: layout.column_width,
            gap: layout.gap,
            bounds: ColumnBounds::new(layout.min_columns, layout.max_columns),
            rtl: layout.rtl,
            item_count,
        };
        let coordinator = RedrawCoordinator::new(
            Arc::clone(&host),
            props,
            Arc::clone(&scroll),
            Arc::clone(&events),
        );
        if layout.ssr_columns > 0 {
            tracing::debug!(columns = layout.ssr_columns, items = item_count, "Seeding round-robin columns");
            coordinator.seed_columns(ssr_columns(item_count, layout.ssr_columns));
        }
        let scroll_load = ScrollLoadController::new(
            loader,
            scroll_load,
            Arc::clone(&scroll),
            Arc::clone(&events),
        );

        let resize_delay = Duration::from_millis(layout.resize_debounce_ms);
        let inner = Arc::new_cyclic(|weak: &Weak<WaterfallInner<H>>| {
            let weak = weak.clone();
            WaterfallInner {
                host,
                coordinator,
                scroll_load,
                scroll,
                events,
                resize: Mutex::new(None),
                resize_redraw: Debounced::new(resize_delay, move || {
                    if let Some(inner) = weak.upgrade() {
                        Waterfall { inner }.spawn_resize_redraw();
                    }
                }),
                resize_poll_interval: Duration::from_millis(layout.resize_poll_interval_ms),
                mounted: AtomicBool::new(false),
            }
        });
        Ok(Self { inner })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Attach to the host and lay out
    ///
    /// Starts resize watching and the scroll listener, then runs a non-forced
    /// redraw. Returns `None` when already mounted or the root cannot be
    /// measured yet.
    pub async fn mount(&self) -> Option<RedrawOutcome> {
        if self.inner.mounted.swap(true, Ordering::AcqRel) {
            tracing::debug!("Waterfall already mounted");
            return None;
        }

        self.start_resize_watch();
        self.inner.scroll_load.attach();

        if self.inner.host.container_width().is_none() {
            tracing::debug!("Waterfall root not measurable - waiting for a resize");
            return None;
        }
        Some(self.redraw(false).await)
    }

    /// Detach from the host
    ///
    /// Any in-flight redraw is abandoned at its next step. An in-flight load
    /// is left to settle.
    pub fn unmount(&self) {
        if !self.inner.mounted.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.coordinator.invalidate();
        self.inner.resize_redraw.cancel();
        let watch = self.inner.resize.lock().ok().and_then(|mut watch| watch.take());
        if let Some(watch) = watch {
            watch.stop(self.inner.host.as_ref());
        }
        self.inner.scroll_load.detach();
        tracing::debug!("Waterfall unmounted");
    }

    /// Whether [`mount`](Self::mount) ran without a later unmount
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::Acquire)
    }

    fn start_resize_watch(&self) {
        let weak = Arc::downgrade(&self.inner);
        let callback: ResizeCallback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.resize_redraw.call();
            }
        });
        let watch = ResizeWatch::start(&self.inner.host, callback, self.inner.resize_poll_interval);
        if let Ok(mut slot) = self.inner.resize.lock() {
            if let Some(previous) = slot.replace(watch) {
                previous.stop(self.inner.host.as_ref());
            }
        }
    }

    fn spawn_resize_redraw(&self) {
        if !self.is_mounted() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("Resize redraw outside of a tokio runtime - skipped");
            return;
        };
        let waterfall = self.clone();
        runtime.spawn(async move {
            waterfall.redraw(false).await;
        });
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    /// Apply input changes and run the redraws they call for
    ///
    /// All changes are written before anything is redrawn. At most one forced
    /// redraw (items, direction) and one non-forced redraw (geometry) run,
    /// concurrently, with the forced one started first. Values equal to the
    /// current ones trigger nothing, except [`Change::Items`] which always
    /// forces. Before mount, changes are stored and nothing is redrawn.
    pub async fn apply(&self, changes: impl IntoIterator<Item = Change>) -> Result<Vec<RedrawOutcome>> {
        let changes: Vec<Change> = changes.into_iter().collect();
        for change in &changes {
            if let Change::Gap(gap) = change {
                check_gap(*gap)?;
            }
        }

        let (forced, geometry) = self.inner.coordinator.update_props(|props| {
            let mut forced = false;
            let mut geometry = false;
            for change in changes {
                match change {
                    Change::Items(count) => {
                        props.item_count = count;
                        forced = true;
                    }
                    Change::Rtl(rtl) if props.rtl != rtl => {
                        props.rtl = rtl;
                        forced = true;
                    }
                    Change::ColumnWidth(width) if props.column_width != width => {
                        props.column_width = width;
                        geometry = true;
                    }
                    Change::Gap(gap) if props.gap != gap => {
                        props.gap = gap;
                        geometry = true;
                    }
                    Change::MinColumns(min) => {
                        let bounds = ColumnBounds::new(min, props.bounds.max);
                        geometry |= bounds != props.bounds;
                        props.bounds = bounds;
                    }
                    Change::MaxColumns(max) => {
                        let bounds = ColumnBounds::new(props.bounds.min, max);
                        geometry |= bounds != props.bounds;
                        props.bounds = bounds;
                    }
                    _ => {}
                }
            }
            (forced, geometry)
        });

        if !self.is_mounted() {
            return Ok(Vec::new());
        }

        let mut redraws = Vec::with_capacity(2);
        if forced {
            redraws.push(self.redraw(true));
        }
        if geometry {
            redraws.push(self.redraw(false));
        }
        Ok(join_all(redraws).await)
    }

    /// Use `container` as the scroll target, or the window for `None`
    pub fn set_scroll_container(&self, container: Option<Arc<dyn ScrollSurface>>) {
        self.inner.scroll.set_container(container);
        if self.is_mounted() {
            self.inner.scroll_load.retarget();
        }
    }

    /// Suppress or re-enable scroll loading
    pub fn set_scroll_load_disabled(&self, disabled: bool) {
        self.inner.scroll_load.set_disabled(disabled);
    }

    /// Change the scroll-load proximity threshold
    pub fn set_scroll_load_threshold(&self, threshold: f32) {
        self.inner.scroll_load.set_threshold(threshold);
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Recompute the layout; see [`RedrawCoordinator::redraw`]
    pub async fn redraw(&self, force: bool) -> RedrawOutcome {
        self.inner.coordinator.redraw(force).await
    }

    /// Check scroll proximity now instead of waiting for a scroll
    pub fn check_scroll_load(&self) -> Option<tokio::task::JoinHandle<LoadOutcome>> {
        self.inner.scroll_load.check_scroll_load()
    }

    /// Run the loader now unless one is in flight
    pub async fn trigger_scroll_load(&self) -> LoadOutcome {
        self.inner.scroll_load.trigger_scroll_load().await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn columns(&self) -> Vec<Column> {
        self.inner.coordinator.columns()
    }

    pub fn column_count(&self) -> usize {
        self.inner.coordinator.column_count()
    }

    /// Target width of the column at `index`
    pub fn column_width_target(&self, index: usize) -> f32 {
        self.inner.coordinator.column_width_target(index)
    }

    /// Whether a scroll load is in flight
    pub fn is_loading(&self) -> bool {
        self.inner.scroll_load.is_loading()
    }

    pub fn host(&self) -> &Arc<H> {
        &self.inner.host
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a callback for all waterfall events
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&WaterfallEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.events.unsubscribe(id)
    }
}

impl<H: LayoutHost> std::fmt::Debug for Waterfall<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waterfall")
            .field("mounted", &self.is_mounted())
            .field("columns", &self.column_count())
            .field("scroll_load", &self.inner.scroll_load)
            .finish()
    }
}
