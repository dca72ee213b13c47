//! Headless host
//!
//! An in-memory [`LayoutHost`] for tests, tooling, and server-side previews.
//! Column heights are derived from per-item heights, so placement behaves like
//! it would in a real renderer without one.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cascade_layout::{HeadlessHost, Waterfall, WaterfallConfig};
//!
//! let host = Arc::new(HeadlessHost::new(Some(900.0)).with_item_heights(vec![120.0, 80.0, 200.0]));
//! let waterfall = Waterfall::new(host.clone(), WaterfallConfig::default(), 3, None)?;
//! waterfall.mount().await;
//! println!("{:?}", host.rendered_columns());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::engine::Column;
use crate::host::{
    LayoutHost, ListenerId, ObserverId, ResizeCallback, ScrollListener, ScrollMetrics,
    ScrollSurface,
};

/// Default viewport height of the headless window
pub const HEADLESS_VIEWPORT_HEIGHT: f32 = 800.0;

// ============================================================================
// Headless Host
// ============================================================================

struct HeadlessState {
    container_width: Option<f32>,
    item_heights: Vec<f32>,
    item_gap: f32,
    columns: Vec<Column>,
    /// Column heights forced by the caller, overriding computed heights
    pinned_heights: FxHashMap<usize, f32>,
    observers: SlotMap<ObserverId, ResizeCallback>,
}

/// In-memory layout host
pub struct HeadlessHost {
    state: Mutex<HeadlessState>,
    window: Arc<HeadlessScroll>,
    commits: AtomicUsize,
    resize_observer: bool,
    track_content_height: bool,
}

impl HeadlessHost {
    /// Create a host whose root measures `container_width` (`None` = unmounted)
    pub fn new(container_width: Option<f32>) -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                container_width,
                item_heights: Vec::new(),
                item_gap: 0.0,
                columns: Vec::new(),
                pinned_heights: FxHashMap::default(),
                observers: SlotMap::with_key(),
            }),
            window: Arc::new(HeadlessScroll::new(HEADLESS_VIEWPORT_HEIGHT, HEADLESS_VIEWPORT_HEIGHT)),
            commits: AtomicUsize::new(0),
            resize_observer: true,
            track_content_height: false,
        }
    }

    /// Report no resize observer, forcing the polling fallback
    pub fn without_resize_observer(mut self) -> Self {
        self.resize_observer = false;
        self
    }

    /// Keep the window's content height equal to the tallest column
    pub fn with_content_tracking(mut self) -> Self {
        self.track_content_height = true;
        self
    }

    /// Set the initial item heights
    pub fn with_item_heights(self, heights: Vec<f32>) -> Self {
        self.set_item_heights(heights);
        self
    }

    /// Change the measured root width, notifying resize observers
    pub fn set_container_width(&self, width: Option<f32>) {
        let observers: Vec<ResizeCallback> = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if state.container_width == width {
                return;
            }
            state.container_width = width;
            state.observers.values().cloned().collect()
        };
        for observer in observers {
            observer();
        }
    }

    /// Replace all item heights
    pub fn set_item_heights(&self, heights: Vec<f32>) {
        if let Ok(mut state) = self.state.lock() {
            state.item_heights = heights;
        }
    }

    /// Append item heights, returning the new item count
    pub fn push_item_heights(&self, heights: impl IntoIterator<Item = f32>) -> usize {
        match self.state.lock() {
            Ok(mut state) => {
                state.item_heights.extend(heights);
                state.item_heights.len()
            }
            Err(_) => 0,
        }
    }

    /// Number of items with a known height
    pub fn item_count(&self) -> usize {
        self.state.lock().map(|s| s.item_heights.len()).unwrap_or(0)
    }

    /// Vertical space between stacked items
    pub fn set_item_gap(&self, gap: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.item_gap = gap;
        }
    }

    /// Force the measured height of one column
    pub fn pin_column_height(&self, column: usize, height: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.pinned_heights.insert(column, height);
        }
    }

    /// Drop all forced column heights
    pub fn unpin_column_heights(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.pinned_heights.clear();
        }
    }

    /// Columns as last rendered
    pub fn rendered_columns(&self) -> Vec<Column> {
        self.state.lock().map(|s| s.columns.clone()).unwrap_or_default()
    }

    /// Number of completed layout commits
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of active resize observers
    pub fn observer_count(&self) -> usize {
        self.state.lock().map(|s| s.observers.len()).unwrap_or(0)
    }

    /// The headless window
    pub fn window_surface(&self) -> Arc<HeadlessScroll> {
        Arc::clone(&self.window)
    }

    fn heights_of(state: &HeadlessState) -> Vec<f32> {
        state
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                if let Some(&pinned) = state.pinned_heights.get(&index) {
                    return pinned;
                }
                column
                    .iter()
                    .map(|&item| state.item_heights.get(item).copied().unwrap_or(0.0))
                    .sum::<f32>()
                    + state.item_gap * column.len().saturating_sub(1) as f32
            })
            .collect()
    }
}

impl LayoutHost for HeadlessHost {
    fn container_width(&self) -> Option<f32> {
        self.state.lock().ok().and_then(|s| s.container_width)
    }

    fn column_heights(&self) -> Vec<f32> {
        self.state
            .lock()
            .map(|state| Self::heights_of(&state))
            .unwrap_or_default()
    }

    fn columns_changed(&self, columns: &[Column]) {
        let tallest = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.columns = columns.to_vec();
            Self::heights_of(&state).into_iter().fold(0.0f32, f32::max)
        };
        if self.track_content_height {
            self.window.set_content_height(tallest);
        }
    }

    async fn layout_commit(&self) {
        tokio::task::yield_now().await;
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    fn window(&self) -> Arc<dyn ScrollSurface> {
        self.window.clone()
    }

    fn observe_resize(&self, callback: ResizeCallback) -> Option<ObserverId> {
        if !self.resize_observer {
            return None;
        }
        self.state
            .lock()
            .ok()
            .map(|mut state| state.observers.insert(callback))
    }

    fn unobserve_resize(&self, id: ObserverId) {
        if let Ok(mut state) = self.state.lock() {
            state.observers.remove(id);
        }
    }
}

// ============================================================================
// Headless Scroll Surface
// ============================================================================

/// In-memory scroll surface
///
/// Programmatic scrolling does not notify listeners; use
/// [`user_scroll_to`](Self::user_scroll_to) or
/// [`dispatch_scroll`](Self::dispatch_scroll) to simulate a user scroll.
pub struct HeadlessScroll {
    metrics: Mutex<ScrollMetrics>,
    listeners: Mutex<SlotMap<ListenerId, ScrollListener>>,
}

impl HeadlessScroll {
    pub fn new(viewport_height: f32, content_height: f32) -> Self {
        Self {
            metrics: Mutex::new(ScrollMetrics {
                scroll_top: 0.0,
                viewport_height,
                content_height,
            }),
            listeners: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Change the scrollable height
    pub fn set_content_height(&self, height: f32) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.content_height = height;
        }
    }

    /// Change the visible height
    pub fn set_viewport_height(&self, height: f32) {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.viewport_height = height;
        }
    }

    /// Scroll and notify listeners, like a user scroll would
    pub fn user_scroll_to(&self, top: f32) {
        self.scroll_to(top);
        self.dispatch_scroll();
    }

    /// Scroll to the end and notify listeners
    pub fn user_scroll_to_end(&self) {
        let end = self
            .metrics
            .lock()
            .map(|m| m.content_height - m.viewport_height)
            .unwrap_or(0.0);
        self.user_scroll_to(end);
    }

    /// Call every listener once, returning how many ran
    pub fn dispatch_scroll(&self) -> usize {
        let listeners: Vec<ScrollListener> = match self.listeners.lock() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(_) => return 0,
        };
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl ScrollSurface for HeadlessScroll {
    fn metrics(&self) -> ScrollMetrics {
        self.metrics.lock().map(|m| *m).unwrap_or_default()
    }

    fn scroll_to(&self, top: f32) {
        if let Ok(mut metrics) = self.metrics.lock() {
            let max = (metrics.content_height - metrics.viewport_height).max(0.0);
            metrics.scroll_top = top.clamp(0.0, max);
        }
    }

    fn scroll_by(&self, delta: f32) {
        let top = self.metrics().scroll_top + delta;
        self.scroll_to(top);
    }

    fn add_scroll_listener(&self, listener: ScrollListener) -> ListenerId {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.insert(listener),
            Err(poisoned) => poisoned.into_inner().insert(listener),
        }
    }

    fn remove_scroll_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_column_heights_from_items() {
        let host = HeadlessHost::new(Some(300.0)).with_item_heights(vec![100.0, 50.0, 25.0]);
        host.set_item_gap(10.0);
        host.columns_changed(&[vec![0, 2], vec![1], vec![]]);
        assert_eq!(host.column_heights(), vec![135.0, 50.0, 0.0]);

        host.pin_column_height(2, 500.0);
        assert_eq!(host.column_heights(), vec![135.0, 50.0, 500.0]);
        host.unpin_column_heights();
        assert_eq!(host.column_heights()[2], 0.0);
    }

    #[test]
    fn test_content_tracking() {
        let host = HeadlessHost::new(Some(300.0))
            .with_content_tracking()
            .with_item_heights(vec![100.0, 400.0]);
        host.columns_changed(&[vec![0], vec![1]]);
        assert_eq!(host.window_surface().metrics().content_height, 400.0);
    }

    #[test]
    fn test_resize_observers() {
        let host = HeadlessHost::new(Some(300.0));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = host
            .observe_resize(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        host.set_container_width(Some(300.0));
        host.set_container_width(Some(600.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        host.unobserve_resize(id);
        host.set_container_width(Some(900.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(host.observer_count(), 0);
    }

    #[test]
    fn test_no_observer_support() {
        let host = HeadlessHost::new(Some(300.0)).without_resize_observer();
        assert!(host.observe_resize(Arc::new(|| {})).is_none());
    }

    #[test]
    fn test_scroll_clamps_and_dispatches() {
        let surface = HeadlessScroll::new(600.0, 1000.0);
        surface.scroll_to(5000.0);
        assert_eq!(surface.metrics().scroll_top, 400.0);
        surface.scroll_by(-1000.0);
        assert_eq!(surface.metrics().scroll_top, 0.0);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = surface.add_scroll_listener(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        surface.user_scroll_to_end();
        assert_eq!(surface.metrics().scroll_top, 400.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        surface.remove_scroll_listener(id);
        assert_eq!(surface.dispatch_scroll(), 0);
    }
}
