//! Host integration
//!
//! The layout never renders anything itself. A host (a UI toolkit, a test
//! harness, the headless host in this crate) implements [`LayoutHost`] to:
//!
//! - report the width of the waterfall root and the rendered column heights
//! - render column contents whenever they change
//! - resolve [`LayoutHost::layout_commit`] once a change is visible to
//!   measurement
//! - expose the window as a [`ScrollSurface`], plus an optional resize
//!   observer for the root
//!
//! Scroll containers other than the window are handed to the waterfall as
//! [`ScrollSurface`] trait objects.

use std::future::Future;
use std::sync::{Arc, RwLock};

use slotmap::new_key_type;

use crate::engine::Column;

new_key_type! {
    /// Handle for a registered scroll listener
    pub struct ListenerId;
    /// Handle for a registered resize observer
    pub struct ObserverId;
}

/// Callback invoked on every scroll of a surface
pub type ScrollListener = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked when the waterfall root changes size
pub type ResizeCallback = Arc<dyn Fn() + Send + Sync>;

// ============================================================================
// Layout Host
// ============================================================================

/// Rendering side of a waterfall
pub trait LayoutHost: Send + Sync + 'static {
    /// Measured width of the waterfall root, `None` while it cannot be measured
    fn container_width(&self) -> Option<f32>;

    /// Rendered height of each column, indexed by column
    fn column_heights(&self) -> Vec<f32>;

    /// Column contents changed and should be rendered
    fn columns_changed(&self, columns: &[Column]);

    /// Resolves once the last [`columns_changed`](Self::columns_changed) has
    /// been applied and its effect is visible through
    /// [`column_heights`](Self::column_heights)
    fn layout_commit(&self) -> impl Future<Output = ()> + Send;

    /// The global viewport
    fn window(&self) -> Arc<dyn ScrollSurface>;

    /// Start observing size changes of the waterfall root
    ///
    /// Returns `None` when the platform has no resize observer; the waterfall
    /// then falls back to polling [`container_width`](Self::container_width).
    fn observe_resize(&self, callback: ResizeCallback) -> Option<ObserverId> {
        let _ = callback;
        None
    }

    /// Stop an observer returned by [`observe_resize`](Self::observe_resize)
    fn unobserve_resize(&self, id: ObserverId) {
        let _ = id;
    }
}

// ============================================================================
// Scroll Surfaces
// ============================================================================

/// Scroll geometry of a surface, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    /// Current scroll offset from the top
    pub scroll_top: f32,
    /// Visible height (window inner height or container client height)
    pub viewport_height: f32,
    /// Total scrollable height (document or container scroll height)
    pub content_height: f32,
}

impl ScrollMetrics {
    /// Whether the bottom of the viewport is within `threshold` of the end
    pub fn is_near_end(&self, threshold: f32) -> bool {
        self.scroll_top + self.viewport_height >= self.content_height - threshold
    }
}

/// Something that scrolls vertically: the window or a container element
pub trait ScrollSurface: Send + Sync {
    /// Current scroll geometry
    fn metrics(&self) -> ScrollMetrics;

    /// Scroll to an absolute offset
    fn scroll_to(&self, top: f32);

    /// Scroll by a relative amount
    fn scroll_by(&self, delta: f32);

    /// Register a listener called on every scroll
    fn add_scroll_listener(&self, listener: ScrollListener) -> ListenerId;

    /// Remove a listener returned by [`add_scroll_listener`](Self::add_scroll_listener)
    fn remove_scroll_listener(&self, id: ListenerId);
}

/// The surface whose scroll position the waterfall tracks
#[derive(Clone)]
pub enum ScrollTarget {
    /// No container configured; the global viewport
    Window(Arc<dyn ScrollSurface>),
    /// An explicit scroll container
    Element(Arc<dyn ScrollSurface>),
}

impl ScrollTarget {
    /// The underlying surface
    pub fn surface(&self) -> &Arc<dyn ScrollSurface> {
        match self {
            ScrollTarget::Window(surface) | ScrollTarget::Element(surface) => surface,
        }
    }

    /// Whether this is the global viewport
    pub fn is_window(&self) -> bool {
        matches!(self, ScrollTarget::Window(_))
    }

    /// Current scroll offset
    pub fn scroll_offset(&self) -> f32 {
        self.surface().metrics().scroll_top
    }

    /// Put the scroll offset back to `offset`
    ///
    /// The window is scrolled to the absolute offset; containers are scrolled
    /// by the difference from where they are now.
    pub fn restore_offset(&self, offset: f32) {
        match self {
            ScrollTarget::Window(surface) => surface.scroll_to(offset),
            ScrollTarget::Element(surface) => {
                let current = surface.metrics().scroll_top;
                surface.scroll_by(offset - current);
            }
        }
    }

    /// Whether both targets refer to the same surface
    pub fn same_surface(&self, other: &ScrollTarget) -> bool {
        Arc::ptr_eq(self.surface(), other.surface())
    }
}

impl std::fmt::Debug for ScrollTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrollTarget::Window(_) => f.write_str("ScrollTarget::Window"),
            ScrollTarget::Element(_) => f.write_str("ScrollTarget::Element"),
        }
    }
}

/// Window plus the optional scroll container, shared by the redraw
/// coordinator and the scroll-load controller
pub struct ScrollBinding {
    window: Arc<dyn ScrollSurface>,
    container: RwLock<Option<Arc<dyn ScrollSurface>>>,
}

impl ScrollBinding {
    pub fn new(window: Arc<dyn ScrollSurface>) -> Self {
        Self {
            window,
            container: RwLock::new(None),
        }
    }

    /// The container if one is set, otherwise the window
    pub fn target(&self) -> ScrollTarget {
        match self.container.read().ok().and_then(|c| c.clone()) {
            Some(container) => ScrollTarget::Element(container),
            None => ScrollTarget::Window(Arc::clone(&self.window)),
        }
    }

    /// Replace the scroll container; `None` falls back to the window
    pub fn set_container(&self, container: Option<Arc<dyn ScrollSurface>>) {
        if let Ok(mut current) = self.container.write() {
            *current = container;
        }
    }

    /// Whether an explicit container is set
    pub fn has_container(&self) -> bool {
        self.container.read().is_ok_and(|c| c.is_some())
    }
}

impl std::fmt::Debug for ScrollBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollBinding")
            .field("container", &self.has_container())
            .finish()
    }
}
