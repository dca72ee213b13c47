//! Cascade Layout
//!
//! Reactive waterfall (masonry) layout. Items keep their order and each goes
//! into the currently shortest column. The column count follows the container
//! width.
//!
//! - **Engine**: column count resolution and shortest-column placement
//! - **Redraw**: async redraws that measure between placements and drop
//!   superseded work
//! - **Scroll Load**: debounced, single-flight loading near the end of content
//! - **Resize**: host resize observers with a polling fallback
//! - **Headless**: an in-memory host for tests and tooling
//!
//! Rendering is left to a [`LayoutHost`] implementation.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cascade_layout::{HeadlessHost, Waterfall, WaterfallConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> cascade_core::Result<()> {
//! let host = Arc::new(HeadlessHost::new(Some(900.0)).with_item_heights(vec![120.0, 80.0, 200.0]));
//! let waterfall = Waterfall::new(host.clone(), WaterfallConfig::default(), 3, None)?;
//! waterfall.mount().await;
//! assert_eq!(waterfall.columns(), vec![vec![0], vec![1, 2]]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod headless;
pub mod host;
pub mod redraw;
pub mod resize;
pub mod scroll_load;
pub mod waterfall;

pub use config::{ColumnWidth, LayoutConfig, ScrollLoadConfig, WaterfallConfig};
pub use engine::{assign_items, pick_column, resolve_column_count, Column, ColumnBounds};
pub use headless::{HeadlessHost, HeadlessScroll};
pub use host::{LayoutHost, ScrollBinding, ScrollMetrics, ScrollSurface, ScrollTarget};
pub use redraw::{LayoutProps, RedrawCoordinator, RedrawOutcome};
pub use resize::ResizeWatch;
pub use scroll_load::{loader, LoadOutcome, Loader, ScrollLoadController};
pub use waterfall::{Change, Waterfall};
