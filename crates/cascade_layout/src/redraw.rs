//! Redraw coordination
//!
//! A redraw recomputes the column count and, unless it can be skipped, places
//! every item again from scratch:
//!
//! ```text
//! redraw(force)
//!   ├─ count unchanged && !force ──► emit redrawSkip
//!   └─ otherwise
//!        replace columns with N empty ones, begin session
//!        capture scroll offset
//!        for each item:
//!            await layout_commit()
//!            session superseded? ──► abandon (no mutation)
//!            read column heights
//!            lock columns, still current? ──► append to the shortest column
//!        restore scroll offset ──► emit redraw
//! ```
//!
//! Placement waits for the host between items because the next pick depends
//! on the heights produced by the previous one.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use cascade_core::{EventEmitter, SessionCounter, WaterfallEvent};

use crate::config::ColumnWidth;
use crate::engine::{create_columns, pick_column, resolve_column_count, Column, ColumnBounds};
use crate::host::{LayoutHost, ScrollBinding};

/// Inputs a redraw reads
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutProps {
    pub column_width: ColumnWidth,
    pub gap: f32,
    pub bounds: ColumnBounds,
    pub rtl: bool,
    pub item_count: usize,
}

impl Default for LayoutProps {
    fn default() -> Self {
        Self {
            column_width: ColumnWidth::default(),
            gap: 0.0,
            bounds: ColumnBounds::default(),
            rtl: false,
            item_count: 0,
        }
    }
}

/// How a redraw ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawOutcome {
    /// Every item was placed into `columns` columns
    Completed { columns: usize },
    /// The column count was unchanged and the redraw was not forced
    Skipped,
    /// A newer redraw started, or the container went away, mid-placement
    Abandoned,
}

/// Owns the columns and serializes redraws over them
pub struct RedrawCoordinator<H: LayoutHost> {
    host: Arc<H>,
    props: RwLock<LayoutProps>,
    columns: Mutex<Vec<Column>>,
    sessions: SessionCounter,
    scroll: Arc<ScrollBinding>,
    events: Arc<EventEmitter>,
}

impl<H: LayoutHost> RedrawCoordinator<H> {
    pub fn new(
        host: Arc<H>,
        props: LayoutProps,
        scroll: Arc<ScrollBinding>,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            host,
            props: RwLock::new(props),
            columns: Mutex::new(Vec::new()),
            sessions: SessionCounter::new(),
            scroll,
            events,
        }
    }

    // =========================================================================
    // Props
    // =========================================================================

    /// Snapshot of the current inputs
    pub fn props(&self) -> LayoutProps {
        self.read_props().clone()
    }

    /// Modify the inputs; does not redraw
    pub fn update_props<R>(&self, f: impl FnOnce(&mut LayoutProps) -> R) -> R {
        let mut props = match self.props.write() {
            Ok(props) => props,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut props)
    }

    fn read_props(&self) -> std::sync::RwLockReadGuard<'_, LayoutProps> {
        match self.props.read() {
            Ok(props) => props,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_columns(&self) -> MutexGuard<'_, Vec<Column>> {
        match self.columns.lock() {
            Ok(columns) => columns,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current column contents
    pub fn columns(&self) -> Vec<Column> {
        self.lock_columns().clone()
    }

    /// Current number of columns
    pub fn column_count(&self) -> usize {
        self.lock_columns().len()
    }

    /// Target width of the column at `index`, for styling columns
    pub fn column_width_target(&self, index: usize) -> f32 {
        self.read_props().column_width.target(index)
    }

    /// Column count the next redraw would use
    pub fn candidate_column_count(&self) -> usize {
        let props = self.read_props();
        resolve_column_count(
            self.host.container_width(),
            props.gap,
            &props.column_width,
            props.bounds,
        )
    }

    /// Raw id of the most recent redraw session
    pub fn current_session(&self) -> u64 {
        self.sessions.current()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Replace the columns without a redraw (initial server-side layout)
    pub fn seed_columns(&self, columns: Vec<Column>) {
        let snapshot = {
            let mut current = self.lock_columns();
            *current = columns;
            current.clone()
        };
        self.host.columns_changed(&snapshot);
    }

    /// Abandon any in-flight redraw
    pub fn invalidate(&self) {
        self.sessions.invalidate();
    }

    /// Recompute the layout
    ///
    /// Without `force`, an unchanged column count only emits `redrawSkip`.
    pub async fn redraw(&self, force: bool) -> RedrawOutcome {
        let candidate = self.candidate_column_count();

        // The session begins under the same lock that resets the columns
        let (session, snapshot) = {
            let mut columns = self.lock_columns();
            if columns.len() == candidate && !force {
                drop(columns);
                tracing::debug!(columns = candidate, "Redraw skipped - column count unchanged");
                self.events.emit(&WaterfallEvent::RedrawSkip);
                return RedrawOutcome::Skipped;
            }
            *columns = create_columns(candidate);
            (self.sessions.begin(), columns.clone())
        };
        self.host.columns_changed(&snapshot);

        let scroll_target = self.scroll.target();
        let scroll_offset = scroll_target.scroll_offset();
        tracing::debug!(
            session = session.raw(),
            columns = candidate,
            force,
            "Redraw started"
        );

        let mut item = 0;
        while item < self.read_props().item_count {
            self.host.layout_commit().await;

            if !self.sessions.is_current(session) {
                tracing::debug!(session = session.raw(), item, "Redraw superseded");
                return RedrawOutcome::Abandoned;
            }
            if self.host.container_width().is_none() {
                tracing::debug!(session = session.raw(), item, "Redraw abandoned - container gone");
                return RedrawOutcome::Abandoned;
            }

            let rtl = self.read_props().rtl;
            let heights = self.host.column_heights();
            let (column, snapshot) = {
                let mut columns = self.lock_columns();
                // A newer redraw may have reset the columns while heights were read
                if !self.sessions.is_current(session) {
                    tracing::debug!(session = session.raw(), item, "Redraw superseded");
                    return RedrawOutcome::Abandoned;
                }
                let column = pick_column(&heights, columns.len(), rtl);
                match columns.get_mut(column) {
                    Some(target) => target.push(item),
                    None => return RedrawOutcome::Abandoned,
                }
                (column, columns.clone())
            };
            tracing::trace!(item, column, "Placed item");
            self.host.columns_changed(&snapshot);
            item += 1;
        }

        scroll_target.restore_offset(scroll_offset);
        tracing::debug!(session = session.raw(), items = item, "Redraw complete");
        self.events.emit(&WaterfallEvent::Redraw);
        RedrawOutcome::Completed { columns: candidate }
    }
}

impl<H: LayoutHost> std::fmt::Debug for RedrawCoordinator<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedrawCoordinator")
            .field("columns", &self.column_count())
            .field("session", &self.sessions.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::host::ScrollSurface;
    use futures::FutureExt;

    fn setup(
        width: Option<f32>,
        item_heights: Vec<f32>,
    ) -> (Arc<HeadlessHost>, RedrawCoordinator<HeadlessHost>, Arc<std::sync::Mutex<Vec<WaterfallEvent>>>) {
        let item_count = item_heights.len();
        let host = Arc::new(HeadlessHost::new(width).with_item_heights(item_heights));
        let events = Arc::new(EventEmitter::new());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let scroll = Arc::new(ScrollBinding::new(host.window()));
        let props = LayoutProps {
            column_width: ColumnWidth::fixed(100.0).unwrap(),
            item_count,
            ..Default::default()
        };
        let coordinator = RedrawCoordinator::new(host.clone(), props, scroll, events);
        (host, coordinator, seen)
    }

    #[tokio::test]
    async fn test_two_items_into_three_columns() {
        let (host, coordinator, _) = setup(Some(300.0), vec![100.0, 100.0]);

        let outcome = coordinator.redraw(false).await;
        assert_eq!(outcome, RedrawOutcome::Completed { columns: 3 });
        assert_eq!(coordinator.columns(), vec![vec![0], vec![1], vec![]]);
        assert_eq!(host.rendered_columns(), coordinator.columns());
        assert_eq!(host.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_second_redraw_skips() {
        let (_, coordinator, seen) = setup(Some(300.0), vec![10.0; 4]);

        assert!(matches!(coordinator.redraw(false).await, RedrawOutcome::Completed { .. }));
        assert_eq!(coordinator.redraw(false).await, RedrawOutcome::Skipped);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![WaterfallEvent::Redraw, WaterfallEvent::RedrawSkip]
        );
    }

    #[tokio::test]
    async fn test_forced_redraw_never_skips() {
        let (host, coordinator, seen) = setup(Some(300.0), vec![10.0; 4]);

        coordinator.redraw(true).await;
        let commits = host.commit_count();
        assert_eq!(coordinator.redraw(true).await, RedrawOutcome::Completed { columns: 3 });
        assert_eq!(host.commit_count(), commits + 4);

        let seen = seen.lock().unwrap();
        assert!(!seen.contains(&WaterfallEvent::RedrawSkip));
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_items_no_suspension() {
        let (host, coordinator, seen) = setup(Some(450.0), Vec::new());

        assert_eq!(coordinator.redraw(true).await, RedrawOutcome::Completed { columns: 4 });
        assert_eq!(coordinator.columns(), create_columns(4));
        assert_eq!(host.commit_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![WaterfallEvent::Redraw]);
    }

    #[tokio::test]
    async fn test_items_follow_pinned_heights() {
        let (host, coordinator, _) = setup(Some(300.0), vec![10.0, 10.0, 10.0]);
        host.pin_column_height(0, 500.0);
        host.pin_column_height(2, 200.0);
        coordinator.update_props(|props| props.item_count = 3);

        coordinator.redraw(true).await;
        assert_eq!(coordinator.columns(), vec![vec![], vec![0, 1, 2], vec![]]);
    }

    #[tokio::test]
    async fn test_rtl_ties_break_right_to_left() {
        let (_, coordinator, _) = setup(Some(300.0), vec![50.0, 50.0, 50.0, 50.0]);
        coordinator.update_props(|props| props.rtl = true);

        coordinator.redraw(true).await;
        assert_eq!(coordinator.columns(), vec![vec![2], vec![1], vec![0, 3]]);
    }

    #[tokio::test]
    async fn test_unmeasurable_container_one_column() {
        let (_, coordinator, _) = setup(None, vec![10.0, 20.0]);
        coordinator.update_props(|props| props.bounds = ColumnBounds::new(Some(3), None));

        assert_eq!(coordinator.candidate_column_count(), 1);
        // Placement stops as soon as it finds no container
        assert_eq!(coordinator.redraw(true).await, RedrawOutcome::Abandoned);
        assert_eq!(coordinator.columns(), vec![Vec::<usize>::new()]);
    }

    #[tokio::test]
    async fn test_later_redraw_wins() {
        let (host, coordinator, seen) = setup(Some(300.0), vec![10.0; 6]);

        let mut first = std::pin::pin!(coordinator.redraw(true));
        assert!(futures::poll!(first.as_mut()).is_pending());
        let stale_session = coordinator.current_session();

        host.set_container_width(Some(200.0));
        assert_eq!(coordinator.redraw(true).await, RedrawOutcome::Completed { columns: 2 });
        let settled = coordinator.columns();
        assert!(coordinator.current_session() > stale_session);

        assert_eq!(first.await, RedrawOutcome::Abandoned);
        assert_eq!(coordinator.columns(), settled);
        assert_eq!(settled.iter().map(Vec::len).sum::<usize>(), 6);
        assert_eq!(*seen.lock().unwrap(), vec![WaterfallEvent::Redraw]);
    }

    #[tokio::test]
    async fn test_scroll_offset_restored() {
        let (host, coordinator, _) = setup(Some(300.0), vec![10.0; 3]);
        let window = host.window_surface();
        window.set_content_height(5000.0);
        window.scroll_to(640.0);

        let restore = {
            let window = window.clone();
            async move {
                tokio::task::yield_now().await;
                window.scroll_to(0.0);
            }
        };
        let (outcome, _) = futures::join!(coordinator.redraw(true), restore);

        assert!(matches!(outcome, RedrawOutcome::Completed { .. }));
        assert_eq!(window.metrics().scroll_top, 640.0);
    }

    #[test]
    fn test_column_width_target() {
        let (_, coordinator, _) = setup(Some(300.0), Vec::new());
        coordinator.update_props(|props| {
            props.column_width = ColumnWidth::cycle([120.0, 80.0]).unwrap();
        });
        assert_eq!(coordinator.column_width_target(0), 120.0);
        assert_eq!(coordinator.column_width_target(3), 80.0);
    }

    #[test]
    fn test_seed_columns() {
        let (host, coordinator, _) = setup(Some(300.0), Vec::new());
        coordinator.seed_columns(vec![vec![0, 2], vec![1]]);
        assert_eq!(coordinator.column_count(), 2);
        assert_eq!(host.rendered_columns(), vec![vec![0, 2], vec![1]]);
    }

    /// Starts a forced redraw of its own coordinator the first time heights
    /// are read, leaving it parked at its first commit
    struct InterruptingHost {
        inner: HeadlessHost,
        coordinator: std::sync::OnceLock<std::sync::Weak<RedrawCoordinator<InterruptingHost>>>,
        interrupted: std::sync::atomic::AtomicBool,
    }

    impl LayoutHost for InterruptingHost {
        fn container_width(&self) -> Option<f32> {
            self.inner.container_width()
        }

        fn column_heights(&self) -> Vec<f32> {
            let heights = self.inner.column_heights();
            if !self.interrupted.swap(true, std::sync::atomic::Ordering::SeqCst) {
                let coordinator = self.coordinator.get().and_then(|weak| weak.upgrade()).unwrap();
                assert!(coordinator.redraw(true).now_or_never().is_none());
            }
            heights
        }

        fn columns_changed(&self, columns: &[Column]) {
            self.inner.columns_changed(columns);
        }

        async fn layout_commit(&self) {
            self.inner.layout_commit().await;
        }

        fn window(&self) -> Arc<dyn ScrollSurface> {
            self.inner.window()
        }
    }

    #[tokio::test]
    async fn test_stale_redraw_never_places() {
        let host = Arc::new(InterruptingHost {
            inner: HeadlessHost::new(Some(300.0)).with_item_heights(vec![100.0; 3]),
            coordinator: std::sync::OnceLock::new(),
            interrupted: std::sync::atomic::AtomicBool::new(false),
        });
        let scroll = Arc::new(ScrollBinding::new(host.window()));
        let props = LayoutProps {
            column_width: ColumnWidth::fixed(100.0).unwrap(),
            item_count: 3,
            ..Default::default()
        };
        let coordinator = Arc::new(RedrawCoordinator::new(
            host.clone(),
            props,
            scroll,
            Arc::new(EventEmitter::new()),
        ));
        host.coordinator.set(Arc::downgrade(&coordinator)).unwrap();

        // Superseded between reading heights and placing item 0
        assert_eq!(coordinator.redraw(true).await, RedrawOutcome::Abandoned);
        assert_eq!(coordinator.columns(), create_columns(3));

        assert_eq!(coordinator.redraw(true).await, RedrawOutcome::Completed { columns: 3 });
        let mut placed: Vec<usize> = coordinator.columns().into_iter().flatten().collect();
        placed.sort_unstable();
        assert_eq!(placed, vec![0, 1, 2]);
    }
}
