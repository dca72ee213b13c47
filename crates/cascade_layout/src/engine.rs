//! Waterfall layout engine
//!
//! Two pure pieces of the layout:
//!
//! - **Column count**: how many columns of the configured widths fit into the
//!   container, clamped to the configured bounds.
//! - **Placement**: which column the next item goes into. Items are placed in
//!   index order, each into the currently shortest column.
//!
//! Placement during a live redraw measures rendered columns between items; see
//! [`RedrawCoordinator`](crate::redraw::RedrawCoordinator). The helpers here
//! only pick the column given heights.

use crate::config::ColumnWidth;

/// Item indices assigned to one column, in placement order
pub type Column = Vec<usize>;

/// Create `count` empty columns
pub fn create_columns(count: usize) -> Vec<Column> {
    vec![Vec::new(); count]
}

// ============================================================================
// Column Count
// ============================================================================

/// Inclusive bounds on the column count
///
/// A bound of `None` or `Some(0)` is unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ColumnBounds {
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self {
            min: min.filter(|&m| m > 0),
            max: max.filter(|&m| m > 0),
        }
    }
}

/// Count how many columns fit in `container_width`
///
/// Columns are added while `consumed + gap + width_of(count)` stays within the
/// container. `consumed` starts at `-gap` so the first column carries no
/// leading gap.
pub fn count_fitting_columns(container_width: f32, gap: f32, width_of: impl Fn(usize) -> f32) -> usize {
    let mut count = 0;
    let mut consumed = -gap;
    loop {
        let step = gap + width_of(count);
        if step.is_nan() || step <= 0.0 {
            tracing::warn!(gap, count, "Column step is not positive - stopping column count");
            return count;
        }
        if consumed + step > container_width {
            return count;
        }
        consumed += step;
        count += 1;
    }
}

/// Apply `max` then `min`, and never return fewer than one column
///
/// With `min > max` the minimum wins.
pub fn clamp_column_count(count: usize, bounds: ColumnBounds) -> usize {
    let bounds = ColumnBounds::new(bounds.min, bounds.max);
    let below_max = match bounds.max {
        Some(max) if count > max => max,
        _ => count,
    };
    let above_min = match bounds.min {
        Some(min) if below_max < min => min,
        _ => below_max,
    };
    above_min.max(1)
}

/// Resolve the column count for a container
///
/// `container_width` is `None` when the container cannot be measured (for
/// example before it is mounted); the result is then a single column and
/// bounds are not applied.
pub fn resolve_column_count(
    container_width: Option<f32>,
    gap: f32,
    column_width: &ColumnWidth,
    bounds: ColumnBounds,
) -> usize {
    let Some(width) = container_width else {
        return 1;
    };
    let fitting = count_fitting_columns(width, gap, |index| column_width.target(index));
    clamp_column_count(fitting, bounds)
}

// ============================================================================
// Placement
// ============================================================================

/// Index of the column the next item should go into
///
/// Picks the shortest of the first `column_count` columns. Columns are scanned
/// left to right, or right to left when `rtl` is set, and ties keep the first
/// column scanned. Heights missing from `heights` count as zero.
pub fn pick_column(heights: &[f32], column_count: usize, rtl: bool) -> usize {
    let height_of = |index: usize| heights.get(index).copied().unwrap_or(0.0);
    let by_height = |a: &usize, b: &usize| height_of(*a).total_cmp(&height_of(*b));
    let picked = if rtl {
        (0..column_count).rev().min_by(by_height)
    } else {
        (0..column_count).min_by(by_height)
    };
    picked.unwrap_or(0)
}

/// Place `item_count` items into `column_count` columns
///
/// `height_of(columns, index)` reports the height of column `index` given the
/// placements so far. Items are placed strictly in index order.
pub fn assign_items<F>(item_count: usize, column_count: usize, rtl: bool, mut height_of: F) -> Vec<Column>
where
    F: FnMut(&[Column], usize) -> f32,
{
    let column_count = column_count.max(1);
    let mut columns = create_columns(column_count);
    for item in 0..item_count {
        let heights: Vec<f32> = (0..column_count)
            .map(|index| height_of(&columns, index))
            .collect();
        let target = pick_column(&heights, column_count, rtl);
        columns[target].push(item);
    }
    columns
}

/// Round-robin assignment used before anything can be measured
///
/// Item `i` goes into column `i % count`. Returns no columns when `count` is 0.
pub fn ssr_columns(item_count: usize, count: usize) -> Vec<Column> {
    let mut columns = create_columns(count);
    if count == 0 {
        return columns;
    }
    for item in 0..item_count {
        columns[item % count].push(item);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn width(w: f32) -> ColumnWidth {
        ColumnWidth::fixed(w).unwrap()
    }

    #[test]
    fn test_three_columns_fit() {
        let count = resolve_column_count(Some(300.0), 0.0, &width(100.0), ColumnBounds::default());
        assert_eq!(count, 3);
    }

    #[test]
    fn test_gap_has_no_leading_offset() {
        // 100 + 10 + 100 + 10 + 100 = 320
        assert_eq!(count_fitting_columns(320.0, 10.0, |_| 100.0), 3);
        assert_eq!(count_fitting_columns(319.0, 10.0, |_| 100.0), 2);
    }

    #[test]
    fn test_cyclic_widths() {
        let widths = ColumnWidth::cycle([100.0, 200.0]).unwrap();
        // 100 + 200 + 100 = 400, next would be 600
        let count = resolve_column_count(Some(599.0), 0.0, &widths, ColumnBounds::default());
        assert_eq!(count, 3);
        let count = resolve_column_count(Some(600.0), 0.0, &widths, ColumnBounds::default());
        assert_eq!(count, 4);
    }

    #[test]
    fn test_no_measurement_is_one_column() {
        let bounds = ColumnBounds::new(Some(3), None);
        assert_eq!(resolve_column_count(None, 0.0, &width(100.0), bounds), 1);
    }

    #[test]
    fn test_too_narrow_is_one_column() {
        let count = resolve_column_count(Some(50.0), 0.0, &width(100.0), ColumnBounds::default());
        assert_eq!(count, 1);
        let count = resolve_column_count(Some(0.0), 8.0, &width(100.0), ColumnBounds::default());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_min_columns_raise() {
        let bounds = ColumnBounds::new(Some(3), None);
        assert_eq!(resolve_column_count(Some(100.0), 0.0, &width(100.0), bounds), 3);
    }

    #[test]
    fn test_max_columns_lower() {
        let bounds = ColumnBounds::new(None, Some(1));
        assert_eq!(resolve_column_count(Some(1000.0), 0.0, &width(100.0), bounds), 1);

        let bounds = ColumnBounds::new(None, Some(20));
        assert_eq!(resolve_column_count(Some(1000.0), 0.0, &width(100.0), bounds), 10);
    }

    #[test]
    fn test_zero_bounds_are_unset() {
        let bounds = ColumnBounds::new(Some(0), Some(0));
        assert_eq!(bounds, ColumnBounds::default());
        assert_eq!(clamp_column_count(0, bounds), 1);
        assert_eq!(clamp_column_count(7, ColumnBounds { min: Some(0), max: Some(0) }), 7);
    }

    #[test]
    fn test_count_within_bounds() {
        for container in [0.0f32, 90.0, 250.0, 480.0, 1200.0, 5000.0] {
            for (min, max) in [(1, 1), (2, 4), (3, 3), (1, 12)] {
                let bounds = ColumnBounds::new(Some(min), Some(max));
                let count = resolve_column_count(Some(container), 12.0, &width(110.0), bounds);
                assert!(count >= min && count <= max, "{container} {min} {max} -> {count}");
            }
        }
    }

    #[test]
    fn test_count_fits_and_next_does_not() {
        let widths = ColumnWidth::cycle([90.0, 130.0, 70.0]).unwrap();
        let gap = 6.0;
        for container in [1.0f32, 95.0, 226.0, 301.0, 777.0, 1500.0] {
            let count = resolve_column_count(Some(container), gap, &widths, ColumnBounds::default());
            assert!(count >= 1);

            let used = |n: usize| -> f32 {
                (0..n).map(|i| widths.target(i)).sum::<f32>() + gap * n.saturating_sub(1) as f32
            };
            if used(1) <= container {
                assert!(used(count) <= container);
            }
            assert!(used(count + 1) > container);
        }
    }

    #[test]
    fn test_non_positive_step_terminates() {
        assert_eq!(count_fitting_columns(100.0, -50.0, |_| 50.0), 0);
    }

    #[test]
    fn test_pick_column_first_tie() {
        assert_eq!(pick_column(&[0.0, 0.0, 0.0], 3, false), 0);
        assert_eq!(pick_column(&[10.0, 0.0, 0.0], 3, false), 1);
        assert_eq!(pick_column(&[500.0, 0.0, 200.0], 3, false), 1);
    }

    #[test]
    fn test_pick_column_rtl_tie() {
        assert_eq!(pick_column(&[0.0, 0.0, 0.0], 3, true), 2);
        assert_eq!(pick_column(&[0.0, 0.0, 10.0], 3, true), 1);
        assert_eq!(pick_column(&[5.0, 9.0, 10.0], 3, true), 0);
    }

    #[test]
    fn test_pick_column_missing_heights() {
        assert_eq!(pick_column(&[30.0], 3, false), 1);
        assert_eq!(pick_column(&[], 0, false), 0);
    }

    #[test]
    fn test_assign_two_items_into_three_columns() {
        let heights = [100.0f32, 100.0];
        let columns = assign_items(2, 3, false, |columns, index| {
            columns[index].iter().map(|&item| heights[item]).sum()
        });
        assert_eq!(columns, vec![vec![0], vec![1], vec![]]);
    }

    #[test]
    fn test_assign_places_every_item_once_in_order() {
        let item_heights: Vec<f32> = (0..57).map(|i| ((i * 37) % 11 + 1) as f32 * 10.0).collect();
        for column_count in 1..6 {
            for rtl in [false, true] {
                let columns = assign_items(item_heights.len(), column_count, rtl, |columns, index| {
                    columns[index].iter().map(|&item| item_heights[item]).sum()
                });

                let mut seen: Vec<usize> = columns.iter().flatten().copied().collect();
                seen.sort_unstable();
                assert_eq!(seen, (0..item_heights.len()).collect::<Vec<_>>());

                for column in &columns {
                    assert!(column.windows(2).all(|pair| pair[0] < pair[1]));
                }
            }
        }
    }

    #[test]
    fn test_assign_zero_items() {
        let columns = assign_items(0, 4, false, |_, _| unreachable!());
        assert_eq!(columns, create_columns(4));
    }

    #[test]
    fn test_ssr_round_robin() {
        assert_eq!(ssr_columns(5, 2), vec![vec![0, 2, 4], vec![1, 3]]);
        assert_eq!(ssr_columns(2, 1), vec![vec![0, 1]]);
        assert!(ssr_columns(3, 0).is_empty());
    }
}
