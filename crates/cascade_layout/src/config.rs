//! Waterfall configuration
//!
//! All configuration types deserialize with defaults, so a host (or a config
//! file) only spells out what it changes:
//!
//! ```toml
//! [layout]
//! column_width = [240, 320]
//! gap = 16
//! max_columns = 6
//!
//! [scroll_load]
//! threshold = 300
//! ```

use cascade_core::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

/// Default target column width in pixels
pub const DEFAULT_COLUMN_WIDTH: f32 = 400.0;
/// Default scroll-load proximity threshold in pixels
pub const DEFAULT_SCROLL_LOAD_THRESHOLD: f32 = 100.0;
/// Default scroll listener debounce in milliseconds
pub const DEFAULT_SCROLL_LOAD_DEBOUNCE_MS: u64 = 200;
/// Default resize debounce in milliseconds
pub const DEFAULT_RESIZE_DEBOUNCE_MS: u64 = 100;
/// Default poll interval when the host has no resize observer
pub const DEFAULT_RESIZE_POLL_INTERVAL_MS: u64 = 250;

// ============================================================================
// Column Width
// ============================================================================

/// Target width of each column
///
/// Either one width for every column, or a sequence that repeats by column
/// position: column `i` targets `widths[i % widths.len()]`. The sequence is
/// never empty and every width is finite and positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawColumnWidth", into = "RawColumnWidth")]
pub struct ColumnWidth {
    widths: SmallVec<[f32; 4]>,
}

impl ColumnWidth {
    /// Same width for every column
    pub fn fixed(width: f32) -> Result<Self> {
        check_width(width)?;
        Ok(Self {
            widths: smallvec![width],
        })
    }

    /// Widths that cycle by column position
    pub fn cycle(widths: impl IntoIterator<Item = f32>) -> Result<Self> {
        let widths: SmallVec<[f32; 4]> = widths.into_iter().collect();
        if widths.is_empty() {
            return Err(LayoutError::EmptyColumnWidths);
        }
        for &width in &widths {
            check_width(width)?;
        }
        Ok(Self { widths })
    }

    /// Target width of the column at `index`
    pub fn target(&self, index: usize) -> f32 {
        self.widths[index % self.widths.len()]
    }

    /// The configured widths, in cycle order
    pub fn widths(&self) -> &[f32] {
        &self.widths
    }

    /// Whether every column shares one width
    pub fn is_fixed(&self) -> bool {
        self.widths.len() == 1
    }
}

impl Default for ColumnWidth {
    fn default() -> Self {
        Self {
            widths: smallvec![DEFAULT_COLUMN_WIDTH],
        }
    }
}

impl TryFrom<f32> for ColumnWidth {
    type Error = LayoutError;

    fn try_from(width: f32) -> Result<Self> {
        Self::fixed(width)
    }
}

impl TryFrom<Vec<f32>> for ColumnWidth {
    type Error = LayoutError;

    fn try_from(widths: Vec<f32>) -> Result<Self> {
        Self::cycle(widths)
    }
}

fn check_width(width: f32) -> Result<()> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidColumnWidth(width))
    }
}

/// Wire form: a bare number or an array of numbers
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawColumnWidth {
    Single(f32),
    Many(Vec<f32>),
}

impl TryFrom<RawColumnWidth> for ColumnWidth {
    type Error = LayoutError;

    fn try_from(raw: RawColumnWidth) -> Result<Self> {
        match raw {
            RawColumnWidth::Single(width) => Self::fixed(width),
            RawColumnWidth::Many(widths) => Self::cycle(widths),
        }
    }
}

impl From<ColumnWidth> for RawColumnWidth {
    fn from(width: ColumnWidth) -> Self {
        if width.is_fixed() {
            RawColumnWidth::Single(width.widths[0])
        } else {
            RawColumnWidth::Many(width.widths.into_vec())
        }
    }
}

// ============================================================================
// Layout / Scroll-Load Configuration
// ============================================================================

/// Column geometry and redraw behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Target column width(s)
    pub column_width: ColumnWidth,
    /// Space between columns, in pixels
    pub gap: f32,
    /// Lower bound on the column count (`None` or 0 means unbounded)
    pub min_columns: Option<usize>,
    /// Upper bound on the column count (`None` or 0 means unbounded)
    pub max_columns: Option<usize>,
    /// Right-to-left column order
    pub rtl: bool,
    /// Column count used for an initial round-robin layout before anything
    /// can be measured (0 disables it)
    pub ssr_columns: usize,
    /// Debounce applied to container resize notifications
    pub resize_debounce_ms: u64,
    /// Poll interval used when the host cannot observe resizes
    pub resize_poll_interval_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            column_width: ColumnWidth::default(),
            gap: 0.0,
            min_columns: None,
            max_columns: None,
            rtl: false,
            ssr_columns: 0,
            resize_debounce_ms: DEFAULT_RESIZE_DEBOUNCE_MS,
            resize_poll_interval_ms: DEFAULT_RESIZE_POLL_INTERVAL_MS,
        }
    }
}

impl LayoutConfig {
    /// Check values the type system cannot
    pub fn validate(&self) -> Result<()> {
        check_gap(self.gap)
    }
}

pub(crate) fn check_gap(gap: f32) -> Result<()> {
    if gap.is_finite() && gap >= 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidGap(gap))
    }
}

/// Scroll-triggered loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollLoadConfig {
    /// Distance from the end of content, in pixels, that triggers a load
    pub threshold: f32,
    /// Suppress loading entirely
    pub disabled: bool,
    /// Debounce applied to scroll notifications, in milliseconds
    pub debounce_ms: u64,
}

impl Default for ScrollLoadConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SCROLL_LOAD_THRESHOLD,
            disabled: false,
            debounce_ms: DEFAULT_SCROLL_LOAD_DEBOUNCE_MS,
        }
    }
}

/// Complete waterfall configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterfallConfig {
    pub layout: LayoutConfig,
    pub scroll_load: ScrollLoadConfig,
}

impl WaterfallConfig {
    /// Check values the type system cannot
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_target() {
        let width = ColumnWidth::fixed(120.0).unwrap();
        assert!(width.is_fixed());
        assert_eq!(width.target(0), 120.0);
        assert_eq!(width.target(7), 120.0);
    }

    #[test]
    fn test_cycle_width_target() {
        let width = ColumnWidth::cycle([100.0, 200.0, 300.0]).unwrap();
        assert_eq!(width.target(0), 100.0);
        assert_eq!(width.target(2), 300.0);
        assert_eq!(width.target(3), 100.0);
        assert_eq!(width.target(5), 300.0);
    }

    #[test]
    fn test_invalid_widths_rejected() {
        assert_eq!(
            ColumnWidth::cycle(Vec::new()),
            Err(LayoutError::EmptyColumnWidths)
        );
        assert_eq!(
            ColumnWidth::fixed(0.0),
            Err(LayoutError::InvalidColumnWidth(0.0))
        );
        assert!(ColumnWidth::cycle([100.0, f32::NAN]).is_err());
        assert!(ColumnWidth::try_from(-5.0).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = WaterfallConfig::default();
        assert_eq!(config.layout.column_width.target(0), 400.0);
        assert_eq!(config.layout.gap, 0.0);
        assert_eq!(config.layout.ssr_columns, 0);
        assert_eq!(config.scroll_load.threshold, 100.0);
        assert_eq!(config.scroll_load.debounce_ms, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_gap_invalid() {
        let config = LayoutConfig {
            gap: -4.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(LayoutError::InvalidGap(-4.0)));
    }

    #[test]
    fn test_deserialize_toml() {
        let config: WaterfallConfig = toml::from_str(
            r#"
            [layout]
            column_width = [240, 320]
            gap = 16
            max_columns = 6

            [scroll_load]
            threshold = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.layout.column_width.widths(), &[240.0, 320.0]);
        assert_eq!(config.layout.gap, 16.0);
        assert_eq!(config.layout.max_columns, Some(6));
        assert_eq!(config.layout.min_columns, None);
        assert_eq!(config.scroll_load.threshold, 300.0);
        assert_eq!(config.scroll_load.debounce_ms, 200);
    }

    #[test]
    fn test_deserialize_rejects_empty_widths() {
        let result: std::result::Result<LayoutConfig, _> = toml::from_str("column_width = []");
        assert!(result.is_err());
    }

    #[test]
    fn test_column_width_json_shape() {
        let fixed = ColumnWidth::fixed(300.0).unwrap();
        assert_eq!(serde_json::to_string(&fixed).unwrap(), "300.0");

        let cycle: ColumnWidth = serde_json::from_str("[100, 150]").unwrap();
        assert_eq!(cycle.widths(), &[100.0, 150.0]);
    }
}
