//! Cascade configuration file handling
//!
//! The CLI reads a single `cascade.toml`. Every table is optional:
//!
//! ```toml
//! [layout]
//! column_width = [240, 320]
//! gap = 16
//!
//! [scroll_load]
//! threshold = 200
//!
//! [container]
//! width = 1280
//! viewport_height = 900
//!
//! [items]
//! heights = [320, 180, 240]
//! spacing = 12
//!
//! [feed]
//! pages = 4
//! page_size = 24
//! ```

use anyhow::{Context, Result};
use cascade_layout::{LayoutConfig, ScrollLoadConfig, WaterfallConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File looked up when a directory is given
pub const CONFIG_FILE_NAME: &str = "cascade.toml";

/// Complete CLI configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CascadeFile {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub scroll_load: ScrollLoadConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub items: ItemsConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Simulated container
#[derive(Debug, Deserialize, Serialize)]
pub struct ContainerConfig {
    #[serde(default = "default_container_width")]
    pub width: f32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            width: default_container_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

fn default_container_width() -> f32 {
    1200.0
}

fn default_viewport_height() -> f32 {
    800.0
}

/// Item heights to lay out
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ItemsConfig {
    /// Explicit heights; generated from `[feed]` when empty
    #[serde(default)]
    pub heights: Vec<f32>,
    /// Vertical space between items in a column
    #[serde(default)]
    pub spacing: f32,
}

/// Generated feed used by `cascade feed` and when no heights are given
#[derive(Debug, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default = "default_pages")]
    pub pages: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_min_height")]
    pub min_height: f32,
    #[serde(default = "default_max_height")]
    pub max_height: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            page_size: default_page_size(),
            min_height: default_min_height(),
            max_height: default_max_height(),
            seed: default_seed(),
        }
    }
}

fn default_pages() -> usize {
    3
}

fn default_page_size() -> usize {
    20
}

fn default_min_height() -> f32 {
    120.0
}

fn default_max_height() -> f32 {
    480.0
}

fn default_seed() -> u64 {
    0x5eed
}

impl CascadeFile {
    /// Load from a file, or from `cascade.toml` inside a directory
    ///
    /// A missing `cascade.toml` in a directory yields the defaults; an
    /// explicitly named file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let file = Self::resolve_path(path);
        if !file.exists() {
            if path.is_dir() {
                tracing::debug!("No {} in {} - using defaults", CONFIG_FILE_NAME, path.display());
                return Ok(Self::default());
            }
            anyhow::bail!("Config file {} not found", file.display());
        }

        let content = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let config: CascadeFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", file.display()))?;
        config
            .waterfall_config()
            .validate()
            .with_context(|| format!("Invalid layout in {}", file.display()))?;
        config.check_ranges()?;

        Ok(config)
    }

    fn resolve_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(CONFIG_FILE_NAME)
        } else {
            path.to_path_buf()
        }
    }

    fn check_ranges(&self) -> Result<()> {
        if !(self.container.width.is_finite() && self.container.width >= 0.0) {
            anyhow::bail!("container.width must be a non-negative number");
        }
        if self.feed.min_height > self.feed.max_height {
            anyhow::bail!(
                "feed.min_height ({}) is greater than feed.max_height ({})",
                self.feed.min_height,
                self.feed.max_height
            );
        }
        if self.items.heights.iter().any(|h| !h.is_finite() || *h < 0.0) {
            anyhow::bail!("items.heights must be non-negative numbers");
        }
        Ok(())
    }

    /// The waterfall part of the file
    pub fn waterfall_config(&self) -> WaterfallConfig {
        WaterfallConfig {
            layout: self.layout.clone(),
            scroll_load: self.scroll_load.clone(),
        }
    }

    /// Explicit heights, or the first generated page when none are given
    pub fn initial_heights(&self) -> Vec<f32> {
        if self.items.heights.is_empty() {
            self.feed_heights().page(0)
        } else {
            self.items.heights.clone()
        }
    }

    /// Generator for feed pages
    pub fn feed_heights(&self) -> FeedHeights {
        FeedHeights {
            seed: self.feed.seed,
            page_size: self.feed.page_size,
            min: self.feed.min_height,
            max: self.feed.max_height,
        }
    }
}

/// Deterministic item heights, page by page
#[derive(Debug, Clone, Copy)]
pub struct FeedHeights {
    seed: u64,
    page_size: usize,
    min: f32,
    max: f32,
}

impl FeedHeights {
    /// Heights of page `page`; the same page always yields the same heights
    pub fn page(&self, page: usize) -> Vec<f32> {
        // splitmix64
        let mut state = self.seed ^ (page as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        (0..self.page_size)
            .map(|_| {
                state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
                let mut z = state;
                z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
                z ^= z >> 31;
                let unit = (z >> 40) as f32 / (1u64 << 24) as f32;
                (self.min + unit * (self.max - self.min)).round()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: CascadeFile = toml::from_str("").unwrap();
        assert_eq!(config.container.width, 1200.0);
        assert_eq!(config.feed.pages, 3);
        assert_eq!(config.initial_heights().len(), 20);
        assert_eq!(config.waterfall_config(), WaterfallConfig::default());
    }

    #[test]
    fn test_parse_tables() {
        let config: CascadeFile = toml::from_str(
            r#"
            [layout]
            column_width = 300
            gap = 8

            [container]
            width = 640

            [items]
            heights = [100, 200]
            "#,
        )
        .unwrap();

        assert_eq!(config.layout.column_width.target(0), 300.0);
        assert_eq!(config.container.width, 640.0);
        assert_eq!(config.container.viewport_height, 800.0);
        assert_eq!(config.initial_heights(), vec![100.0, 200.0]);
    }

    #[test]
    fn test_feed_pages_deterministic() {
        let feed = CascadeFile::default().feed_heights();
        let first = feed.page(1);
        assert_eq!(first, feed.page(1));
        assert_ne!(first, feed.page(2));
        assert!(first.iter().all(|h| (120.0..=480.0).contains(h)));
    }

    #[test]
    fn test_load_missing_file() {
        let missing = std::env::temp_dir().join("cascade-missing-config.toml");
        assert!(CascadeFile::load(&missing).is_err());
    }

    #[test]
    fn test_load_rejects_bad_gap() {
        let path = std::env::temp_dir().join(format!("cascade-bad-gap-{}.toml", std::process::id()));
        fs::write(&path, "[layout]\ngap = -3\n").unwrap();
        let result = CascadeFile::load(&path);
        fs::remove_file(&path).unwrap();

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Invalid layout"), "{message}");
        assert!(message.contains("gap"), "{message}");
    }
}
