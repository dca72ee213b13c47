//! Cascade CLI
//!
//! Run waterfall layouts headlessly from a config file.

use anyhow::{Context, Result};
use cascade_core::{LoadError, WaterfallEvent};
use cascade_layout::{
    loader, resolve_column_count, Change, ColumnBounds, HeadlessHost, LayoutHost, RedrawOutcome,
    ScrollSurface, Waterfall,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::CascadeFile;

/// How long `feed` waits for one page before giving up
const PAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "cascade")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cascade waterfall layout CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out the configured items and print the columns
    Layout {
        /// Config file or directory containing cascade.toml
        #[arg(default_value = ".")]
        config: PathBuf,

        /// Override the container width
        #[arg(short, long)]
        width: Option<f32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the column count and width targets for a container
    Columns {
        /// Config file or directory containing cascade.toml
        #[arg(default_value = ".")]
        config: PathBuf,

        /// Override the container width
        #[arg(short, long)]
        width: Option<f32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Simulate infinite scrolling, loading one page per scroll to the end
    Feed {
        /// Config file or directory containing cascade.toml
        #[arg(default_value = ".")]
        config: PathBuf,

        /// Override the number of pages to load
        #[arg(short, long)]
        pages: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate a config file
    Check {
        /// Config file or directory containing cascade.toml
        #[arg(default_value = ".")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Layout {
            config,
            width,
            json,
        } => cmd_layout(&config, width, json),

        Commands::Columns {
            config,
            width,
            json,
        } => cmd_columns(&config, width, json),

        Commands::Feed {
            config,
            pages,
            json,
        } => cmd_feed(&config, pages, json),

        Commands::Check { config } => cmd_check(&config),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start the async runtime")
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Serialize)]
struct ColumnReport {
    width_target: f32,
    height: f32,
    items: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct LayoutReport {
    container_width: f32,
    item_count: usize,
    columns: Vec<ColumnReport>,
}

impl LayoutReport {
    fn capture(waterfall: &Waterfall<HeadlessHost>, container_width: f32) -> Self {
        let heights = waterfall.host().column_heights();
        let columns: Vec<ColumnReport> = waterfall
            .columns()
            .into_iter()
            .enumerate()
            .map(|(index, items)| ColumnReport {
                width_target: waterfall.column_width_target(index),
                height: heights.get(index).copied().unwrap_or(0.0),
                items,
            })
            .collect();
        Self {
            container_width,
            item_count: columns.iter().map(|c| c.items.len()).sum(),
            columns,
        }
    }

    fn print_text(&self) {
        println!(
            "{} items in {} columns ({}px container)",
            self.item_count,
            self.columns.len(),
            self.container_width
        );
        for (index, column) in self.columns.iter().enumerate() {
            let items: Vec<String> = column.items.iter().map(usize::to_string).collect();
            println!(
                "  column {index} [{}px, {}px tall]: {}",
                column.width_target,
                column.height,
                items.join(" ")
            );
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn headless_host(config: &CascadeFile, width: f32, heights: Vec<f32>) -> Arc<HeadlessHost> {
    let host = HeadlessHost::new(Some(width))
        .with_content_tracking()
        .with_item_heights(heights);
    host.set_item_gap(config.items.spacing);
    host.window_surface()
        .set_viewport_height(config.container.viewport_height);
    Arc::new(host)
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_layout(path: &Path, width: Option<f32>, json: bool) -> Result<()> {
    let config = CascadeFile::load(path)?;
    let width = width.unwrap_or(config.container.width);
    let heights = config.initial_heights();
    let item_count = heights.len();

    info!("Laying out {} items in a {}px container", item_count, width);

    let host = headless_host(&config, width, heights);
    let waterfall = Waterfall::new(host, config.waterfall_config(), item_count, None)
        .context("Invalid waterfall configuration")?;

    let outcome = runtime()?.block_on(waterfall.mount());
    if !matches!(outcome, Some(RedrawOutcome::Completed { .. } | RedrawOutcome::Skipped)) {
        anyhow::bail!("Layout did not complete: {:?}", outcome);
    }

    let report = LayoutReport::capture(&waterfall, width);
    if json {
        print_json(&report)
    } else {
        report.print_text();
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ColumnsReport {
    container_width: f32,
    column_count: usize,
    width_targets: Vec<f32>,
    used_width: f32,
}

fn cmd_columns(path: &Path, width: Option<f32>, json: bool) -> Result<()> {
    let config = CascadeFile::load(path)?;
    let width = width.unwrap_or(config.container.width);
    let layout = &config.layout;

    let bounds = ColumnBounds::new(layout.min_columns, layout.max_columns);
    let column_count = resolve_column_count(Some(width), layout.gap, &layout.column_width, bounds);
    let width_targets: Vec<f32> = (0..column_count)
        .map(|index| layout.column_width.target(index))
        .collect();
    let used_width =
        width_targets.iter().sum::<f32>() + layout.gap * column_count.saturating_sub(1) as f32;

    let report = ColumnsReport {
        container_width: width,
        column_count,
        width_targets,
        used_width,
    };

    if json {
        return print_json(&report);
    }

    println!(
        "{} columns in a {}px container",
        report.column_count, report.container_width
    );
    let targets: Vec<String> = report
        .width_targets
        .iter()
        .map(|w| format!("{w}px"))
        .collect();
    println!("  widths: {}", targets.join(", "));
    println!("  used:   {}px (gap {}px)", report.used_width, layout.gap);
    if report.used_width > report.container_width {
        warn!("Columns overflow the container - min_columns forces more than fit");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct FeedPage {
    page: usize,
    outcome: String,
    layout: LayoutReport,
}

fn cmd_feed(path: &Path, pages: Option<usize>, json: bool) -> Result<()> {
    let config = CascadeFile::load(path)?;
    let pages = pages.unwrap_or(config.feed.pages);
    let width = config.container.width;
    let feed = config.feed_heights();

    let first_page = feed.page(0);
    let host = headless_host(&config, width, first_page.clone());

    // The loader appends the next page to the host and reports the new count
    let (loaded_tx, mut loaded_rx) = mpsc::unbounded_channel::<usize>();
    let next_page = Arc::new(std::sync::atomic::AtomicUsize::new(1));
    let page_loader = {
        let host = Arc::clone(&host);
        loader(move || {
            let host = Arc::clone(&host);
            let loaded_tx = loaded_tx.clone();
            let page = next_page.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let heights = feed.page(page);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let count = host.push_item_heights(heights);
                loaded_tx
                    .send(count)
                    .map_err(|_| LoadError::new("feed closed"))
            }
        })
    };

    let waterfall = Waterfall::new(
        Arc::clone(&host),
        config.waterfall_config(),
        first_page.len(),
        Some(page_loader),
    )
    .context("Invalid waterfall configuration")?;
    waterfall.subscribe(|event| {
        if let WaterfallEvent::ScrollLoadEnd { error: Some(error) } = event {
            warn!("Page load failed: {}", error);
        }
    });

    let reports = runtime()?.block_on(async {
        let mut reports = Vec::with_capacity(pages + 1);
        let outcome = waterfall.mount().await;
        reports.push(FeedPage {
            page: 0,
            outcome: format!("{outcome:?}"),
            layout: LayoutReport::capture(&waterfall, width),
        });

        let window = host.window_surface();
        for page in 1..=pages {
            window.user_scroll_to_end();
            let count = tokio::time::timeout(PAGE_TIMEOUT, loaded_rx.recv())
                .await
                .with_context(|| {
                    let metrics = window.metrics();
                    format!(
                        "Page {page} did not load (scrolled to {}px of {}px)",
                        metrics.scroll_top, metrics.content_height
                    )
                })?
                .context("Loader stopped")?;

            let outcomes = waterfall.apply([Change::Items(count)]).await?;
            info!("Page {} loaded: {} items", page, count);
            reports.push(FeedPage {
                page,
                outcome: format!("{outcomes:?}"),
                layout: LayoutReport::capture(&waterfall, width),
            });
        }
        waterfall.unmount();
        anyhow::Ok(reports)
    })?;

    if json {
        return print_json(&reports);
    }
    for report in &reports {
        println!("page {} ({})", report.page, report.outcome);
        report.layout.print_text();
    }
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let config = CascadeFile::load(path)?;
    let layout = &config.layout;

    info!("Config OK");
    println!("column widths: {:?}", layout.column_width.widths());
    println!("gap:           {}px", layout.gap);
    println!(
        "bounds:        min {:?}, max {:?}",
        layout.min_columns, layout.max_columns
    );
    println!("direction:     {}", if layout.rtl { "rtl" } else { "ltr" });
    println!(
        "scroll load:   threshold {}px, debounce {}ms{}",
        config.scroll_load.threshold,
        config.scroll_load.debounce_ms,
        if config.scroll_load.disabled {
            " (disabled)"
        } else {
            ""
        }
    );

    if let (Some(min), Some(max)) = (layout.min_columns, layout.max_columns) {
        if min > 0 && max > 0 && min > max {
            warn!("min_columns ({}) > max_columns ({}) - min wins", min, max);
        }
    }
    Ok(())
}
