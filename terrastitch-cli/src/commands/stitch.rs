//! Stitch command - download the tiles covering a feature file and join them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use terrastitch::assemble::{JoinerKind, RasterJoin};
use terrastitch::config::ConfigFile;
use terrastitch::coord::{normalize_extension, MAX_ZOOM};
use terrastitch::fetch::{FetchConfig, FetchProgress, RetryPolicy};
use terrastitch::pipeline::{StitchConfig, StitchPipeline, StitchReport, StitchRequest};
use terrastitch::provider::{MapboxTerrainProvider, ReqwestClient};
use terrastitch::StitchError;

use super::token;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Positional input that asks for a new token instead of stitching.
pub const TOKEN_INPUT: &str = "token";

/// Raster joiner selection for CLI arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JoinerArg {
    /// Built-in joiner (no external tools)
    Image,
    /// vips arrayjoin (requires libvips)
    Vips,
}

impl From<JoinerArg> for JoinerKind {
    fn from(arg: JoinerArg) -> Self {
        match arg {
            JoinerArg::Image => JoinerKind::Image,
            JoinerArg::Vips => JoinerKind::Vips,
        }
    }
}

/// Arguments for the stitch command.
#[derive(Debug, Clone, Args)]
pub struct StitchArgs {
    /// GeoJSON feature collection, or `token` to set the access token
    pub input: PathBuf,

    /// Output prefix: writes <OUTPUT><ext> and <OUTPUT>Bounds.json
    pub output: PathBuf,

    /// Zoom level
    pub zoom: u8,

    /// Concurrent tile downloads
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Attempts per tile, including the first
    #[arg(long)]
    pub retries: Option<u32>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Composite extension (e.g. .png, .jpg, .tif)
    #[arg(long)]
    pub extension: Option<String>,

    /// Raster joiner
    #[arg(long, value_enum)]
    pub joiner: Option<JoinerArg>,

    /// Keep the downloaded tiles after the composite is written
    #[arg(long)]
    pub keep_tiles: bool,

    /// Only fetch tiles touching the features, leaving bounding box gaps empty
    #[arg(long)]
    pub no_fill: bool,

    /// Parent directory for the run's tiles
    #[arg(long)]
    pub tile_dir: Option<PathBuf>,
}

/// Settings after applying CLI overrides to the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub fetch: FetchConfig,
    pub stitch: StitchConfig,
    pub joiner: JoinerKind,
}

/// CLI flags take precedence over the config file.
pub fn resolve_settings(args: &StitchArgs, config: &ConfigFile) -> ResolvedSettings {
    let mut fetch = config.fetch_config();
    if let Some(parallel) = args.parallel {
        fetch.max_concurrent = parallel.max(1);
    }
    if let Some(retries) = args.retries {
        fetch.retry = RetryPolicy::from_attempts(retries);
    }
    if let Some(timeout) = args.timeout {
        fetch.request_timeout = Duration::from_secs(timeout.max(1));
    }

    let mut stitch = StitchConfig::from_config_file(config);
    if let Some(extension) = &args.extension {
        stitch.extension = normalize_extension(extension);
    }
    if let Some(dir) = &args.tile_dir {
        stitch.tile_root = dir.clone();
    }
    stitch.keep_tiles |= args.keep_tiles;
    stitch.fill_gaps &= !args.no_fill;

    let joiner = args.joiner.map(JoinerKind::from).unwrap_or(config.output.joiner);

    ResolvedSettings {
        fetch,
        stitch,
        joiner,
    }
}

/// Run the stitch command.
pub fn run(args: StitchArgs) -> Result<(), CliError> {
    if args.input == Path::new(TOKEN_INPUT) {
        return token::run();
    }
    if args.zoom > MAX_ZOOM {
        return Err(StitchError::InvalidZoom(args.zoom).into());
    }

    let mut runner = CliRunner::new()?;
    runner.log_startup("stitch");

    let configured = runner.config().access_token();
    let access_token = match configured {
        Some(token) => token,
        None if Term::stdout().features().is_attended() => {
            warn!("No access token configured, prompting");
            token::prompt_and_store(runner.config_mut())?
        }
        None => return Err(StitchError::MissingCredential.into()),
    };

    let config = runner.config();
    let settings = resolve_settings(&args, config);
    let request = StitchRequest::from_file(&args.input, args.zoom, args.output.clone())?;

    let client = ReqwestClient::with_timeout(settings.fetch.request_timeout.as_secs())
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let provider = MapboxTerrainProvider::new(client, access_token)?
        .with_url_template(config.mapbox.url_template.clone());
    let joiner: Arc<dyn RasterJoin> = Arc::from(settings.joiner.build());
    let pipeline = StitchPipeline::new(provider, joiner, settings.fetch, settings.stitch);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || on_signal.cancel())
        .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    println!(
        "Stitching {} at zoom {}",
        style(args.input.display()).cyan(),
        args.zoom
    );

    let progress = progress_bar();
    let started = Instant::now();
    let result = runtime.block_on(pipeline.run(&request, &cancel, |event| {
        update_progress(&progress, &event)
    }));
    progress.finish_and_clear();

    if cancel.is_cancelled() {
        println!(
            "{} Interrupted; downloaded tiles are kept for the next run",
            style("!").yellow()
        );
    }

    let report = result?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "Stitch finished");
    print_report(&report, started.elapsed());
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tiles {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn update_progress(bar: &ProgressBar, event: &FetchProgress) {
    bar.set_length(event.total as u64);
    bar.set_position(event.completed as u64);
    bar.set_message(format!("{} ({})", event.tile.coord, event.tile.origin));
}

fn print_report(report: &StitchReport, elapsed: Duration) {
    let bounds = &report.bounds;
    println!();
    if report.composite.reused {
        println!(
            "{} Composite already exists: {}",
            style("✓").green(),
            style(report.composite.path.display()).cyan()
        );
    } else {
        println!(
            "{} Composite: {}",
            style("✓").green(),
            style(report.composite.path.display()).cyan()
        );
        println!(
            "  Tiles:     {} downloaded, {} cached ({} covering the features)",
            report.fetch.downloaded(),
            report.fetch.cached(),
            report.coverage_tiles
        );
    }
    println!(
        "  Grid:      {} x {} tiles, box {:?}",
        bounds.width(),
        bounds.height(),
        bounds.bbox()
    );
    println!("  Bounds:    {}", report.sidecar.display());
    if report.tiles_kept {
        println!("  Tiles in:  {}", report.tile_dir.display());
    }
    println!("  Elapsed:   {:.2}s", elapsed.as_secs_f64());
}
