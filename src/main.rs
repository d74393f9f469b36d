use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use floorplan_tiles::Retryable;
use floorplan_tiles::batch::{BatchMode, BatchOrchestrator};
use floorplan_tiles::config::{FloorManifest, TileFormat, TilingConfig};
use floorplan_tiles::logging::init_logging;
use floorplan_tiles::pipeline::{GenerationReport, TilePipeline};
use floorplan_tiles::queue::{ConflictPolicy, GenerationQueue, JobKind};
use floorplan_tiles::source::{FloorPlanSource, validate_source};
use floorplan_tiles::store::content_type;

/// Deep Zoom tile pyramids for floor plans.
#[derive(Parser, Debug)]
#[command(name = "tilegen")]
#[command(about = "🗺️  Generate and manage Deep Zoom tile pyramids for floor plans")]
#[command(long_about = "Generate and manage Deep Zoom tile pyramids for floor plans.
Sources may be raster images (PNG, JPEG, TIFF, ...) or, with the 'pdf' feature,
single-page PDF documents. Settings come from --config, then the TILES_DIR,
TILE_SIZE, TILE_OVERLAP and TILE_DPI environment variables, then flags.")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the floor-{id} tile trees
    #[arg(long, global = true)]
    tiles_dir: Option<PathBuf>,

    /// Tile edge in pixels
    #[arg(long, global = true)]
    tile_size: Option<u32>,

    /// Pixels shared with neighbouring tiles
    #[arg(long, global = true)]
    overlap: Option<u32>,

    /// Rasterization DPI for document sources
    #[arg(long, global = true)]
    dpi: Option<u32>,

    /// Tile format: png or jpeg
    #[arg(long, global = true)]
    format: Option<TileFormat>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a floor's pyramid unless a matching one already exists
    Generate {
        floor_id: u32,
        source: PathBuf,
        /// Rebuild even if tiles exist
        #[arg(long)]
        force: bool,
        /// Give up waiting after this long: 30s, 5m, 1h
        #[arg(long, default_value = "1h")]
        timeout: String,
    },
    /// Rebuild a floor's pyramid, replacing the old one only once complete
    Regenerate {
        floor_id: u32,
        source: PathBuf,
        /// Give up waiting after this long: 30s, 5m, 1h
        #[arg(long, default_value = "1h")]
        timeout: String,
    },
    /// Delete tile trees
    Clear {
        /// Floor to clear
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        floor_id: Option<u32>,
        /// Clear every floor
        #[arg(long)]
        all: bool,
    },
    /// Show the health of one floor's pyramid
    Status { floor_id: u32 },
    /// Show every floor under the tiles directory
    List,
    /// Aggregate figures for the tiles directory
    Stats,
    /// Process every floor in a manifest, one at a time
    Batch {
        manifest: PathBuf,
        /// Rebuild floors that already have tiles (generate mode)
        #[arg(long, conflicts_with = "reuse")]
        force: bool,
        /// Keep healthy pyramids instead of rebuilding every floor
        #[arg(long)]
        reuse: bool,
    },
    /// Map a viewer request path to a file on disk
    Resolve { floor_id: u32, path: String },
    /// Remove every empty directory under the tiles directory
    Prune,
    /// Copy a floor's tile tree to a timestamped backup directory
    Backup {
        floor_id: u32,
        #[arg(long, default_value = "tiles_backup")]
        dest: PathBuf,
    },
    /// Check a source file without generating anything
    Validate { source: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    run_detached(run(args))?
}

/// Drive `future` on a fresh multi-threaded runtime and shut the runtime down
/// without waiting for blocking jobs that are still running, such as a
/// generation abandoned after `--timeout`. Its staging directory is left in
/// the tiles root until the next `clear`.
fn run_detached<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

async fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    let json = args.json;
    let pipeline = TilePipeline::new(config).context("invalid tiling configuration")?;

    match args.command {
        Command::Generate {
            floor_id,
            source,
            force,
            timeout,
        } => {
            let source = floor_source(floor_id, source, pipeline.config())?;
            let report =
                run_queued(&pipeline, source, JobKind::Generate { force }, &timeout).await?;
            finish_report(&report, json)
        }
        Command::Regenerate {
            floor_id,
            source,
            timeout,
        } => {
            let source = floor_source(floor_id, source, pipeline.config())?;
            let report = run_queued(&pipeline, source, JobKind::Regenerate, &timeout).await?;
            finish_report(&report, json)
        }
        Command::Clear { floor_id, all } => {
            if all {
                let removed = pipeline.clear_all()?;
                print(json, &removed, || format!("Cleared {} floor(s)", removed))
            } else if let Some(floor_id) = floor_id {
                let existed = pipeline.clear_cache(floor_id)?;
                print(json, &existed, || {
                    if existed {
                        format!("Cleared tiles for floor {}", floor_id)
                    } else {
                        format!("No tiles for floor {}", floor_id)
                    }
                })
            } else {
                bail!("either a floor id or --all is required")
            }
        }
        Command::Status { floor_id } => {
            let status = pipeline.status(floor_id);
            print(json, &status, || {
                if !status.exists {
                    return format!("floor {}: no tiles", floor_id);
                }
                format!(
                    "floor {}: {} ({} levels, {}/{} tiles, {:.1} MiB)",
                    floor_id,
                    if status.healthy { "healthy" } else { "incomplete" },
                    status.levels,
                    status.tile_count,
                    status.expected_tiles,
                    status.disk_bytes as f64 / (1024.0 * 1024.0)
                )
            })
        }
        Command::List => {
            let floors = pipeline.store().list()?;
            print(json, &floors, || {
                if floors.is_empty() {
                    return "No floors".to_string();
                }
                floors
                    .iter()
                    .map(|s| {
                        format!(
                            "floor-{:<6} {:>9} tiles  {}",
                            s.floor_id,
                            s.tile_count,
                            if s.healthy { "ok" } else { "INCOMPLETE" }
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Stats => {
            let stats = pipeline.store().statistics()?;
            print(json, &stats, || {
                format!(
                    "{} floor(s), {} healthy, {} tiles, {:.1} MiB",
                    stats.total_floors,
                    stats.healthy_floors,
                    stats.total_tiles,
                    stats.disk_bytes as f64 / (1024.0 * 1024.0)
                )
            })
        }
        Command::Batch {
            manifest,
            force,
            reuse,
        } => {
            let manifest = FloorManifest::load(&manifest)
                .with_context(|| format!("loading manifest {}", manifest.display()))?;
            let sources = manifest.sources(pipeline.config());
            let mode = if force || reuse {
                BatchMode::Generate { force }
            } else {
                BatchMode::Regenerate
            };
            let batch = BatchOrchestrator::new(pipeline, mode);
            let report = tokio::task::spawn_blocking(move || batch.run(&sources))
                .await
                .context("batch task panicked")?;
            print(json, &report, || report.summary.describe())?;
            report.ensure_clean()?;
            Ok(())
        }
        Command::Resolve { floor_id, path } => {
            let resolved = pipeline.store().resolve(floor_id, &path)?;
            let kind = content_type(&resolved);
            #[derive(Serialize)]
            struct Resolved<'a> {
                path: &'a std::path::Path,
                content_type: &'a str,
            }
            let out = Resolved {
                path: &resolved,
                content_type: kind,
            };
            print(json, &out, || format!("{}\t{}", resolved.display(), kind))
        }
        Command::Prune => {
            let removed = pipeline.store().prune_empty_dirs()?;
            let root = pipeline.store().root().display().to_string();
            print(json, &removed, || {
                format!("Removed {} empty director(ies) under {}", removed, root)
            })
        }
        Command::Backup { floor_id, dest } => {
            let target = pipeline.store().backup(floor_id, &dest)?;
            print(json, &target, || match &target {
                Some(p) => format!("Backed up floor {} to {}", floor_id, p.display()),
                None => format!("No tiles for floor {}", floor_id),
            })
        }
        Command::Validate { source } => {
            let issues = validate_source(&source, pipeline.loader());
            print(json, &issues, || {
                if issues.is_empty() {
                    format!("{}: ok", source.display())
                } else {
                    issues.join("\n")
                }
            })?;
            if !issues.is_empty() {
                bail!("{} problem(s) with {}", issues.len(), source.display());
            }
            Ok(())
        }
    }
}

/// Config file (or defaults), then environment, then flags.
fn resolve_config(args: &Args) -> Result<TilingConfig> {
    let mut config = match &args.config {
        Some(path) => TilingConfig::load(path)?,
        None => TilingConfig::default(),
    }
    .apply_env()?;

    if let Some(dir) = &args.tiles_dir {
        config.tiles_root = dir.clone();
    }
    if let Some(tile_size) = args.tile_size {
        config.tile_size = tile_size;
    }
    if let Some(overlap) = args.overlap {
        config.overlap = overlap;
    }
    if let Some(dpi) = args.dpi {
        config.dpi = dpi;
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    Ok(config)
}

fn floor_source(floor_id: u32, path: PathBuf, config: &TilingConfig) -> Result<FloorPlanSource> {
    if !path.is_file() {
        bail!("source file not found: {}", path.display());
    }
    Ok(FloorPlanSource::new(floor_id, path, config.dpi)?)
}

async fn run_queued(
    pipeline: &TilePipeline,
    source: FloorPlanSource,
    job: JobKind,
    timeout: &str,
) -> Result<GenerationReport> {
    let timeout = parse_duration(timeout)?;
    let queue = GenerationQueue::new(pipeline.clone(), ConflictPolicy::Reject);
    let mut handle = match queue.submit(source, job) {
        Ok(handle) => handle,
        Err(e) if e.is_retryable() => {
            let wait = Duration::from_millis(e.retry_delay_ms().unwrap_or_default());
            bail!("{}; retry in {:?}", e, wait)
        }
        Err(e) => return Err(e.into()),
    };
    info!(floor_id = handle.floor_id(), ?job, "queued");

    match handle.wait_timeout(timeout).await {
        Some(report) => Ok(report),
        None => bail!(
            "floor {} did not finish within {:?}",
            handle.floor_id(),
            timeout
        ),
    }
}

fn finish_report(report: &GenerationReport, json: bool) -> Result<()> {
    print(json, report, || match &report.stats {
        Some(stats) => format!(
            "floor {}: {} ({}x{}, {:.1} MP, {:.2}s, {:.0} tiles/s)",
            report.floor_id,
            report.message,
            stats.width,
            stats.height,
            stats.megapixels(),
            stats.elapsed.as_secs_f64(),
            stats.tiles_per_second()
        ),
        None => format!("floor {}: {}", report.floor_id, report.message),
    })?;
    if !report.success {
        let category = report.error_category.as_deref().unwrap_or("unknown");
        match report.retry_after_ms {
            Some(ms) if report.retryable => bail!(
                "floor {} failed ({}); retry in {:?}",
                report.floor_id,
                category,
                Duration::from_millis(ms)
            ),
            _ => bail!("floor {} failed ({})", report.floor_id, category),
        }
    }
    Ok(())
}

fn print<T: Serialize>(json: bool, value: &T, human: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human());
    }
    Ok(())
}

/// Parse duration string like "30s", "2m", "1h"; a bare number is seconds.
fn parse_duration(duration: &str) -> Result<Duration> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let Some((split, unit)) = duration.char_indices().next_back() else {
        return Err(anyhow::anyhow!("Invalid duration format: {}", duration));
    };
    let num_str = &duration[..split];
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number in duration: {}", num_str))?;

    let seconds = match unit {
        's' => Some(num),
        'm' => num.checked_mul(60),
        'h' => num.checked_mul(3600),
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid duration unit: {}. Use 's' for seconds, 'm' for minutes, 'h' for hours",
                unit
            ));
        }
    };
    seconds
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("Duration too large: {}", duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use floorplan_tiles::store::TileStore;

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn durations_reject_multibyte_units_and_overflow() {
        assert!(parse_duration("5µ").is_err());
        assert!(parse_duration("µ").is_err());
        assert!(parse_duration("10秒").is_err());
        assert!(parse_duration(&format!("{}h", u64::MAX / 60)).is_err());
    }

    /// Blocks every load until released.
    #[derive(Default)]
    struct HeldLoader {
        released: std::sync::Mutex<bool>,
        cv: std::sync::Condvar,
    }

    impl HeldLoader {
        fn release(&self) {
            *self.released.lock().unwrap() = true;
            self.cv.notify_all();
        }
    }

    impl floorplan_tiles::SourceLoader for HeldLoader {
        fn load(
            &self,
            _source: &FloorPlanSource,
        ) -> floorplan_tiles::TileResult<floorplan_tiles::BaseRaster> {
            let mut released = self.released.lock().unwrap();
            while !*released {
                released = self.cv.wait(released).unwrap();
            }
            floorplan_tiles::BaseRaster::new(32, 32, vec![255; 32 * 32 * 4])
        }

        fn supports(&self, _kind: floorplan_tiles::SourceKind) -> bool {
            true
        }
    }

    #[test]
    fn timed_out_generation_does_not_hold_the_process() {
        let root = tempfile::tempdir().unwrap();
        let loader = std::sync::Arc::new(HeldLoader::default());
        let config = TilingConfig::new(root.path(), 16, 0, 300, TileFormat::Png);
        let pipeline = TilePipeline::with_loader(config, loader.clone()).unwrap();
        let source = FloorPlanSource::new(1, "held.png", 300).unwrap();

        let started = std::time::Instant::now();
        let result = run_detached(async move {
            run_queued(&pipeline, source, JobKind::Regenerate, "1").await
        })
        .unwrap();
        let elapsed = started.elapsed();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("did not finish"), "{}", err);
        assert!(elapsed < Duration::from_secs(10), "{:?}", elapsed);
        // The abandoned job never committed a pyramid.
        assert!(!TileStore::new(root.path()).status(1).exists);
        loader.release();
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "tilegen",
            "--tile-size",
            "256",
            "--format",
            "jpeg",
            "status",
            "4",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.format, TileFormat::Jpeg);
        assert!(matches!(args.command, Command::Status { floor_id: 4 }));
    }
}
