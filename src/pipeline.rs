//! # Tile Pipeline
//!
//! Runs one floor through load → pyramid → slice → descriptor, and implements
//! the cache lifecycle on top of the [`TileStore`].
//!
//! ## Architecture
//!
//! 1. **Source Loader**: decode or rasterize the source into a base raster
//! 2. **Pyramid Builder**: one level bitmap at a time, coarsest first
//! 3. **Tile Slicer**: tiles of each level into a staging directory
//! 4. **Descriptor Writer**: `floor-{id}.dzi` once every level is written
//! 5. **Commit**: validate the staged tree and swap it into place
//!
//! ## Modes
//!
//! - `generate`: a healthy pyramid that matches the configuration is reused
//!   without touching the disk, unless `force` is set.
//! - `regenerate`: always rebuilds; the previous tree stays live until the
//!   new one has been validated.
//! - `clear_cache` / `clear_all`: delete tile trees.
//!
//! Every run returns a [`GenerationReport`]; errors never escape a run.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, info_span, warn};

use crate::config::TilingConfig;
use crate::core::stats::GenerationStats;
use crate::core::working_set::WorkingSet;
use crate::error::{Retryable, TileError, TileResult, classify};
use crate::processing::{PyramidBuilder, PyramidDescriptor, TileSlicer};
use crate::source::{DefaultLoader, FloorPlanSource, SourceLoader};
use crate::store::{PyramidStatus, TileStore};

/// Outcome of one floor's run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub floor_id: u32,
    pub success: bool,
    /// An existing pyramid was reused.
    pub cached: bool,
    /// The floor was not attempted (missing source in a batch).
    pub skipped: bool,
    pub message: String,
    pub stats: Option<GenerationStats>,
    pub error: Option<String>,
    pub error_category: Option<String>,
    /// Running the same request again may succeed.
    pub retryable: bool,
    /// Suggested wait before retrying.
    pub retry_after_ms: Option<u64>,
}

impl GenerationReport {
    pub fn generated(floor_id: u32, stats: GenerationStats) -> Self {
        Self {
            floor_id,
            success: true,
            cached: false,
            skipped: false,
            message: format!(
                "Generated {} tiles across {} levels",
                stats.total_tiles, stats.levels
            ),
            stats: Some(stats),
            error: None,
            error_category: None,
            retryable: false,
            retry_after_ms: None,
        }
    }

    pub fn cached(floor_id: u32) -> Self {
        Self {
            floor_id,
            success: true,
            cached: true,
            skipped: false,
            message: "Tiles already exist".to_string(),
            stats: None,
            error: None,
            error_category: None,
            retryable: false,
            retry_after_ms: None,
        }
    }

    pub fn failed(floor_id: u32, error: &TileError) -> Self {
        Self {
            floor_id,
            success: false,
            cached: false,
            skipped: false,
            message: format!("Tile generation failed: {}", error),
            stats: None,
            error: Some(error.to_string()),
            error_category: Some(error.category().to_string()),
            retryable: error.is_retryable(),
            retry_after_ms: error.retry_delay_ms(),
        }
    }

    pub fn skipped(floor_id: u32, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            floor_id,
            success: false,
            cached: false,
            skipped: true,
            message: format!("Skipped: {}", reason),
            stats: None,
            error: Some(reason),
            error_category: Some("source_not_found".to_string()),
            retryable: false,
            retry_after_ms: None,
        }
    }

    /// Tiles written by this run (zero when cached, skipped or failed).
    pub fn tiles_written(&self) -> u64 {
        self.stats.as_ref().map_or(0, |s| s.total_tiles)
    }
}

/// Drives single-floor generation against one tiles root.
///
/// Cloning is cheap; clones share the loader.
#[derive(Clone)]
pub struct TilePipeline {
    config: TilingConfig,
    store: TileStore,
    loader: Arc<dyn SourceLoader>,
}

impl std::fmt::Debug for TilePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilePipeline")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl TilePipeline {
    /// Pipeline with the default raster/document loader.
    pub fn new(config: TilingConfig) -> TileResult<Self> {
        let loader = Arc::new(DefaultLoader::new(config.max_decode_bytes));
        Self::with_loader(config, loader)
    }

    /// Pipeline with a caller-supplied loader.
    pub fn with_loader(config: TilingConfig, loader: Arc<dyn SourceLoader>) -> TileResult<Self> {
        config.validate()?;
        Ok(Self {
            store: TileStore::new(&config.tiles_root),
            config,
            loader,
        })
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn loader(&self) -> &dyn SourceLoader {
        self.loader.as_ref()
    }

    /// Build the floor's pyramid unless a matching healthy one exists.
    pub fn generate(&self, source: &FloorPlanSource, force: bool) -> GenerationReport {
        if !force && self.is_cached(source.floor_id) {
            info!(floor_id = source.floor_id, "tiles already exist, skipping");
            return GenerationReport::cached(source.floor_id);
        }
        self.run(source)
    }

    /// Rebuild the floor's pyramid unconditionally.
    pub fn regenerate(&self, source: &FloorPlanSource) -> GenerationReport {
        self.run(source)
    }

    pub fn clear_cache(&self, floor_id: u32) -> TileResult<bool> {
        self.store.clear(floor_id)
    }

    pub fn clear_all(&self) -> TileResult<usize> {
        self.store.clear_all()
    }

    pub fn status(&self, floor_id: u32) -> PyramidStatus {
        self.store.status(floor_id)
    }

    /// A healthy pyramid exists and was cut with the current tile settings.
    pub fn is_cached(&self, floor_id: u32) -> bool {
        let status = self.store.status(floor_id);
        match status.descriptor {
            Some(d) if status.healthy => {
                d.tile_size == self.config.tile_size
                    && d.overlap == self.config.overlap
                    && d.format == self.config.format
            }
            _ => false,
        }
    }

    fn run(&self, source: &FloorPlanSource) -> GenerationReport {
        let span = info_span!("floor", floor_id = source.floor_id);
        let _entered = span.enter();

        match self.build(source) {
            Ok(stats) => {
                info!(
                    tiles = stats.total_tiles,
                    levels = stats.levels,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    tiles_per_sec = stats.tiles_per_second(),
                    "tile generation complete"
                );
                GenerationReport::generated(source.floor_id, stats)
            }
            Err(e) => {
                if classify::is_source_problem(&e) {
                    warn!(error = %e, category = e.category(), "source rejected");
                } else {
                    error!(error = %e, category = e.category(), "tile generation failed");
                }
                GenerationReport::failed(source.floor_id, &e)
            }
        }
    }

    fn build(&self, source: &FloorPlanSource) -> TileResult<GenerationStats> {
        let started = Instant::now();
        let config = &self.config;
        let working_set = WorkingSet::new();

        let base = self.loader.load(source)?;
        info!(
            width = base.width(),
            height = base.height(),
            kind = ?source.kind,
            "source loaded"
        );

        let staged = self.store.begin_staging(source.floor_id)?;
        let files_dir = staged.files_dir();

        let mut builder = PyramidBuilder::new(base, config.tile_size, &working_set);
        let geometry = *builder.geometry();
        let expected = geometry.total_tiles();
        info!(
            levels = geometry.level_count(),
            total_tiles = expected,
            tile_size = config.tile_size,
            overlap = config.overlap,
            "pyramid planned"
        );

        let mut slicer = TileSlicer::new(config, source.floor_id, expected, &working_set);
        let mut bytes_written = 0;
        for level in 0..=geometry.max_level() {
            let bitmap = builder.build_level(level)?;
            bytes_written += slicer.slice_level(&bitmap, &files_dir)?.bytes;
        }
        let tiles_written = slicer.tiles_written();
        drop(slicer);
        drop(builder);

        let descriptor = PyramidDescriptor::from_geometry(&geometry, config.overlap, config.format);
        descriptor.write(&staged.descriptor_path())?;
        self.store.commit(staged, expected)?;

        let native = geometry.native();
        Ok(GenerationStats {
            width: native.w,
            height: native.h,
            levels: geometry.level_count(),
            total_tiles: tiles_written,
            bytes_written,
            elapsed: started.elapsed(),
            peak_working_set_bytes: working_set.snapshot().peak_bytes,
        })
    }
}
