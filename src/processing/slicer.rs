//! # Tile Slicer
//!
//! Cuts a [`LevelBitmap`] into tiles and writes them as
//! `{files_dir}/{level}/{col}_{row}.{ext}`.
//!
//! Tiles are written column-major (`col` outer, `row` inner). Each tile is
//! copied into one reused [`Staging`] buffer, encoded, and written through a
//! buffered file writer; nothing else is held per tile.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use tile_scale::grid::{Rect, Staging, compact_crop_to_staging, tile_rects};
use tracing::{debug, info};

use crate::config::{TileFormat, TilingConfig};
use crate::core::working_set::{BufferKind, WorkingSet, WorkingSetGuard};
use crate::error::{TileError, TileResult};
use crate::processing::pyramid::LevelBitmap;

/// Relative path of a tile inside a floor's `_files` directory.
pub fn tile_relative_path(level: u32, col: u32, row: u32, format: TileFormat) -> PathBuf {
    PathBuf::from(level.to_string()).join(format!("{}_{}.{}", col, row, format.extension()))
}

/// Outcome of slicing one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelOutput {
    pub level: u32,
    pub tiles: u64,
    pub bytes: u64,
}

/// Writes the tiles of successive levels for one floor.
pub struct TileSlicer {
    tile_size: u32,
    overlap: u32,
    format: TileFormat,
    jpeg_quality: u8,
    progress_interval: u64,
    floor_id: u32,
    expected_total: u64,
    written_total: u64,
    staging: Staging,
    rgb: Vec<u8>,
    working_set: WorkingSet,
    staging_guard: WorkingSetGuard,
}

impl TileSlicer {
    /// `expected_total` is only used to report progress.
    pub fn new(
        config: &TilingConfig,
        floor_id: u32,
        expected_total: u64,
        working_set: &WorkingSet,
    ) -> Self {
        let tile_edge = (config.tile_size + 2 * config.overlap) as usize;
        let capacity = tile_edge * tile_edge * 4;
        Self {
            tile_size: config.tile_size,
            overlap: config.overlap,
            format: config.format,
            jpeg_quality: config.jpeg_quality,
            progress_interval: config.progress_interval.max(1),
            floor_id,
            expected_total,
            written_total: 0,
            staging: Staging::with_capacity(capacity),
            rgb: Vec::new(),
            working_set: working_set.clone(),
            staging_guard: working_set.acquire(BufferKind::TileStaging, capacity),
        }
    }

    /// Tiles written so far across all levels.
    pub fn tiles_written(&self) -> u64 {
        self.written_total
    }

    /// Write every tile of `bitmap` under `files_dir/{level}/`.
    ///
    /// # Errors
    /// `OutputWriteFailure` for any directory, encode or write failure. The
    /// caller owns cleanup of partially written output.
    pub fn slice_level(
        &mut self,
        bitmap: &LevelBitmap<'_>,
        files_dir: &Path,
    ) -> TileResult<LevelOutput> {
        let plan = *bitmap.plan();
        let level_dir = files_dir.join(plan.level.to_string());
        fs::create_dir_all(&level_dir)
            .map_err(|e| TileError::output_write(&level_dir, e.to_string()))?;

        let mut output = LevelOutput {
            level: plan.level,
            tiles: 0,
            bytes: 0,
        };

        for (col, row, rect) in tile_rects(plan.size, plan.grid, self.tile_size, self.overlap) {
            let path = level_dir.join(format!("{}_{}.{}", col, row, self.format.extension()));
            output.bytes += self.write_tile(bitmap, rect, &path)?;
            output.tiles += 1;
            self.written_total += 1;

            if self.written_total % self.progress_interval == 0 {
                info!(
                    floor_id = self.floor_id,
                    level = plan.level,
                    written = self.written_total,
                    total = self.expected_total,
                    "tile progress"
                );
            }
        }

        debug!(
            floor_id = self.floor_id,
            level = plan.level,
            width = plan.size.w,
            height = plan.size.h,
            cols = plan.grid.cols,
            rows = plan.grid.rows,
            tiles = output.tiles,
            "level complete"
        );
        Ok(output)
    }

    fn write_tile(&mut self, bitmap: &LevelBitmap<'_>, rect: Rect, path: &Path) -> TileResult<u64> {
        let pixels = compact_crop_to_staging(
            bitmap.pixels(),
            bitmap.pitch(),
            rect,
            4,
            &mut self.staging,
        );

        let file = File::create(path).map_err(|e| TileError::output_write(path, e.to_string()))?;
        let mut writer = BufWriter::new(file);

        let encoded = match self.format {
            TileFormat::Png => PngEncoder::new_with_quality(
                &mut writer,
                CompressionType::Default,
                FilterType::Adaptive,
            )
            .write_image(pixels, rect.w, rect.h, ExtendedColorType::Rgba8),
            TileFormat::Jpeg => {
                self.rgb.clear();
                self.rgb
                    .extend(pixels.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]));
                let _scratch = self.working_set.acquire(BufferKind::Scratch, self.rgb.capacity());
                JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality).write_image(
                    &self.rgb,
                    rect.w,
                    rect.h,
                    ExtendedColorType::Rgb8,
                )
            }
        };
        encoded.map_err(|e| TileError::output_write(path, e.to_string()))?;

        writer
            .flush()
            .map_err(|e| TileError::output_write(path, e.to_string()))?;
        let file = writer
            .into_inner()
            .map_err(|e| TileError::output_write(path, e.error().to_string()))?;
        let len = file
            .metadata()
            .map_err(|e| TileError::output_write(path, e.to_string()))?
            .len();
        self.staging_guard.resize(self.staging.capacity());
        Ok(len)
    }
}
