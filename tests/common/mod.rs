//! Common test utilities and helpers for the floorplan_tiles tests
//!
//! Synthetic floor plan images and throwaway tile roots.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use floorplan_tiles::config::{TileFormat, TilingConfig};
use floorplan_tiles::pipeline::TilePipeline;
use floorplan_tiles::source::FloorPlanSource;
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Synthetic source images written to disk
pub mod plans {
    use super::*;

    /// Horizontal/vertical gradient, so every tile has distinct content.
    pub fn gradient_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        });
        let path = dir.join(name);
        img.save(&path).expect("write gradient png");
        path
    }

    /// Black lines on white every `cell` pixels, like a drawn plan.
    pub fn grid_png(dir: &Path, name: &str, width: u32, height: u32, cell: u32) -> PathBuf {
        let img = RgbImage::from_fn(width, height, |x, y| {
            if x % cell == 0 || y % cell == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let path = dir.join(name);
        img.save(&path).expect("write grid png");
        path
    }

    /// A file with an image extension and garbage contents.
    pub fn corrupt_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"this is not a png").expect("write corrupt file");
        path
    }
}

/// A tiles root that lives as long as the returned `TempDir`.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn tiles_root(&self) -> PathBuf {
        self.dir.path().join("tiles")
    }

    pub fn sources_dir(&self) -> PathBuf {
        let dir = self.dir.path().join("plans");
        std::fs::create_dir_all(&dir).expect("create plans dir");
        dir
    }

    pub fn config(&self, tile_size: u32, overlap: u32) -> TilingConfig {
        TilingConfig::new(self.tiles_root(), tile_size, overlap, 300, TileFormat::Png)
    }

    pub fn pipeline(&self, tile_size: u32, overlap: u32) -> TilePipeline {
        TilePipeline::new(self.config(tile_size, overlap)).expect("valid config")
    }
}

pub fn source(floor_id: u32, path: impl Into<PathBuf>) -> FloorPlanSource {
    FloorPlanSource::new(floor_id, path, 300).expect("supported extension")
}
