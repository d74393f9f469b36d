//! # Tiling Configuration
//!
//! This module provides the configuration value passed explicitly into every
//! generation run. There is no process-wide configuration state: the CLI, the
//! batch orchestrator and the generation queue all hand a [`TilingConfig`] to
//! the pipeline they drive.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `tiles_root` | `PathBuf` | Any writable dir | Root of every floor's tile tree |
//! | `tile_size` | `u32` | 16-4096 | Nominal tile edge `T` in pixels |
//! | `overlap` | `u32` | `< tile_size / 2` | Border shared between neighbouring tiles |
//! | `dpi` | `u32` | 36-1200 | Rasterization density for document sources |
//! | `format` | `TileFormat` | png / jpeg | Tile encoding |
//! | `jpeg_quality` | `u8` | 1-100 | JPEG quality when `format = jpeg` |
//! | `progress_interval` | `u64` | >= 1 | Tiles between progress log lines |
//! | `max_decode_bytes` | `u64` | >= 1 MiB | Upper bound for decoding one raster source |
//!
//! ## Sources
//!
//! Values are layered, later sources winning:
//! 1. [`TilingConfig::default`]
//! 2. a JSON file ([`TilingConfig::load`])
//! 3. environment variables `TILES_DIR`, `TILE_SIZE`, `TILE_OVERLAP`, `TILE_DPI`
//!    ([`TilingConfig::apply_env`])
//! 4. command-line flags (applied by the binary)
//!
//! ## Examples
//!
//! ```rust
//! use floorplan_tiles::config::{TileFormat, TilingConfig};
//!
//! let config = TilingConfig::new("tiles", 256, 1, 150, TileFormat::Png);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.format.extension(), "png");
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::{TileError, TileResult};

/// Environment variable naming the tiles root.
pub const ENV_TILES_DIR: &str = "TILES_DIR";
/// Environment variable for the tile edge length.
pub const ENV_TILE_SIZE: &str = "TILE_SIZE";
/// Environment variable for the tile overlap.
pub const ENV_TILE_OVERLAP: &str = "TILE_OVERLAP";
/// Environment variable for the document rasterization DPI.
pub const ENV_TILE_DPI: &str = "TILE_DPI";

/// Encoding used for tile files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    /// Lossless PNG, RGBA8
    #[default]
    Png,
    /// Lossy JPEG, RGB8 (alpha is dropped)
    #[serde(alias = "jpg")]
    Jpeg,
}

impl TileFormat {
    /// File extension without the leading dot; also the descriptor's `Format` value.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TileFormat {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(TileFormat::Png),
            "jpg" | "jpeg" => Ok(TileFormat::Jpeg),
            other => Err(TileError::config("format", other, "expected png or jpeg")),
        }
    }
}

/// Configuration for one or more tile generation runs.
///
/// # Examples
///
/// ```rust
/// use floorplan_tiles::config::TilingConfig;
///
/// let config = TilingConfig::default();
/// assert_eq!(config.tile_size, 512);
/// assert_eq!(config.overlap, 1);
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Directory holding every `floor-{id}` tile tree.
    pub tiles_root: PathBuf,

    /// Nominal tile edge `T` in pixels.
    pub tile_size: u32,

    /// Pixels each tile shares with every neighbour that exists.
    pub overlap: u32,

    /// Rasterization density for document sources. Raster sources are used at
    /// their native resolution.
    pub dpi: u32,

    /// Tile encoding.
    pub format: TileFormat,

    /// JPEG quality, ignored for PNG.
    pub jpeg_quality: u8,

    /// Emit a progress line every this many tiles.
    pub progress_interval: u64,

    /// Memory limit handed to the raster decoder.
    pub max_decode_bytes: u64,
}

impl Default for TilingConfig {
    /// Defaults match the deployed viewer: 512 px tiles, 1 px overlap,
    /// 300 DPI, PNG.
    fn default() -> Self {
        Self {
            tiles_root: PathBuf::from("tiles"),
            tile_size: 512,
            overlap: 1,
            dpi: 300,
            format: TileFormat::Png,
            jpeg_quality: 90,
            progress_interval: 50,
            max_decode_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

impl TilingConfig {
    /// Creates a configuration with the main knobs set and everything else defaulted.
    pub fn new(
        tiles_root: impl Into<PathBuf>,
        tile_size: u32,
        overlap: u32,
        dpi: u32,
        format: TileFormat,
    ) -> Self {
        Self {
            tiles_root: tiles_root.into(),
            tile_size,
            overlap,
            dpi,
            format,
            ..Self::default()
        }
    }

    /// Replace the tiles root.
    pub fn with_tiles_root(mut self, tiles_root: impl Into<PathBuf>) -> Self {
        self.tiles_root = tiles_root.into();
        self
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> TileResult<()> {
        if !(16..=4096).contains(&self.tile_size) {
            return Err(TileError::config(
                "tile_size",
                self.tile_size.to_string(),
                "must be between 16 and 4096",
            ));
        }
        if self.overlap.saturating_mul(2) >= self.tile_size {
            return Err(TileError::config(
                "overlap",
                self.overlap.to_string(),
                "must be less than half the tile size",
            ));
        }
        if !(36..=1200).contains(&self.dpi) {
            return Err(TileError::config(
                "dpi",
                self.dpi.to_string(),
                "must be between 36 and 1200",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(TileError::config(
                "jpeg_quality",
                self.jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }
        if self.progress_interval == 0 {
            return Err(TileError::config(
                "progress_interval",
                "0",
                "must be greater than 0",
            ));
        }
        if self.max_decode_bytes < 1024 * 1024 {
            return Err(TileError::config(
                "max_decode_bytes",
                self.max_decode_bytes.to_string(),
                "must be at least 1 MiB",
            ));
        }
        if self.tiles_root.as_os_str().is_empty() {
            return Err(TileError::config("tiles_root", "", "must not be empty"));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> TileResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TileError::io_at("read config", path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            TileError::config("config_file", path.display().to_string(), e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `TILES_DIR`, `TILE_SIZE`, `TILE_OVERLAP` and `TILE_DPI` from the
    /// process environment.
    pub fn apply_env(self) -> TileResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay environment-style values from `lookup`.
    pub fn apply_env_from<F>(mut self, lookup: F) -> TileResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_TILES_DIR).filter(|v| !v.trim().is_empty()) {
            self.tiles_root = PathBuf::from(dir.trim());
        }
        if let Some(v) = lookup(ENV_TILE_SIZE) {
            self.tile_size = parse_env(ENV_TILE_SIZE, &v)?;
        }
        if let Some(v) = lookup(ENV_TILE_OVERLAP) {
            self.overlap = parse_env(ENV_TILE_OVERLAP, &v)?;
        }
        if let Some(v) = lookup(ENV_TILE_DPI) {
            self.dpi = parse_env(ENV_TILE_DPI, &v)?;
        }
        Ok(self)
    }
}

fn parse_env(key: &str, value: &str) -> TileResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| TileError::config(key, value, e.to_string()))
}
