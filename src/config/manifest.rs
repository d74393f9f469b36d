//! Floor manifest: the list of floors a batch run works through.
//!
//! ```json
//! {
//!   "floors": [
//!     { "floor_id": 1, "source": "plans/ground.pdf" },
//!     { "floor_id": 2, "source": "plans/level-2.png", "dpi": 200 }
//!   ]
//! }
//! ```
//!
//! Relative `source` paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::TilingConfig;
use crate::error::{TileError, TileResult};
use crate::source::{FloorPlanSource, SourceKind};

/// One floor entry in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub floor_id: u32,
    pub source: PathBuf,
    /// Overrides the configured DPI for this floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
    /// Overrides extension-based kind detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorManifest {
    pub floors: Vec<ManifestEntry>,
    /// Directory relative sources are resolved against. Not serialized.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl FloorManifest {
    /// Read a manifest from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> TileResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TileError::io_at("read manifest", path, e))?;
        let mut manifest: Self = serde_json::from_str(&text).map_err(|e| {
            TileError::config("manifest", path.display().to_string(), e.to_string())
        })?;
        manifest.base_dir = path.parent().map(Path::to_path_buf);
        Ok(manifest)
    }

    /// Resolve every entry into a [`FloorPlanSource`].
    ///
    /// Entries whose kind cannot be determined are still returned (as
    /// rasters) so the batch records them as failures instead of silently
    /// dropping the floor.
    pub fn sources(&self, config: &TilingConfig) -> Vec<FloorPlanSource> {
        self.floors
            .iter()
            .map(|entry| {
                let path = match &self.base_dir {
                    Some(base) if entry.source.is_relative() => base.join(&entry.source),
                    _ => entry.source.clone(),
                };
                let kind = entry
                    .kind
                    .or_else(|| SourceKind::from_path(&path))
                    .unwrap_or(SourceKind::Raster);
                FloorPlanSource {
                    floor_id: entry.floor_id,
                    path,
                    kind,
                    dpi: entry.dpi.unwrap_or(config.dpi),
                }
            })
            .collect()
    }
}
