//! Raster image sources decoded with the `image` crate.

use image::{ImageReader, Limits};
use tracing::debug;

use crate::error::{TileError, TileResult};
use crate::source::{BaseRaster, FloorPlanSource, SourceKind, SourceLoader};

/// Decodes PNG/JPEG/TIFF/... files to RGBA8 at native resolution.
#[derive(Debug, Clone)]
pub struct RasterLoader {
    max_decode_bytes: u64,
}

impl RasterLoader {
    /// `max_decode_bytes` bounds the decoder's allocations; larger images
    /// fail with `SourceUnreadable` instead of exhausting memory.
    pub fn new(max_decode_bytes: u64) -> Self {
        Self { max_decode_bytes }
    }
}

impl SourceLoader for RasterLoader {
    fn load(&self, source: &FloorPlanSource) -> TileResult<BaseRaster> {
        let path = &source.path;
        if !path.is_file() {
            return Err(TileError::source_not_found(path)
                .with_metadata("floor_id", source.floor_id.to_string()));
        }

        let mut reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| TileError::source_unreadable(path, e.to_string()))?;

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_decode_bytes);
        reader.limits(limits);

        let decoded = reader
            .decode()
            .map_err(|e| {
                TileError::source_unreadable(path, e.to_string())
                    .with_operation("decode raster")
                    .with_metadata("floor_id", source.floor_id.to_string())
            })?;

        debug!(
            floor_id = source.floor_id,
            width = decoded.width(),
            height = decoded.height(),
            color = ?decoded.color(),
            "decoded raster source"
        );

        if decoded.color().has_alpha() {
            BaseRaster::from_rgba_image(decoded.into_rgba8())
        } else {
            let rgba = decoded.into_rgba8();
            let (w, h) = rgba.dimensions();
            BaseRaster::new_opaque(w, h, rgba.into_raw())
        }
    }

    fn supports(&self, kind: SourceKind) -> bool {
        kind == SourceKind::Raster
    }
}
