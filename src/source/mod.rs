//! # Source Loading
//!
//! Turns a floor plan file into exactly one decoded RGBA8 bitmap, the
//! [`BaseRaster`]. Loaders hold no state between calls: every handle opened
//! to read a source is closed before `load` returns.
//!
//! ## Source Kinds
//!
//! - **Raster** (`png`, `jpg`, `tif`, `bmp`, `gif`, `webp`): decoded at native
//!   resolution by [`RasterLoader`].
//! - **Document** (`pdf`): the first page is rasterized at the requested DPI
//!   by `DocumentLoader`, available with the `pdf` feature.
//!
//! [`DefaultLoader`] dispatches on [`SourceKind`] and is what the pipeline
//! uses unless a caller injects its own [`SourceLoader`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tile_scale::levels::Size;

use crate::error::{TileError, TileResult};

#[cfg(feature = "pdf")]
pub mod document;
pub mod raster;

#[cfg(feature = "pdf")]
pub use document::DocumentLoader;
pub use raster::RasterLoader;

/// Extensions decoded as raster images.
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp"];

/// Extensions rasterized as documents.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

/// What a source file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A single-page vector/document file, rasterized at a DPI.
    Document,
    /// A bitmap image, used at native resolution.
    Raster,
}

impl SourceKind {
    /// Classify a path by extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceKind::Document)
        } else if RASTER_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceKind::Raster)
        } else {
            None
        }
    }
}

/// Immutable input to one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorPlanSource {
    pub floor_id: u32,
    pub path: PathBuf,
    pub kind: SourceKind,
    /// Rasterization density; ignored for raster sources.
    pub dpi: u32,
}

impl FloorPlanSource {
    /// Build a source, inferring its kind from the file extension.
    pub fn new(floor_id: u32, path: impl Into<PathBuf>, dpi: u32) -> TileResult<Self> {
        let path = path.into();
        let kind = SourceKind::from_path(&path).ok_or_else(|| {
            TileError::source_unreadable(&path, "unsupported file extension")
                .with_metadata("floor_id", floor_id.to_string())
        })?;
        Ok(Self {
            floor_id,
            path,
            kind,
            dpi,
        })
    }
}

/// Decoded RGBA8 bitmap of a whole source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRaster {
    size: Size,
    pixels: Vec<u8>,
    opaque: bool,
}

impl BaseRaster {
    /// Wrap tightly packed RGBA8 pixels. Opacity is detected with one scan of
    /// the alpha channel.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> TileResult<Self> {
        let mut raster = Self::new_opaque(width, height, pixels)?;
        raster.opaque = raster.pixels.chunks_exact(4).all(|px| px[3] == u8::MAX);
        Ok(raster)
    }

    /// Wrap pixels the caller knows to be fully opaque (decoded without an
    /// alpha channel, or rendered onto a solid background).
    pub fn new_opaque(width: u32, height: u32, pixels: Vec<u8>) -> TileResult<Self> {
        let needed = (width as usize) * (height as usize) * 4;
        if width == 0 || height == 0 || pixels.len() != needed {
            return Err(TileError::source_unreadable(
                "<memory>",
                format!(
                    "{}x{} raster needs {} bytes, got {}",
                    width,
                    height,
                    needed,
                    pixels.len()
                ),
            ));
        }
        Ok(Self {
            size: Size::new(width, height),
            pixels,
            opaque: true,
        })
    }

    /// Take ownership of a decoded image buffer.
    pub fn from_rgba_image(image: image::RgbaImage) -> TileResult<Self> {
        let (w, h) = image.dimensions();
        Self::new(w, h, image.into_raw())
    }

    /// Every pixel has alpha 255, so resampling can skip premultiplication.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.w
    }

    pub fn height(&self) -> u32 {
        self.size.h
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes held by the pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Produces a [`BaseRaster`] from a [`FloorPlanSource`].
///
/// Implementations must not keep file handles or decoded data after `load`
/// returns.
pub trait SourceLoader: Send + Sync {
    /// Decode or rasterize `source`.
    ///
    /// # Errors
    /// `SourceNotFound` if the file is missing, `SourceUnreadable` if it
    /// cannot be decoded, `RenderFailure` if rasterization fails.
    fn load(&self, source: &FloorPlanSource) -> TileResult<BaseRaster>;

    /// Whether this loader handles `kind`.
    fn supports(&self, kind: SourceKind) -> bool;
}

/// Dispatches to the raster or document loader by source kind.
#[derive(Debug, Clone)]
pub struct DefaultLoader {
    raster: RasterLoader,
    #[cfg(feature = "pdf")]
    document: DocumentLoader,
}

impl DefaultLoader {
    pub fn new(max_decode_bytes: u64) -> Self {
        Self {
            raster: RasterLoader::new(max_decode_bytes),
            #[cfg(feature = "pdf")]
            document: DocumentLoader::new(),
        }
    }
}

impl Default for DefaultLoader {
    fn default() -> Self {
        Self::new(crate::config::TilingConfig::default().max_decode_bytes)
    }
}

impl SourceLoader for DefaultLoader {
    fn load(&self, source: &FloorPlanSource) -> TileResult<BaseRaster> {
        match source.kind {
            SourceKind::Raster => self.raster.load(source),
            #[cfg(feature = "pdf")]
            SourceKind::Document => self.document.load(source),
            #[cfg(not(feature = "pdf"))]
            SourceKind::Document => {
                if !source.path.exists() {
                    return Err(TileError::source_not_found(&source.path));
                }
                Err(TileError::source_unreadable(
                    &source.path,
                    "document sources need the 'pdf' feature",
                ))
            }
        }
    }

    fn supports(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Raster => true,
            SourceKind::Document => cfg!(feature = "pdf"),
        }
    }
}

/// Check an upload before queueing it. Returns human-readable problems;
/// an empty list means the source is acceptable.
pub fn validate_source(path: impl AsRef<Path>, loader: &dyn SourceLoader) -> Vec<String> {
    let path = path.as_ref();
    let mut issues = Vec::new();

    if !path.exists() {
        issues.push(format!("source file not found: {}", path.display()));
    } else if !path.is_file() {
        issues.push(format!("source is not a regular file: {}", path.display()));
    }

    match SourceKind::from_path(path) {
        None => issues.push(format!(
            "unsupported file type '{}'",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
        )),
        Some(kind) if !loader.supports(kind) => {
            issues.push(format!("{:?} sources are not supported by this build", kind))
        }
        Some(_) => {}
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(SourceKind::from_path("a/b/plan.PDF"), Some(SourceKind::Document));
        assert_eq!(SourceKind::from_path("plan.jpeg"), Some(SourceKind::Raster));
        assert_eq!(SourceKind::from_path("plan.tif"), Some(SourceKind::Raster));
        assert_eq!(SourceKind::from_path("plan.dwg"), None);
        assert_eq!(SourceKind::from_path("noext"), None);
    }

    #[test]
    fn floor_source_rejects_unknown_extension() {
        let err = FloorPlanSource::new(3, "plan.dwg", 300).unwrap_err();
        assert_eq!(err.category(), "source_unreadable");
        let ok = FloorPlanSource::new(3, "plan.png", 300).unwrap();
        assert_eq!(ok.kind, SourceKind::Raster);
    }

    #[test]
    fn base_raster_checks_length() {
        assert!(BaseRaster::new(2, 2, vec![0; 16]).is_ok());
        assert!(BaseRaster::new(2, 2, vec![0; 15]).is_err());
        assert!(BaseRaster::new(0, 2, vec![]).is_err());
    }

    #[test]
    fn opacity_is_detected() {
        assert!(BaseRaster::new(1, 2, vec![9, 9, 9, 255, 1, 2, 3, 255]).unwrap().is_opaque());
        assert!(!BaseRaster::new(1, 2, vec![9, 9, 9, 255, 1, 2, 3, 254]).unwrap().is_opaque());
        assert!(BaseRaster::new_opaque(1, 1, vec![0; 4]).unwrap().is_opaque());
    }

    #[test]
    fn validate_reports_missing_and_unsupported() {
        let loader = DefaultLoader::default();
        let issues = validate_source("/definitely/not/here.dwg", &loader);
        assert_eq!(issues.len(), 2);

        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("ok.png");
        std::fs::write(&png, b"x").unwrap();
        assert!(validate_source(&png, &loader).is_empty());
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn documents_need_pdf_feature() {
        let loader = DefaultLoader::default();
        assert!(!loader.supports(SourceKind::Document));

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("plan.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        let source = FloorPlanSource::new(1, &pdf, 300).unwrap();
        let err = loader.load(&source).unwrap_err();
        assert_eq!(err.category(), "source_unreadable");
    }
}
