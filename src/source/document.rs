//! Document (PDF) sources rasterized through PDFium.
//!
//! Only the first page is rendered. The page is scaled by `dpi / 72`
//! (PDF user space is 72 units per inch), annotations and form fields are
//! drawn, and the page is composited onto white so the result has no
//! transparency.
//!
//! PDFium is bound per call and dropped before `load` returns.

use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::{TileError, TileResult};
use crate::source::{BaseRaster, FloorPlanSource, SourceKind, SourceLoader};

/// Environment variable naming a directory that contains the PDFium library.
pub const ENV_PDFIUM_DIR: &str = "PDFIUM_DYNAMIC_LIB_PATH";

#[derive(Debug, Clone, Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    fn bind(path: &std::path::Path) -> TileResult<Pdfium> {
        let bindings = match std::env::var(ENV_PDFIUM_DIR) {
            Ok(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            Err(_) => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| TileError::render_failure(path, format!("PDFium unavailable: {}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl SourceLoader for DocumentLoader {
    fn load(&self, source: &FloorPlanSource) -> TileResult<BaseRaster> {
        let path = &source.path;
        if !path.is_file() {
            return Err(TileError::source_not_found(path)
                .with_metadata("floor_id", source.floor_id.to_string()));
        }

        let pdfium = Self::bind(path)?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| TileError::source_unreadable(path, e.to_string()))?;

        let pages = document.pages();
        if pages.len() == 0 {
            return Err(TileError::source_unreadable(path, "document has no pages"));
        }
        let page = pages
            .get(0)
            .map_err(|e| TileError::source_unreadable(path, e.to_string()))?;

        let zoom = source.dpi as f32 / 72.0;
        let render = PdfRenderConfig::new()
            .scale_page_by_factor(zoom)
            .render_annotations(true)
            .render_form_data(true)
            .set_clear_color(PdfColor::WHITE);

        let bitmap = page
            .render_with_config(&render)
            .map_err(|e| {
                TileError::render_failure(path, e.to_string())
                    .with_context(format!("page 0 at {} dpi", source.dpi))
                    .with_metadata("floor_id", source.floor_id.to_string())
            })?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let mut pixels = bitmap.as_rgba_bytes();
        // Opaque output regardless of what PDFium left in the alpha channel.
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }

        debug!(
            floor_id = source.floor_id,
            dpi = source.dpi,
            width,
            height,
            "rendered document page"
        );

        BaseRaster::new_opaque(width, height, pixels)
            .map_err(|e| TileError::render_failure(path, e.to_string()))
    }

    fn supports(&self, kind: SourceKind) -> bool {
        kind == SourceKind::Document
    }
}
