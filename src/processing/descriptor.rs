//! Deep Zoom (`.dzi`) descriptor writing and parsing.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
//!        TileSize="512" Overlap="1" Format="png">
//!   <Size Width="1024" Height="768"/>
//! </Image>
//! ```
//!
//! Width and height are always the native raster dimensions.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tile_scale::levels::PyramidGeometry;

use crate::config::TileFormat;
use crate::error::{TileError, TileResult};

/// XML namespace of Deep Zoom descriptors.
pub const DEEPZOOM_NAMESPACE: &str = "http://schemas.microsoft.com/deepzoom/2008";

/// Metadata that makes a tile tree consumable by a Deep Zoom viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PyramidDescriptor {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub overlap: u32,
    pub format: TileFormat,
}

impl PyramidDescriptor {
    pub fn from_geometry(geometry: &PyramidGeometry, overlap: u32, format: TileFormat) -> Self {
        let native = geometry.native();
        Self {
            width: native.w,
            height: native.h,
            tile_size: geometry.tile_size(),
            overlap,
            format,
        }
    }

    /// Geometry implied by this descriptor.
    pub fn geometry(&self) -> PyramidGeometry {
        PyramidGeometry::new(self.width, self.height, self.tile_size)
    }

    pub fn to_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <Image xmlns=\"{}\" TileSize=\"{}\" Overlap=\"{}\" Format=\"{}\">\n  \
             <Size Width=\"{}\" Height=\"{}\"/>\n\
             </Image>\n",
            DEEPZOOM_NAMESPACE,
            self.tile_size,
            self.overlap,
            self.format.extension(),
            self.width,
            self.height
        )
    }

    /// Parse descriptor XML. Attribute order and whitespace are not significant.
    pub fn parse(xml: &str) -> Result<Self, String> {
        let image = element(xml, "Image").ok_or("missing <Image> element")?;
        if !image.contains(DEEPZOOM_NAMESPACE) {
            return Err("not a Deep Zoom descriptor".to_string());
        }
        let size = element(xml, "Size").ok_or("missing <Size> element")?;

        let format = attr(image, "Format")
            .ok_or("missing Format")?
            .parse::<TileFormat>()
            .map_err(|e| e.to_string())?;

        let descriptor = Self {
            width: numeric(size, "Width")?,
            height: numeric(size, "Height")?,
            tile_size: numeric(image, "TileSize")?,
            overlap: numeric(image, "Overlap")?,
            format,
        };
        if descriptor.width == 0 || descriptor.height == 0 || descriptor.tile_size == 0 {
            return Err("zero dimension".to_string());
        }
        Ok(descriptor)
    }

    /// Write the descriptor to `path`, flushing it to disk before returning.
    pub fn write(&self, path: &Path) -> TileResult<()> {
        let mut file =
            fs::File::create(path).map_err(|e| TileError::output_write(path, e.to_string()))?;
        file.write_all(self.to_xml().as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| TileError::output_write(path, e.to_string()))
    }

    /// Read and parse the descriptor at `path`.
    pub fn read(path: &Path) -> TileResult<Self> {
        let xml = fs::read_to_string(path).map_err(|e| TileError::io_at("read descriptor", path, e))?;
        Self::parse(&xml).map_err(|reason| TileError::invalid_descriptor(path, reason))
    }
}

/// Text of the opening tag `<name ...>` (attributes included).
fn element<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{}", name);
    let mut search = 0;
    while let Some(pos) = xml[search..].find(&open) {
        let start = search + pos;
        let after = xml[start + open.len()..].chars().next()?;
        if after.is_whitespace() || after == '>' || after == '/' {
            let end = xml[start..].find('>')?;
            return Some(&xml[start..start + end]);
        }
        search = start + open.len();
    }
    None
}

fn attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = tag;
    loop {
        let pos = rest.find(name)?;
        let preceded_ok = rest[..pos]
            .chars()
            .last()
            .is_some_and(|c| c.is_whitespace());
        let tail = rest[pos + name.len()..].trim_start();
        if preceded_ok {
            if let Some(tail) = tail.strip_prefix('=') {
                let tail = tail.trim_start();
                let quote = tail.chars().next()?;
                if quote == '"' || quote == '\'' {
                    let value = &tail[1..];
                    let end = value.find(quote)?;
                    return Some(&value[..end]);
                }
            }
        }
        rest = &rest[pos + name.len()..];
    }
}

fn numeric(tag: &str, name: &str) -> Result<u32, String> {
    attr(tag, name)
        .ok_or_else(|| format!("missing {}", name))?
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad {}: {}", name, e))
}
