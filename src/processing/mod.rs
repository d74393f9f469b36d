//! # Processing Module
//!
//! The per-floor pixel pipeline: level bitmaps from the base raster, tiles
//! from each level, and the descriptor written once slicing completes.

pub mod descriptor;
pub mod pyramid;
pub mod slicer;

pub use descriptor::PyramidDescriptor;
pub use pyramid::{LevelBitmap, PyramidBuilder};
pub use slicer::{LevelOutput, TileSlicer, tile_relative_path};
