// SPDX-License-Identifier: MIT
//! # tile-scale: Pyramid Geometry and Level Resampling
//!
//! This crate holds the pure, I/O-free half of deep-zoom tile generation:
//! the level math that decides how many levels a pyramid has and how big
//! each one is, the Lanczos resampler that produces a level from the base
//! raster, and the rectangle math that cuts a level into tiles.
//!
//! ## Key Components
//!
//! - [`levels`]: Pyramid geometry (`maxLevel`, per-level size, tile grids, tile totals)
//! - [`cpu`]: CPU resampling of RGBA8 buffers using fast_image_resize (SIMD)
//! - [`grid`]: Tile rectangles with overlap, plus crop-into-staging helpers
//!
//! ## Geometry
//!
//! For a native raster of `W × H` and tile size `T`:
//! - `maxLevel = ceil(log2(max(W, H)))`
//! - level `L` is downscaled by `2^(maxLevel - L)`, never below 1×1
//! - level `L` is cut into `ceil(w/T) × ceil(h/T)` tiles
//!
//! Everything in [`levels`] is a pure function of `(W, H, T)`, so tile counts
//! can be asserted without touching the filesystem.
//!
//! ## Usage Example
//!
//! ```rust
//! use tile_scale::levels::PyramidGeometry;
//!
//! let geometry = PyramidGeometry::new(1024, 768, 512);
//! assert_eq!(geometry.max_level(), 10);
//! assert_eq!(geometry.tile_count(10), 4);
//! assert_eq!(geometry.tile_count(0), 1);
//! ```

pub mod cpu;
pub mod grid;
pub mod levels;
