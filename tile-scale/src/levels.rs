// SPDX-License-Identifier: MIT
//! # Pyramid Level Geometry
//!
//! This module computes the level hierarchy of a deep-zoom pyramid from the
//! native raster size. It is the planning half of generation: nothing here
//! allocates pixel memory, so the whole layout of a pyramid (level sizes,
//! tile grids, tile totals) is known before a single level is resampled.
//!
//! ## Level Numbering
//!
//! Levels are numbered from the coarsest (`0`) to the native resolution
//! (`max_level`). Each step down halves both dimensions with floor division,
//! clamped to at least one pixel:
//!
//! ```text
//! level max_level : W × H                    (scale 1)
//! level max_level-1: max(1, W/2) × max(1, H/2) (scale 2)
//! ...
//! level 0         : max(1, W >> max_level) × max(1, H >> max_level)
//! ```
//!
//! ## Design Notes
//!
//! - Integer-only: `max_level` is derived from bit length rather than a
//!   floating-point `log2`, so exact powers of two never round up.
//! - Scale factors are `u64` to stay exact for `max_level` up to 32.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Number of pixels covered by this size.
    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }
}

/// Tile grid dimensions of one pyramid level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelGrid {
    pub cols: u32,
    pub rows: u32,
}

impl LevelGrid {
    /// Number of tiles in the grid.
    pub fn tile_count(&self) -> u64 {
        u64::from(self.cols) * u64::from(self.rows)
    }
}

/// Fully computed description of a single level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelPlan {
    /// Level index, `0` is the coarsest.
    pub level: u32,
    /// Downscale factor relative to the native raster (`1` for the top level).
    pub scale: u64,
    /// Pixel dimensions of the level bitmap.
    pub size: Size,
    /// Tile grid covering the level.
    pub grid: LevelGrid,
}

impl LevelPlan {
    /// True when the level is the native raster and needs no resampling.
    pub fn is_native(&self) -> bool {
        self.scale == 1
    }

    /// True for resampled levels close enough to native resolution to be
    /// worth an edge-enhancement pass (scale 2).
    pub fn wants_sharpening(&self) -> bool {
        self.scale > 1 && self.scale <= 2
    }
}

/// Geometry of a complete pyramid for a native raster and tile size.
///
/// # Examples
///
/// ```rust
/// use tile_scale::levels::{PyramidGeometry, Size};
///
/// let g = PyramidGeometry::new(1024, 768, 512);
/// assert_eq!(g.level_size(10), Size::new(1024, 768));
/// assert_eq!(g.level_size(0), Size::new(1, 1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PyramidGeometry {
    native: Size,
    tile_size: u32,
    max_level: u32,
}

impl PyramidGeometry {
    /// Build the geometry for a `width × height` raster cut into `tile_size` tiles.
    ///
    /// Zero dimensions are treated as one pixel and a zero tile size as one,
    /// so the geometry is always well defined; callers validate their inputs
    /// before reaching this point.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let native = Size::new(width.max(1), height.max(1));
        Self {
            native,
            tile_size: tile_size.max(1),
            max_level: max_level_for(native.w.max(native.h)),
        }
    }

    pub fn native(&self) -> Size {
        self.native
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Index of the native-resolution level.
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Number of levels, `max_level + 1`.
    pub fn level_count(&self) -> u32 {
        self.max_level + 1
    }

    /// Downscale factor for `level`: `2^(max_level - level)`.
    ///
    /// # Panics
    /// Panics if `level > max_level`.
    pub fn scale_for(&self, level: u32) -> u64 {
        assert!(
            level <= self.max_level,
            "level {} out of range 0..={}",
            level,
            self.max_level
        );
        1u64 << (self.max_level - level)
    }

    /// Pixel dimensions of `level`.
    pub fn level_size(&self, level: u32) -> Size {
        let scale = self.scale_for(level);
        Size::new(
            scaled_dimension(self.native.w, scale),
            scaled_dimension(self.native.h, scale),
        )
    }

    /// Tile grid of `level`.
    pub fn grid_for(&self, level: u32) -> LevelGrid {
        let size = self.level_size(level);
        LevelGrid {
            cols: size.w.div_ceil(self.tile_size),
            rows: size.h.div_ceil(self.tile_size),
        }
    }

    /// Number of tiles in `level`.
    pub fn tile_count(&self, level: u32) -> u64 {
        self.grid_for(level).tile_count()
    }

    /// Sum of the tile counts of every level.
    pub fn total_tiles(&self) -> u64 {
        (0..=self.max_level).map(|l| self.tile_count(l)).sum()
    }

    /// Full plan for `level`.
    pub fn plan(&self, level: u32) -> LevelPlan {
        LevelPlan {
            level,
            scale: self.scale_for(level),
            size: self.level_size(level),
            grid: self.grid_for(level),
        }
    }

    /// Plans for every level, coarsest first.
    pub fn levels(&self) -> impl Iterator<Item = LevelPlan> + '_ {
        (0..=self.max_level).map(move |l| self.plan(l))
    }
}

/// `ceil(log2(n))` for `n >= 1`, computed from the bit length.
fn max_level_for(longest_side: u32) -> u32 {
    if longest_side <= 1 {
        0
    } else {
        u32::BITS - (longest_side - 1).leading_zeros()
    }
}

#[inline]
fn scaled_dimension(native: u32, scale: u64) -> u32 {
    (u64::from(native) / scale).max(1) as u32
}
