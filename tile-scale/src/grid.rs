// SPDX-License-Identifier: MIT
//! # Deep Zoom Tile Rectangles
//!
//! This module cuts one pyramid level into the rectangles that become tile
//! files. It follows the Deep Zoom tiling convention: every tile has a
//! nominal `T × T` cell, and is expanded by the overlap `O` toward each
//! neighbour that actually exists, clamped at the level boundary.
//!
//! ## Tile Rectangle
//!
//! For tile `(col, row)` on a `w × h` level:
//! - `x0 = col*T - (col > 0 ? O : 0)`
//! - `y0 = row*T - (row > 0 ? O : 0)`
//! - `x1 = min(col*T + T + O, w)`
//! - `y1 = min(row*T + T + O, h)`
//!
//! With `O = 0` this reduces to the plain, non-overlapping crop
//! `[col*T, row*T] .. [min(col*T+T, w), min(row*T+T, h)]`.
//!
//! ## Memory
//!
//! Crops are copied into a single caller-owned [`Staging`] buffer that is
//! reused for every tile of every level, so at most one tile's pixels are
//! in flight at any time.

use crate::levels::{LevelGrid, Size};

/// Rectangle definition in level pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
}

/// Compute the source rectangle of tile `(col, row)` on a level of `level` size.
///
/// # Arguments
/// * `level` - Level bitmap dimensions
/// * `tile_size` - Nominal tile edge `T`
/// * `overlap` - Extra border `O` shared with each existing neighbour
/// * `col`, `row` - Tile position in the level grid
///
/// # Returns
/// The clamped rectangle; always at least 1×1 for in-grid tiles.
pub fn tile_rect(level: Size, tile_size: u32, overlap: u32, col: u32, row: u32) -> Rect {
    let t = u64::from(tile_size.max(1));
    let o = u64::from(overlap);
    let (w, h) = (u64::from(level.w), u64::from(level.h));

    let base_x = u64::from(col) * t;
    let base_y = u64::from(row) * t;

    let x0 = if col > 0 { base_x.saturating_sub(o) } else { 0 }.min(w.saturating_sub(1));
    let y0 = if row > 0 { base_y.saturating_sub(o) } else { 0 }.min(h.saturating_sub(1));
    let x1 = (base_x + t + o).min(w).max(x0 + 1);
    let y1 = (base_y + t + o).min(h).max(y0 + 1);

    Rect {
        x: x0 as u32,
        y: y0 as u32,
        w: (x1 - x0) as u32,
        h: (y1 - y0) as u32,
    }
}

/// Enumerate every tile of a level in column-major order (`col` outer, `row` inner).
///
/// Yields `(col, row, rect)`; the order matches the order tiles are written.
pub fn tile_rects(
    level: Size,
    grid: LevelGrid,
    tile_size: u32,
    overlap: u32,
) -> impl Iterator<Item = (u32, u32, Rect)> {
    (0..grid.cols).flat_map(move |col| {
        (0..grid.rows).map(move |row| (col, row, tile_rect(level, tile_size, overlap, col, row)))
    })
}

/// Pre-allocated scratch buffer holding the pixels of the tile being written.
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}

impl Staging {
    pub fn with_capacity(cap: usize) -> Self { Self { buf: Vec::with_capacity(cap) } }
    pub fn ensure_len(&mut self, len: usize) { if self.buf.len() < len { self.buf.resize(len, 0); } }
    pub fn as_slice(&self) -> &[u8] { &self.buf }
    pub fn capacity(&self) -> usize { self.buf.capacity() }
}

/// Extract `roi` from a strided source buffer into tightly packed rows in `staging`.
///
/// `bytes_per_pixel` is the pixel width of both source and output (4 for
/// RGBA8). Returns the packed slice, exactly `roi.w * roi.h * bytes_per_pixel`
/// bytes long.
///
/// # Panics
/// Panics if `roi` lies outside the source buffer.
pub fn compact_crop_to_staging<'s>(
    src: &[u8],
    src_pitch: usize,
    roi: Rect,
    bytes_per_pixel: usize,
    staging: &'s mut Staging,
) -> &'s [u8] {
    let row_bytes = (roi.w as usize) * bytes_per_pixel;
    let total = row_bytes * (roi.h as usize);
    staging.ensure_len(total);
    let mut off = 0usize;
    for r in 0..roi.h as usize {
        let row_off = (roi.y as usize + r) * src_pitch + (roi.x as usize) * bytes_per_pixel;
        let s = &src[row_off..row_off + row_bytes];
        let d = &mut staging.buf[off..off + row_bytes];
        d.copy_from_slice(s);
        off += row_bytes;
    }
    &staging.buf[..total]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_overlap_matches_plain_crop() {
        let level = Size::new(1024, 768);
        assert_eq!(tile_rect(level, 512, 0, 0, 0), Rect { x: 0, y: 0, w: 512, h: 512 });
        assert_eq!(tile_rect(level, 512, 0, 1, 0), Rect { x: 512, y: 0, w: 512, h: 512 });
        assert_eq!(tile_rect(level, 512, 0, 0, 1), Rect { x: 0, y: 512, w: 512, h: 256 });
        assert_eq!(tile_rect(level, 512, 0, 1, 1), Rect { x: 512, y: 512, w: 512, h: 256 });
    }

    #[test]
    fn overlap_expands_toward_interior_neighbours_only() {
        let level = Size::new(600, 300);
        // First tile: no left/top neighbour, expands right and down.
        assert_eq!(tile_rect(level, 256, 1, 0, 0), Rect { x: 0, y: 0, w: 257, h: 257 });
        // Middle column: one pixel each side.
        assert_eq!(tile_rect(level, 256, 1, 1, 0), Rect { x: 255, y: 0, w: 258, h: 257 });
        // Last column / row: clamped to the level edge.
        assert_eq!(tile_rect(level, 256, 1, 2, 1), Rect { x: 511, y: 255, w: 89, h: 45 });
    }

    #[test]
    fn tiny_level_is_single_pixel_tile() {
        let r = tile_rect(Size::new(1, 1), 256, 1, 0, 0);
        assert_eq!(r, Rect { x: 0, y: 0, w: 1, h: 1 });
    }

    #[test]
    fn rects_are_column_major_and_cover_grid() {
        let level = Size::new(700, 300);
        let grid = LevelGrid { cols: 3, rows: 2 };
        let order: Vec<(u32, u32)> = tile_rects(level, grid, 256, 0).map(|(c, r, _)| (c, r)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
        for (_, _, rect) in tile_rects(level, grid, 256, 0) {
            assert!(rect.right() <= level.w);
            assert!(rect.bottom() <= level.h);
        }
    }

    #[test]
    fn compact_crop_copies_rows() {
        // 4x2 RGBA image, pixel value = x + 10*y in every channel.
        let mut src = Vec::new();
        for y in 0..2u8 {
            for x in 0..4u8 {
                src.extend_from_slice(&[x + 10 * y; 4]);
            }
        }
        let mut staging = Staging::with_capacity(0);
        let out = compact_crop_to_staging(&src, 16, Rect { x: 1, y: 0, w: 2, h: 2 }, 4, &mut staging);
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], 1);
        assert_eq!(out[4], 2);
        assert_eq!(out[8], 11);
        assert_eq!(out[12], 12);
    }
}
