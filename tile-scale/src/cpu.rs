// SPDX-License-Identifier: MIT
// CPU resampler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, Lanczos3, direct write into caller-provided dst buffer.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{FilterType, ResizeAlg, ResizeOptions, Resizer};

use crate::levels::Size;

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall { needed: usize, got: usize },
    EmptyDimension(Size),
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall { needed, got } => {
                write!(f, "Output buffer too small: need {} bytes, got {}", needed, got)
            }
            ScaleError::EmptyDimension(s) => write!(f, "Cannot resample {}x{} image", s.w, s.h),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Byte length of a tightly packed RGBA8 buffer of `size`.
#[inline]
pub fn rgba_len(size: Size) -> usize {
    (size.w as usize) * (size.h as usize) * 4
}

/// Resample a tightly packed RGBA8 buffer to `dst_size` with a Lanczos3 filter.
///
/// `dst` must hold at least `dst_size.w * dst_size.h * 4` bytes; only that
/// prefix is written.
///
/// With `use_alpha` the source is premultiplied first so transparent edges do
/// not bleed dark fringes. That premultiplied copy is as large as `src_rgba`
/// and stays inside `resizer` until the resizer is dropped or reset; pass
/// `false` for opaque sources.
pub fn resize_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    dst_size: Size,
    dst: &mut [u8],
    use_alpha: bool,
) -> Result<(), ScaleError> {
    if src.w == 0 || src.h == 0 {
        return Err(ScaleError::EmptyDimension(src));
    }
    if dst_size.w == 0 || dst_size.h == 0 {
        return Err(ScaleError::EmptyDimension(dst_size));
    }
    let dst_len = rgba_len(dst_size);
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall { needed: dst_len, got: dst.len() });
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, src_rgba)?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(dst_size.w, dst_size.h, &mut dst[..dst_len])?;

    let opts = ResizeOptions::new()
        .resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3))
        .use_alpha(use_alpha);
    resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;

    Ok(())
}

/// Allocating convenience wrapper around [`resize_rgba_cpu`].
pub fn resize_rgba_to_vec(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    dst_size: Size,
    use_alpha: bool,
) -> Result<Vec<u8>, ScaleError> {
    let mut out = vec![0u8; rgba_len(dst_size)];
    resize_rgba_cpu(resizer, src_rgba, src, dst_size, &mut out, use_alpha)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(size: Size, px: [u8; 4]) -> Vec<u8> {
        let mut v = vec![0u8; rgba_len(size)];
        for chunk in v.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
        v
    }

    #[test]
    fn downscale_keeps_solid_colour() {
        let mut resizer = Resizer::new();
        let src = solid(Size::new(64, 48), [10, 200, 30, 255]);
        let out = resize_rgba_to_vec(&mut resizer, &src, Size::new(64, 48), Size::new(16, 12), false).unwrap();
        assert_eq!(out.len(), 16 * 12 * 4);
        for px in out.chunks_exact(4) {
            assert!((i16::from(px[0]) - 10).abs() <= 1);
            assert!((i16::from(px[1]) - 200).abs() <= 1);
            assert!((i16::from(px[2]) - 30).abs() <= 1);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn resize_to_single_pixel() {
        let mut resizer = Resizer::new();
        let src = solid(Size::new(5, 3), [255, 255, 255, 255]);
        let out = resize_rgba_to_vec(&mut resizer, &src, Size::new(5, 3), Size::new(1, 1), false).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn alpha_flag_controls_edge_fringe() {
        let size = Size::new(8, 2);
        let mut src = solid(size, [0, 0, 0, 0]);
        // Right half opaque white, left half fully transparent black.
        for (i, px) in src.chunks_exact_mut(4).enumerate() {
            if i % 8 >= 4 {
                px.copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        let mut resizer = Resizer::new();
        let aware = resize_rgba_to_vec(&mut resizer, &src, size, Size::new(4, 1), true).unwrap();
        let plain = resize_rgba_to_vec(&mut resizer, &src, size, Size::new(4, 1), false).unwrap();

        // Pixel 2 straddles the edge: premultiplied keeps it white, plain darkens it.
        assert!(aware[8] >= 252, "{:?}", &aware[8..12]);
        assert!(aware[11] < 255);
        assert!(plain[8] <= 248, "{:?}", &plain[8..12]);
    }

    #[test]
    fn rejects_short_destination() {
        let mut resizer = Resizer::new();
        let src = solid(Size::new(4, 4), [0, 0, 0, 255]);
        let mut dst = vec![0u8; 3];
        let err = resize_rgba_cpu(&mut resizer, &src, Size::new(4, 4), Size::new(2, 2), &mut dst, false).unwrap_err();
        assert!(matches!(err, ScaleError::BufferTooSmall { needed: 16, got: 3 }));
    }

    #[test]
    fn rejects_zero_sized_target() {
        let mut resizer = Resizer::new();
        let src = solid(Size::new(4, 4), [0, 0, 0, 255]);
        let err = resize_rgba_to_vec(&mut resizer, &src, Size::new(4, 4), Size::new(0, 2), false).unwrap_err();
        assert!(matches!(err, ScaleError::EmptyDimension(_)));
    }
}
