//! Anisotropic resampling of RGBA buffers
//!
//! Masks come out of segmentation at a resolution unrelated to the source, so
//! horizontal and vertical scale factors are always computed independently.

use crate::{
    config::ResampleFilter,
    error::{Result, SilhouetteError},
    types::{pixel_count, PixelBuffer},
};
use image::imageops;
use tracing::trace;

/// Independent horizontal and vertical scale factors from one grid to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub sx: f64,
    pub sy: f64,
}

impl ScaleFactors {
    /// `sx = to_width / from_width`, `sy = to_height / from_height`
    ///
    /// Zero-sized source axes are treated as size 1.
    #[must_use]
    pub fn between(from: (u32, u32), to: (u32, u32)) -> Self {
        Self {
            sx: f64::from(to.0) / f64::from(from.0.max(1)),
            sy: f64::from(to.1) / f64::from(from.1.max(1)),
        }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        (self.sx - 1.0).abs() < f64::EPSILON && (self.sy - 1.0).abs() < f64::EPSILON
    }
}

/// Resample `buffer` to exactly `width x height`
///
/// All four channels are resampled. Returns a copy when the size already matches.
///
/// # Errors
/// - The source is empty while the target is not
pub fn resample(
    buffer: &PixelBuffer,
    width: u32,
    height: u32,
    filter: ResampleFilter,
) -> Result<PixelBuffer> {
    let (src_w, src_h) = buffer.dimensions();
    if (src_w, src_h) == (width, height) {
        return Ok(buffer.clone());
    }
    if pixel_count(width, height) == 0 {
        return PixelBuffer::from_raw(width, height, Vec::new());
    }
    if src_w == 0 || src_h == 0 {
        return Err(SilhouetteError::render(format!(
            "cannot resample an empty {}x{} buffer to {}x{}",
            src_w, src_h, width, height
        )));
    }

    let scale = ScaleFactors::between((src_w, src_h), (width, height));
    trace!(sx = scale.sx, sy = scale.sy, %filter, "Resampling buffer");

    let resized = imageops::resize(buffer.as_image(), width, height, filter.into());
    Ok(PixelBuffer::from(resized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mask;

    fn quadrant_mask(size: u32, opaque: u32) -> PixelBuffer {
        let mut alpha = Vec::new();
        for y in 0..size {
            for x in 0..size {
                alpha.push(if x < opaque && y < opaque { 255 } else { 0 });
            }
        }
        Mask::from_alpha(size, size, &alpha).unwrap().into_buffer()
    }

    #[test]
    fn test_scale_factors_are_independent() {
        let scale = ScaleFactors::between((256, 256), (1920, 1080));
        assert!((scale.sx - 7.5).abs() < 1e-9);
        assert!((scale.sy - 4.21875).abs() < 1e-9);
        assert!(!scale.is_identity());
        assert!(ScaleFactors::between((10, 20), (10, 20)).is_identity());
    }

    #[test]
    fn test_uniform_opaque_mask_stays_opaque() {
        for filter in [ResampleFilter::Bilinear, ResampleFilter::Nearest] {
            let mask = Mask::opaque(50, 50).into_buffer();
            let resized = resample(&mask, 100, 100, filter).unwrap();
            assert_eq!(resized.dimensions(), (100, 100));
            assert!(Mask::from_rgba(resized).is_fully_opaque());

            let odd = Mask::opaque(7, 3).into_buffer();
            let resized = resample(&odd, 64, 48, filter).unwrap();
            assert_eq!(resized.dimensions(), (64, 48));
            assert!(Mask::from_rgba(resized).is_fully_opaque());
        }
    }

    #[test]
    fn test_downscale_produces_exact_size() {
        let mask = Mask::opaque(320, 320).into_buffer();
        let resized = resample(&mask, 33, 17, ResampleFilter::Bilinear).unwrap();
        assert_eq!(resized.dimensions(), (33, 17));
        assert_eq!(resized.as_bytes().len(), 33 * 17 * 4);
    }

    #[test]
    fn test_nearest_preserves_quadrant_boundary() {
        let mask = quadrant_mask(32, 16);
        let resized = Mask::from_rgba(resample(&mask, 64, 64, ResampleFilter::Nearest).unwrap());

        for y in 0..64usize {
            for x in 0..64usize {
                let expected = if x < 32 && y < 32 { 255 } else { 0 };
                assert_eq!(resized.alpha_at(y * 64 + x), Some(expected), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_bilinear_transition_sits_on_boundary() {
        let mask = quadrant_mask(32, 16);
        let resized = Mask::from_rgba(resample(&mask, 64, 64, ResampleFilter::Bilinear).unwrap());

        // Interior of the quadrant is untouched by interpolation
        assert_eq!(resized.alpha_at(10 * 64 + 10), Some(255));
        assert_eq!(resized.alpha_at(30 * 64 + 30), Some(255));
        assert_eq!(resized.alpha_at(40 * 64 + 40), Some(0));

        // Last column inside stays mostly opaque, first column outside mostly clear
        let inside = resized.alpha_at(10 * 64 + 31).unwrap();
        let outside = resized.alpha_at(10 * 64 + 32).unwrap();
        assert!(inside >= 128, "inside edge alpha {inside}");
        assert!(outside < 128, "outside edge alpha {outside}");
    }

    #[test]
    fn test_same_size_is_copy() {
        let mask = quadrant_mask(8, 4);
        let resized = resample(&mask, 8, 8, ResampleFilter::Bilinear).unwrap();
        assert_eq!(resized, mask);
    }

    #[test]
    fn test_anisotropic_exact_sizes() {
        for filter in [ResampleFilter::Bilinear, ResampleFilter::Nearest] {
            let mask = Mask::opaque(256, 256).into_buffer();
            let resized = resample(&mask, 1920, 1080, filter).unwrap();
            assert_eq!(resized.dimensions(), (1920, 1080));
            assert!(Mask::from_rgba(resized).is_fully_opaque());

            let down = resample(&Mask::opaque(320, 320).into_buffer(), 33, 17, filter).unwrap();
            assert_eq!(down.dimensions(), (33, 17));
        }
    }

    #[test]
    fn test_bilinear_boundary_ramp() {
        let mask = quadrant_mask(32, 16);
        let resized = Mask::from_rgba(resample(&mask, 64, 64, ResampleFilter::Bilinear).unwrap());
        let row: Vec<u8> = (28..36).map(|x| resized.alpha_at(4 * 64 + x).unwrap()).collect();
        assert_eq!(row, vec![255, 255, 255, 191, 64, 0, 0, 0]);
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let empty = PixelBuffer::from_raw(0, 0, Vec::new()).unwrap();
        assert!(resample(&empty, 4, 4, ResampleFilter::Nearest).is_err());
    }
}
