use rgb::RGB;

use crate::error::QuantizeError;
use crate::lab::{srgb_to_lab, ColorMetric, Lab};

/// A rectangular grid of sRGB pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    pixels: Vec<RGB<u8>>,
}

impl Raster {
    /// Wrap a flat row-major pixel buffer, validating that it matches the
    /// claimed dimensions.
    pub fn new(pixels: Vec<RGB<u8>>, width: usize, height: usize) -> Result<Self, QuantizeError> {
        if width == 0 || height == 0 {
            return Err(QuantizeError::ZeroDimension);
        }
        if pixels.len() != width * height {
            return Err(QuantizeError::DimensionMismatch {
                len: pixels.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// An all-black raster, used as a render target.
    pub(crate) fn black(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![RGB { r: 0, g: 0, b: 0 }; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[RGB<u8>] {
        &self.pixels
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> RGB<u8> {
        self.pixels[y * self.width + x]
    }

    #[inline]
    pub(crate) fn set(&mut self, x: usize, y: usize, p: RGB<u8>) {
        self.pixels[y * self.width + x] = p;
    }
}

/// The immutable optimization input: an sRGB raster with its Lab plane
/// converted once up front, so per-pixel error sums never repeat the
/// transfer-function work.
#[derive(Debug, Clone)]
pub struct SourceImage {
    raster: Raster,
    lab: Vec<Lab>,
}

impl SourceImage {
    pub fn new(pixels: Vec<RGB<u8>>, width: usize, height: usize) -> Result<Self, QuantizeError> {
        Ok(Self::from_raster(Raster::new(pixels, width, height)?))
    }

    pub fn from_raster(raster: Raster) -> Self {
        let lab = raster.pixels().iter().map(|&p| srgb_to_lab(p)).collect();
        Self { raster, lab }
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn width(&self) -> usize {
        self.raster.width
    }

    pub fn height(&self) -> usize {
        self.raster.height
    }

    #[inline]
    pub fn srgb(&self, x: usize, y: usize) -> RGB<u8> {
        self.raster.get(x, y)
    }

    #[inline]
    pub fn lab(&self, x: usize, y: usize) -> Lab {
        self.lab[y * self.raster.width + x]
    }
}

/// Root-mean-square perceptual error between the source and a rendered
/// candidate. This is the only place a square root is taken.
///
/// Panics if the dimensions differ — callers compare renders of the same
/// geometry by construction.
pub fn rms_error(source: &SourceImage, rendered: &Raster, metric: ColorMetric) -> f64 {
    assert_eq!(source.width(), rendered.width());
    assert_eq!(source.height(), rendered.height());

    let mut squared_error = 0.0;
    for y in 0..source.height() {
        for x in 0..source.width() {
            let candidate = srgb_to_lab(rendered.get(x, y));
            squared_error += metric.distance_sq(source.lab(x, y), candidate);
        }
    }

    (squared_error / (source.width() * source.height()) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Vec<RGB<u8>> {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(RGB {
                    r: (x * 255 / width.max(1)) as u8,
                    g: (y * 255 / height.max(1)) as u8,
                    b: 128,
                });
            }
        }
        pixels
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            Raster::new(Vec::new(), 0, 4),
            Err(QuantizeError::ZeroDimension)
        ));
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let pixels = gradient(4, 4);
        assert!(matches!(
            Raster::new(pixels, 4, 5),
            Err(QuantizeError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn lab_plane_matches_pointwise_conversion() {
        let source = SourceImage::new(gradient(8, 4), 8, 4).unwrap();
        let p = source.srgb(3, 2);
        assert_eq!(source.lab(3, 2), srgb_to_lab(p));
    }

    #[test]
    fn rms_error_of_identical_images_is_zero() {
        let source = SourceImage::new(gradient(8, 8), 8, 8).unwrap();
        let copy = source.raster().clone();
        assert_eq!(rms_error(&source, &copy, ColorMetric::Cie94), 0.0);
    }

    #[test]
    fn rms_error_grows_with_distortion() {
        let source = SourceImage::new(gradient(8, 8), 8, 8).unwrap();
        let mut near = source.raster().clone();
        near.set(0, 0, RGB { r: 0, g: 0, b: 0 });
        let mut far = near.clone();
        for x in 0..8 {
            far.set(x, 3, RGB { r: 255, g: 0, b: 255 });
        }
        let e_near = rms_error(&source, &near, ColorMetric::Cie94);
        let e_far = rms_error(&source, &far, ColorMetric::Cie94);
        assert!(e_near > 0.0);
        assert!(e_far > e_near);
    }
}
