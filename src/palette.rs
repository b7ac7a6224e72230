use rand::Rng;
use rgb::RGB;

use crate::lab::{srgb_to_lab, Lab};

/// Draw a uniformly random sRGB color.
pub(crate) fn random_color<R: Rng>(rng: &mut R) -> RGB<u8> {
    RGB {
        r: rng.gen(),
        g: rng.gen(),
        b: rng.gen(),
    }
}

/// An ordered color palette with Lab-space acceleration.
///
/// Tiles reference colors by index, so index identity matters: refinement
/// replaces color values slot-for-slot in a new `Palette` of the same length
/// with a bumped version, never reorders or resizes.
#[derive(Debug, Clone)]
pub struct Palette {
    /// sRGB palette entries.
    entries_srgb: Vec<RGB<u8>>,
    /// Lab values for each palette entry (same order as entries_srgb).
    entries_lab: Vec<Lab>,
    version: u64,
}

impl Palette {
    /// Build a palette from sRGB colors.
    pub fn from_colors(colors: Vec<RGB<u8>>) -> Self {
        Self::with_version(colors, 0)
    }

    pub(crate) fn with_version(colors: Vec<RGB<u8>>, version: u64) -> Self {
        let entries_lab = colors.iter().map(|&c| srgb_to_lab(c)).collect();
        Self {
            entries_srgb: colors,
            entries_lab,
            version,
        }
    }

    /// A palette of uniformly random colors.
    pub fn random<R: Rng>(rng: &mut R, len: usize) -> Self {
        Self::from_colors((0..len).map(|_| random_color(rng)).collect())
    }

    /// Get sRGB palette entries.
    pub fn entries(&self) -> &[RGB<u8>] {
        &self.entries_srgb
    }

    /// Get Lab palette entries.
    pub fn entries_lab(&self) -> &[Lab] {
        &self.entries_lab
    }

    #[inline]
    pub fn color(&self, index: usize) -> RGB<u8> {
        self.entries_srgb[index]
    }

    #[inline]
    pub fn lab(&self, index: usize) -> Lab {
        self.entries_lab[index]
    }

    pub fn len(&self) -> usize {
        self.entries_srgb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries_srgb.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
