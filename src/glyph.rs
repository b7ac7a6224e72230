use rand::Rng;

/// A fixed-size on/off bitmap, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    width: usize,
    bits: Vec<bool>,
}

impl Glyph {
    /// An all-on glyph: every tile it covers renders as pure foreground.
    pub fn filled(width: usize, height: usize) -> Self {
        Self {
            width,
            bits: vec![true; width * height],
        }
    }

    /// A random glyph with a random dot density between 1/1 and 1/4.
    pub fn random<R: Rng>(rng: &mut R, width: usize, height: usize) -> Self {
        let density = rng.gen_range(1..=4);
        let bits = (0..width * height)
            .map(|_| rng.gen_range(0..density) == 0)
            .collect();
        Self { width, bits }
    }

    pub(crate) fn from_bits(width: usize, bits: Vec<bool>) -> Self {
        debug_assert!(width > 0 && bits.len() % width == 0);
        Self { width, bits }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.bits.len() / self.width
    }

    /// Whether the pixel at (x, y) renders as foreground.
    #[inline]
    pub fn is_on(&self, x: usize, y: usize) -> bool {
        self.bits[y * self.width + x]
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }
}

/// An ordered, indexable set of glyphs sharing one bitmap size.
///
/// The slot count and glyph dimensions are fixed for a run; refinement
/// replaces glyph contents in a new `Charset` with a bumped version. The
/// version lets derived state (a solved tile grid) detect staleness: glyph
/// indices are only meaningful against the exact charset they were solved
/// with.
#[derive(Debug, Clone)]
pub struct Charset {
    glyphs: Vec<Glyph>,
    glyph_width: usize,
    glyph_height: usize,
    version: u64,
}

impl Charset {
    /// A charset of all-on glyphs, the usual starting state.
    pub fn blank(len: usize, glyph_width: usize, glyph_height: usize) -> Self {
        Self {
            glyphs: vec![Glyph::filled(glyph_width, glyph_height); len],
            glyph_width,
            glyph_height,
            version: 0,
        }
    }

    /// A charset of independently randomized glyphs.
    pub fn random<R: Rng>(
        rng: &mut R,
        len: usize,
        glyph_width: usize,
        glyph_height: usize,
    ) -> Self {
        Self {
            glyphs: (0..len)
                .map(|_| Glyph::random(rng, glyph_width, glyph_height))
                .collect(),
            glyph_width,
            glyph_height,
            version: 0,
        }
    }

    pub(crate) fn from_glyphs(
        glyphs: Vec<Glyph>,
        glyph_width: usize,
        glyph_height: usize,
        version: u64,
    ) -> Self {
        debug_assert!(glyphs
            .iter()
            .all(|g| g.width() == glyph_width && g.height() == glyph_height));
        Self {
            glyphs,
            glyph_width,
            glyph_height,
            version,
        }
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    #[inline]
    pub fn glyph(&self, index: usize) -> &Glyph {
        &self.glyphs[index]
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn glyph_width(&self) -> usize {
        self.glyph_width
    }

    pub fn glyph_height(&self) -> usize {
        self.glyph_height
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn blank_charset_is_all_on() {
        let cs = Charset::blank(4, 8, 8);
        assert_eq!(cs.len(), 4);
        for g in cs.glyphs() {
            assert!(g.bits().iter().all(|&b| b));
        }
    }

    #[test]
    fn random_glyph_has_requested_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let g = Glyph::random(&mut rng, 8, 16);
        assert_eq!(g.width(), 8);
        assert_eq!(g.height(), 16);
        assert_eq!(g.bits().len(), 128);
    }

    #[test]
    fn random_charset_varies_between_slots() {
        let mut rng = StdRng::seed_from_u64(7);
        let cs = Charset::random(&mut rng, 16, 8, 8);
        let first = cs.glyph(0);
        assert!(
            cs.glyphs().iter().any(|g| g != first),
            "16 random glyphs should not all be identical"
        );
    }

    #[test]
    fn bit_addressing_is_row_major() {
        let mut bits = vec![false; 8 * 8];
        bits[3 * 8 + 5] = true;
        let g = Glyph::from_bits(8, bits);
        assert!(g.is_on(5, 3));
        assert!(!g.is_on(3, 5));
    }
}
