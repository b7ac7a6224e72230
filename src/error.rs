use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuantizeError {
    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        len: usize,
        width: usize,
        height: usize,
    },

    #[error("image height {height} is not divisible by glyph height {glyph_height}")]
    HeightNotDivisible { height: usize, glyph_height: usize },

    #[error("image width {width} is not divisible by glyph width {glyph_width}")]
    WidthNotDivisible { width: usize, glyph_width: usize },

    #[error("charset size must be between 1 and 256, got {0}")]
    InvalidCharsetSize(usize),

    #[error("palette size must be between 2 and 16, got {0}")]
    InvalidPaletteSize(usize),

    #[error("glyph dimensions cannot be zero")]
    ZeroGlyphDimension,

    #[error("round count must be nonzero")]
    InvalidRounds,

    #[error("cannot roulette-sample from an empty or zero-error set")]
    DegenerateErrorSet,
}
