#![forbid(unsafe_code)]

pub mod charset_refine;
pub mod error;
pub mod glyph;
pub mod lab;
pub mod palette;
pub mod palette_refine;
pub mod raster;
pub mod render;
pub mod sampler;
pub mod solver;

pub use charset_refine::refine_charset;
pub use error::QuantizeError;
pub use glyph::{Charset, Glyph};
pub use lab::{ColorMetric, Lab};
pub use palette::Palette;
pub use palette_refine::refine_palette;
pub use raster::{rms_error, Raster, SourceImage};
pub use render::render_tiles;
pub use sampler::{ErrorRecord, ErrorSet};
pub use solver::{quantize_image, TileAssignment, TiledImage};

use log::{debug, info};
use rand::Rng;

/// Configuration for one text-mode optimization run.
#[derive(Debug, Clone)]
pub struct QuantizeConfig {
    /// Number of glyph slots (1..=256). Callers reserving slots for an
    /// overlay simply pass a smaller count.
    pub charset_size: usize,
    /// Number of palette colors (2..=16).
    pub palette_size: usize,
    /// Glyph bitmap width in pixels; the image width must be divisible by it.
    pub glyph_width: usize,
    /// Glyph bitmap height in pixels; the image height must be divisible by it.
    pub glyph_height: usize,
    /// Refinement rounds to run (charset and palette alternate).
    pub rounds: u32,
    /// Final rounds forced to zero noise (pure greedy exploitation).
    pub greedy_rounds: u32,
    /// Maximum glyph slots reseeded from the error distribution per round;
    /// slots beyond the cap get cheap random glyphs instead.
    pub reseed_cap: usize,
    /// Perceptual distance formula used everywhere.
    pub metric: ColorMetric,
    /// Geometric decay base for the exploration noise, `noise = decay^round`.
    /// `None` draws a fresh base uniformly per run.
    pub noise_decay: Option<f64>,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            charset_size: 256,
            palette_size: 16,
            glyph_width: 8,
            glyph_height: 8,
            rounds: 52,
            greedy_rounds: 2,
            reseed_cap: 6,
            metric: ColorMetric::Cie94,
            noise_decay: None,
        }
    }
}

impl QuantizeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charset_size(mut self, n: usize) -> Self {
        self.charset_size = n;
        self
    }

    pub fn palette_size(mut self, n: usize) -> Self {
        self.palette_size = n;
        self
    }

    pub fn glyph_size(mut self, width: usize, height: usize) -> Self {
        self.glyph_width = width;
        self.glyph_height = height;
        self
    }

    pub fn rounds(mut self, n: u32) -> Self {
        self.rounds = n;
        self
    }

    pub fn greedy_rounds(mut self, n: u32) -> Self {
        self.greedy_rounds = n;
        self
    }

    pub fn reseed_cap(mut self, n: usize) -> Self {
        self.reseed_cap = n;
        self
    }

    pub fn metric(mut self, metric: ColorMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn noise_decay(mut self, decay: f64) -> Self {
        self.noise_decay = Some(decay);
        self
    }
}

/// The best state one optimization run found: the artifacts a caller
/// persists, plus the whole-image RMS error they achieved.
#[derive(Debug, Clone)]
pub struct Optimized {
    charset: Charset,
    palette: Palette,
    tiled: TiledImage,
    rms_error: f64,
}

impl Optimized {
    pub fn charset(&self) -> &Charset {
        &self.charset
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn tiles(&self) -> &TiledImage {
        &self.tiled
    }

    /// Root-mean-square perceptual error of [`Self::render`] against the
    /// source, measured on a full re-render.
    pub fn rms_error(&self) -> f64 {
        self.rms_error
    }

    /// Reproduce the winning render.
    pub fn render(&self) -> Raster {
        render_tiles(&self.tiled, &self.charset, &self.palette)
    }
}

fn validate_config(config: &QuantizeConfig) -> Result<(), QuantizeError> {
    if config.charset_size == 0 || config.charset_size > 256 {
        return Err(QuantizeError::InvalidCharsetSize(config.charset_size));
    }
    if config.palette_size < 2 || config.palette_size > 16 {
        return Err(QuantizeError::InvalidPaletteSize(config.palette_size));
    }
    if config.glyph_width == 0 || config.glyph_height == 0 {
        return Err(QuantizeError::ZeroGlyphDimension);
    }
    if config.rounds == 0 {
        return Err(QuantizeError::InvalidRounds);
    }
    Ok(())
}

/// Run one optimization pass: alternate charset and palette refinement
/// around the tile solver, decay the exploration noise geometrically, and
/// keep the best full-render RMS error seen.
///
/// Starts from a blank (all-on) charset and a random palette. Even rounds
/// refine the charset and re-solve the tile grid; odd rounds refine the
/// palette and re-render the existing grid with the new colors. The final
/// `greedy_rounds` rounds run with zero noise.
///
/// One call is one independent restart; callers wanting the multi-restart
/// search loop it with fresh seeds and keep the lowest
/// [`Optimized::rms_error`].
pub fn optimize<R: Rng>(
    input: &SourceImage,
    config: &QuantizeConfig,
    rng: &mut R,
) -> Result<Optimized, QuantizeError> {
    validate_config(config)?;

    let mut charset = Charset::blank(config.charset_size, config.glyph_width, config.glyph_height);
    let mut palette = Palette::random(rng, config.palette_size);

    let (mut tiled, mut errors) = quantize_image(input, &charset, &palette, config.metric)?;
    let mut rendered = render_tiles(&tiled, &charset, &palette);

    let mut best = Optimized {
        charset: charset.clone(),
        palette: palette.clone(),
        tiled: tiled.clone(),
        rms_error: rms_error(input, &rendered, config.metric),
    };
    debug!("initial rms error {:.4}", best.rms_error);

    let decay = config.noise_decay.unwrap_or_else(|| rng.gen::<f64>());

    for round in 0..config.rounds {
        let noise = if round + config.greedy_rounds < config.rounds {
            decay.powi(round as i32)
        } else {
            0.0
        };

        if round % 2 == 0 {
            charset = refine_charset(
                input,
                &tiled,
                &charset,
                &palette,
                &mut errors,
                config.metric,
                noise,
                config.reseed_cap,
                rng,
            );
            let solved = quantize_image(input, &charset, &palette, config.metric)?;
            tiled = solved.0;
            errors = solved.1;
        } else {
            palette = refine_palette(
                input,
                &tiled,
                &rendered,
                &palette,
                config.metric,
                noise * 0.75,
                rng,
            );
        }

        rendered = render_tiles(&tiled, &charset, &palette);
        let candidate = rms_error(input, &rendered, config.metric);
        debug!("round {round}: noise {noise:.4}, rms error {candidate:.4}");

        if candidate < best.rms_error {
            info!("round {round}: new record rms error {candidate:.4}");
            best = Optimized {
                charset: charset.clone(),
                palette: palette.clone(),
                tiled: tiled.clone(),
                rms_error: candidate,
            };
        }
    }

    Ok(best)
}
