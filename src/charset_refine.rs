use log::{debug, warn};
use rand::Rng;

use crate::glyph::{Charset, Glyph};
use crate::lab::ColorMetric;
use crate::palette::Palette;
use crate::raster::SourceImage;
use crate::sampler::ErrorSet;
use crate::solver::TiledImage;

/// Recompute a glyph from the tiles currently drawn with it.
///
/// For each pixel position, the covering tiles vote: the bit goes on iff
/// summed error of painting the source pixels with each tile's fg color is
/// no worse than painting them with its bg color. Each computed bit is then
/// independently flipped with probability `noise`.
#[allow(clippy::too_many_arguments)]
fn ideal_glyph<R: Rng>(
    input: &SourceImage,
    tiled: &TiledImage,
    palette: &Palette,
    covered_tiles: &[(usize, usize)],
    glyph_width: usize,
    glyph_height: usize,
    metric: ColorMetric,
    noise: f64,
    rng: &mut R,
) -> Glyph {
    let mut bits = Vec::with_capacity(glyph_width * glyph_height);

    for y in 0..glyph_height {
        for x in 0..glyph_width {
            let mut error_by_fg = 0.0;
            let mut error_by_bg = 0.0;
            for &(tx, ty) in covered_tiles {
                let cell = tiled.get(tx, ty);
                let pixel = input.lab(tx * glyph_width + x, ty * glyph_height + y);
                error_by_fg += metric.distance_sq(palette.lab(cell.fg as usize), pixel);
                error_by_bg += metric.distance_sq(palette.lab(cell.bg as usize), pixel);
            }
            let mut bit = error_by_fg <= error_by_bg;
            if rng.gen::<f64>() <= noise {
                bit = !bit;
            }
            bits.push(bit);
        }
    }

    Glyph::from_bits(glyph_width, bits)
}

/// Synthesize a glyph for a single tile by brute force over all fg/bg color
/// pairs (fg != bg), choosing the per-pixel on/off mask that minimizes
/// summed error. A worse candidate may still be accepted with probability
/// `noise`. Slow, but only run for reseeded slots.
#[allow(clippy::too_many_arguments)]
fn brute_ideal_glyph<R: Rng>(
    input: &SourceImage,
    palette: &Palette,
    tile_x: usize,
    tile_y: usize,
    glyph_width: usize,
    glyph_height: usize,
    metric: ColorMetric,
    noise: f64,
    rng: &mut R,
) -> Glyph {
    let mut champion = vec![false; glyph_width * glyph_height];
    let mut candidate = champion.clone();
    let mut record_error = f64::INFINITY;

    for fg in 0..palette.len() {
        for bg in 0..palette.len() {
            if fg == bg {
                continue;
            }

            let mut cand_error = 0.0;
            for y in 0..glyph_height {
                for x in 0..glyph_width {
                    let pixel = input.lab(tile_x * glyph_width + x, tile_y * glyph_height + y);
                    let error_by_fg = metric.distance_sq(palette.lab(fg), pixel);
                    let error_by_bg = metric.distance_sq(palette.lab(bg), pixel);
                    candidate[y * glyph_width + x] = error_by_fg <= error_by_bg;
                    cand_error += error_by_fg.min(error_by_bg);
                }
            }

            if record_error > cand_error || rng.gen::<f64>() <= noise {
                champion.copy_from_slice(&candidate);
                record_error = cand_error;
            }
        }
    }

    Glyph::from_bits(glyph_width, champion)
}

/// Recompute every glyph slot from the tiles currently using it, reseeding
/// underused slots kmeans++-style from the tile error distribution.
///
/// A slot counts as underused when its coverage is at or below the
/// stochastic threshold `2·u·noise` (with zero noise, only slots no tile
/// uses at all). The first `reseed_cap` underused slots are planted on a
/// high-error tile drawn from `errors` (with removal) and synthesized by
/// brute force; the rest, and any slot whose draw hits a degenerate error
/// set, get a freshly randomized glyph instead.
///
/// Returns a full replacement charset of identical size with a bumped
/// version. Panics if `tiled` was solved against a different charset
/// version.
#[allow(clippy::too_many_arguments)]
pub fn refine_charset<R: Rng>(
    input: &SourceImage,
    tiled: &TiledImage,
    charset: &Charset,
    palette: &Palette,
    errors: &mut ErrorSet,
    metric: ColorMetric,
    noise: f64,
    reseed_cap: usize,
    rng: &mut R,
) -> Charset {
    assert_eq!(
        tiled.charset_version(),
        charset.version(),
        "tile grid is stale: solved against charset version {}, refining version {}",
        tiled.charset_version(),
        charset.version(),
    );

    let gw = charset.glyph_width();
    let gh = charset.glyph_height();

    let mut covered: Vec<Vec<(usize, usize)>> = vec![Vec::new(); charset.len()];
    for ty in 0..tiled.height() {
        for tx in 0..tiled.width() {
            covered[tiled.get(tx, ty).glyph as usize].push((tx, ty));
        }
    }

    let mut glyphs = Vec::with_capacity(charset.len());
    let mut reseeded = 0usize;

    for (slot, tiles) in covered.iter().enumerate() {
        if (tiles.len() as f64) <= 2.0 * rng.gen::<f64>() * noise {
            reseeded += 1;
            if reseeded > reseed_cap {
                glyphs.push(Glyph::random(rng, gw, gh));
                continue;
            }
            match errors.sample(rng, true) {
                Ok((tx, ty)) => {
                    debug!("reseeding underused glyph slot {slot} from tile ({tx}, {ty})");
                    glyphs.push(brute_ideal_glyph(
                        input, palette, tx, ty, gw, gh, metric, noise, rng,
                    ));
                }
                Err(_) => {
                    warn!("tile error distribution exhausted; slot {slot} gets a random glyph");
                    glyphs.push(Glyph::random(rng, gw, gh));
                }
            }
            continue;
        }

        glyphs.push(ideal_glyph(
            input, tiled, palette, tiles, gw, gh, metric, noise, rng,
        ));
    }

    Charset::from_glyphs(glyphs, gw, gh, charset.version() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::quantize_image;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rgb::RGB;

    const BLACK: RGB<u8> = RGB { r: 0, g: 0, b: 0 };
    const WHITE: RGB<u8> = RGB {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Left half white, right half black within every 4x4 tile.
    fn half_and_half(tiles_x: usize, tiles_y: usize) -> SourceImage {
        let width = tiles_x * 4;
        let height = tiles_y * 4;
        let pixels = (0..width * height)
            .map(|i| if (i % width) % 4 < 2 { WHITE } else { BLACK })
            .collect();
        SourceImage::new(pixels, width, height).unwrap()
    }

    #[test]
    fn refinement_bumps_version_and_keeps_size() {
        let input = half_and_half(4, 2);
        let charset = Charset::blank(3, 4, 4);
        let palette = Palette::from_colors(vec![BLACK, WHITE]);
        let (tiled, mut errors) =
            quantize_image(&input, &charset, &palette, ColorMetric::Cie94).unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        let refined = refine_charset(
            &input,
            &tiled,
            &charset,
            &palette,
            &mut errors,
            ColorMetric::Cie94,
            0.0,
            6,
            &mut rng,
        );
        assert_eq!(refined.len(), charset.len());
        assert_eq!(refined.version(), charset.version() + 1);
    }

    #[test]
    fn covered_glyph_learns_tile_structure() {
        // Every tile is white in columns 0-1 and black in columns 2-3. Seed
        // the only glyph with just column 0 on: the solver then picks white
        // fg, black bg, and the zero-noise vote must widen the glyph to the
        // true half-and-half split.
        let input = half_and_half(4, 4);
        let mut bits = vec![false; 16];
        for y in 0..4 {
            bits[y * 4] = true;
        }
        let charset = Charset::from_glyphs(vec![Glyph::from_bits(4, bits)], 4, 4, 0);
        let palette = Palette::from_colors(vec![BLACK, WHITE]);
        let (tiled, mut errors) =
            quantize_image(&input, &charset, &palette, ColorMetric::Cie94).unwrap();

        let cell = tiled.get(0, 0);
        assert_eq!(palette.color(cell.fg as usize), WHITE);
        assert_eq!(palette.color(cell.bg as usize), BLACK);

        let mut rng = StdRng::seed_from_u64(5);
        let refined = refine_charset(
            &input,
            &tiled,
            &charset,
            &palette,
            &mut errors,
            ColorMetric::Cie94,
            0.0,
            6,
            &mut rng,
        );

        let glyph = refined.glyph(0);
        for y in 0..4 {
            assert!(glyph.is_on(0, y), "white column 0 must be fg");
            assert!(glyph.is_on(1, y), "white column 1 must be fg");
            assert!(!glyph.is_on(2, y), "black column 2 must be bg");
            assert!(!glyph.is_on(3, y), "black column 3 must be bg");
        }
    }

    #[test]
    fn unused_slots_are_replaced() {
        // Slot count far exceeds distinct tile content; with zero noise the
        // uncovered slots (coverage 0) must be reseeded or randomized, and
        // the refiner must not panic when the error set runs dry.
        let input = half_and_half(2, 1);
        let charset = Charset::blank(32, 4, 4);
        let palette = Palette::from_colors(vec![BLACK, WHITE]);
        let (tiled, mut errors) =
            quantize_image(&input, &charset, &palette, ColorMetric::Cie94).unwrap();

        let mut rng = StdRng::seed_from_u64(17);
        let refined = refine_charset(
            &input,
            &tiled,
            &charset,
            &palette,
            &mut errors,
            ColorMetric::Cie94,
            0.0,
            6,
            &mut rng,
        );
        assert_eq!(refined.len(), 32);
    }
}
