use crate::glyph::{Charset, Glyph};
use crate::palette::Palette;
use crate::raster::Raster;
use crate::solver::TiledImage;
use rgb::RGB;

fn render_glyph(
    glyph: &Glyph,
    fg: RGB<u8>,
    bg: RGB<u8>,
    dest: &mut Raster,
    x_offset: usize,
    y_offset: usize,
) {
    for y in 0..glyph.height() {
        for x in 0..glyph.width() {
            let color = if glyph.is_on(x, y) { fg } else { bg };
            dest.set(x_offset + x, y_offset + y, color);
        }
    }
}

/// Render a solved tile grid into a full-resolution raster.
///
/// Pure and deterministic: the same (grid, charset, palette) triple always
/// renders identically, which is what lets the driver trust re-rendered
/// error measurements.
///
/// Panics if the grid was solved against a different charset version — its
/// glyph indices would be meaningless (stale-state programmer error). The
/// palette may be one refinement newer than the grid's stamp; see
/// [`TiledImage`].
pub fn render_tiles(tiled: &TiledImage, charset: &Charset, palette: &Palette) -> Raster {
    assert_eq!(
        tiled.charset_version(),
        charset.version(),
        "tile grid is stale: solved against charset version {}, rendering with {}",
        tiled.charset_version(),
        charset.version(),
    );

    let gw = charset.glyph_width();
    let gh = charset.glyph_height();
    let mut out = Raster::black(tiled.width() * gw, tiled.height() * gh);

    for ty in 0..tiled.height() {
        for tx in 0..tiled.width() {
            let cell = tiled.get(tx, ty);
            render_glyph(
                charset.glyph(cell.glyph as usize),
                palette.color(cell.fg as usize),
                palette.color(cell.bg as usize),
                &mut out,
                tx * gw,
                ty * gh,
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::ColorMetric;
    use crate::raster::SourceImage;
    use crate::solver::quantize_image;

    const BLACK: RGB<u8> = RGB { r: 0, g: 0, b: 0 };
    const WHITE: RGB<u8> = RGB {
        r: 255,
        g: 255,
        b: 255,
    };

    fn solve_simple() -> (TiledImage, Charset, Palette) {
        let pixels = vec![WHITE; 64];
        let input = SourceImage::new(pixels, 8, 8).unwrap();
        let charset = Charset::blank(2, 4, 4);
        let palette = Palette::from_colors(vec![BLACK, WHITE]);
        let (tiled, _) = quantize_image(&input, &charset, &palette, ColorMetric::Cie94).unwrap();
        (tiled, charset, palette)
    }

    #[test]
    fn all_on_glyph_paints_foreground_everywhere() {
        let (tiled, charset, palette) = solve_simple();
        let out = render_tiles(&tiled, &charset, &palette);
        assert_eq!(out.width(), 8);
        assert_eq!(out.height(), 8);
        assert!(out.pixels().iter().all(|&p| p == WHITE));
    }

    #[test]
    fn rendering_is_deterministic() {
        let (tiled, charset, palette) = solve_simple();
        let a = render_tiles(&tiled, &charset, &palette);
        let b = render_tiles(&tiled, &charset, &palette);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "stale")]
    fn stale_charset_version_panics() {
        let (tiled, charset, palette) = solve_simple();
        let newer = Charset::from_glyphs(
            charset.glyphs().to_vec(),
            charset.glyph_width(),
            charset.glyph_height(),
            charset.version() + 1,
        );
        render_tiles(&tiled, &newer, &palette);
    }
}
