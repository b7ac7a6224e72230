use crate::error::QuantizeError;
use crate::glyph::{Charset, Glyph};
use crate::lab::ColorMetric;
use crate::palette::Palette;
use crate::raster::SourceImage;
use crate::sampler::ErrorSet;

/// One tile's rendering choice: a glyph drawn in a foreground color over a
/// background color, all by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileAssignment {
    pub glyph: u16,
    pub fg: u8,
    pub bg: u8,
}

/// A solved grid of tile assignments, stamped with the charset and palette
/// versions it was computed against.
///
/// The grid is recomputed from scratch each round, never patched. Glyph
/// indices are only meaningful against the charset version recorded here;
/// consumers that interpret them assert the stamp. The palette stamp may lag
/// one refinement behind: palette refinement preserves index identity and
/// size, and the driver deliberately re-renders an existing grid with the
/// refined colors.
#[derive(Debug, Clone)]
pub struct TiledImage {
    cells: Vec<TileAssignment>,
    width: usize,
    height: usize,
    charset_version: u64,
    palette_version: u64,
}

impl TiledImage {
    /// Grid width in tiles.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in tiles.
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> TileAssignment {
        self.cells[y * self.width + x]
    }

    pub fn cells(&self) -> &[TileAssignment] {
        &self.cells
    }

    pub fn charset_version(&self) -> u64 {
        self.charset_version
    }

    pub fn palette_version(&self) -> u64 {
        self.palette_version
    }

    /// Whether this grid was solved against exactly these charset and palette
    /// versions.
    pub fn is_current(&self, charset: &Charset, palette: &Palette) -> bool {
        self.charset_version == charset.version() && self.palette_version == palette.version()
    }
}

/// Sum of the distance-table entries this glyph attributes to the foreground
/// (bits on) or background (bits off).
#[inline]
fn masked_error(glyph: &Glyph, color_errors: &[f64], as_fg: bool) -> f64 {
    let mut error = 0.0;
    for (bit, e) in glyph.bits().iter().zip(color_errors) {
        if *bit == as_fg {
            error += e;
        }
    }
    error
}

/// Find the cheapest (glyph, fg, bg) triple for the tile whose top-left
/// source pixel is (x0, y0).
///
/// The fg and bg minimizations are independent per glyph; ties break to the
/// first-seen candidate (ascending color index, then ascending glyph index).
fn best_assignment(
    input: &SourceImage,
    charset: &Charset,
    palette: &Palette,
    metric: ColorMetric,
    x0: usize,
    y0: usize,
) -> (TileAssignment, f64) {
    let gw = charset.glyph_width();
    let gh = charset.glyph_height();
    let window = gw * gh;

    // Dense table: squared distance of every window pixel to every palette
    // color, computed once per tile.
    let mut color_errors = vec![0.0f64; palette.len() * window];
    for (color, row) in color_errors.chunks_exact_mut(window).enumerate() {
        let color_lab = palette.lab(color);
        for y in 0..gh {
            for x in 0..gw {
                row[y * gw + x] = metric.distance_sq(input.lab(x0 + x, y0 + y), color_lab);
            }
        }
    }

    let mut champion = TileAssignment::default();
    let mut record_error = f64::INFINITY;

    for (glyph_idx, glyph) in charset.glyphs().iter().enumerate() {
        let mut fg = 0u8;
        let mut min_fg = f64::INFINITY;
        for color in 0..palette.len() {
            let cand = masked_error(glyph, &color_errors[color * window..(color + 1) * window], true);
            if min_fg > cand {
                fg = color as u8;
                min_fg = cand;
            }
        }

        // The background can only add error, so a glyph whose best
        // foreground alone beats the record can't win.
        if min_fg > record_error {
            continue;
        }

        let mut bg = 0u8;
        let mut min_bg = f64::INFINITY;
        for color in 0..palette.len() {
            let cand =
                masked_error(glyph, &color_errors[color * window..(color + 1) * window], false);
            if min_bg > cand {
                bg = color as u8;
                min_bg = cand;
            }
        }

        if min_fg + min_bg < record_error {
            champion = TileAssignment {
                glyph: glyph_idx as u16,
                fg,
                bg,
            };
            record_error = min_fg + min_bg;
        }
    }

    (champion, record_error)
}

/// Solve the whole image: choose the best (glyph, fg, bg) triple for every
/// tile and collect per-tile errors into an [`ErrorSet`].
///
/// Pure function of its inputs with deterministic tie-breaks: solving twice
/// with identical inputs yields bit-identical grids. Rejects images whose
/// dimensions are not divisible by the glyph dimensions.
pub fn quantize_image(
    input: &SourceImage,
    charset: &Charset,
    palette: &Palette,
    metric: ColorMetric,
) -> Result<(TiledImage, ErrorSet), QuantizeError> {
    let gw = charset.glyph_width();
    let gh = charset.glyph_height();

    if gw == 0 || gh == 0 {
        return Err(QuantizeError::ZeroGlyphDimension);
    }
    if charset.is_empty() {
        return Err(QuantizeError::InvalidCharsetSize(0));
    }
    if palette.is_empty() {
        return Err(QuantizeError::InvalidPaletteSize(0));
    }
    if input.height() % gh != 0 {
        return Err(QuantizeError::HeightNotDivisible {
            height: input.height(),
            glyph_height: gh,
        });
    }
    if input.width() % gw != 0 {
        return Err(QuantizeError::WidthNotDivisible {
            width: input.width(),
            glyph_width: gw,
        });
    }

    let tiles_x = input.width() / gw;
    let tiles_y = input.height() / gh;

    let mut cells = Vec::with_capacity(tiles_x * tiles_y);
    let mut errors = ErrorSet::new();

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (assignment, error) =
                best_assignment(input, charset, palette, metric, tx * gw, ty * gh);
            cells.push(assignment);
            errors.push(tx, ty, error);
        }
    }

    Ok((
        TiledImage {
            cells,
            width: tiles_x,
            height: tiles_y,
            charset_version: charset.version(),
            palette_version: palette.version(),
        },
        errors,
    ))
}
