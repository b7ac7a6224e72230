use std::f64::consts::PI;

use rgb::RGB;

/// CIELab color representation under the D65 2° illuminant.
///
/// L: lightness [0, 100], a: green-red, b: blue-yellow.
/// All arithmetic is f64; conversion from sRGB is explicit and one-directional
/// per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }
}

/// The perceptual squared-distance formula used for all error sums.
///
/// CIE94 is the hot-path default; CIEDE2000 is the full Sharma/Wu/Dalal
/// implementation and is selectable when accuracy matters more than speed.
/// Only squared distances are computed — the single square root happens in
/// the final RMS report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMetric {
    #[default]
    Cie94,
    Ciede2000,
}

impl ColorMetric {
    /// Perceptual squared distance between two Lab colors.
    #[inline]
    pub fn distance_sq(self, a: Lab, b: Lab) -> f64 {
        match self {
            Self::Cie94 => cie94_sq(a, b),
            Self::Ciede2000 => ciede2000_sq(a, b),
        }
    }
}

// --- sRGB ↔ XYZ ↔ Lab conversion chain ---
// Constants are the easyrgb.com reference values (XYZ scaled by 100,
// D65 2° white point 95.047 / 100.000 / 108.883).

fn srgb_to_xyz(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let expand = |c: f64| {
        let c = c / 255.0;
        if c > 0.04045 {
            ((c + 0.055) / 1.055).powf(2.4)
        } else {
            c / 12.92
        }
    };

    let r = expand(r) * 100.0;
    let g = expand(g) * 100.0;
    let b = expand(b) * 100.0;

    (
        r * 0.4124 + g * 0.3576 + b * 0.1805,
        r * 0.2126 + g * 0.7152 + b * 0.0722,
        r * 0.0193 + g * 0.1192 + b * 0.9505,
    )
}

fn xyz_to_lab(x: f64, y: f64, z: f64) -> Lab {
    let pivot = |t: f64| {
        if t > 0.008856 {
            t.powf(1.0 / 3.0)
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };

    let fx = pivot(x / 95.047);
    let fy = pivot(y / 100.000);
    let fz = pivot(z / 108.883);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

fn lab_to_xyz(lab: Lab) -> (f64, f64, f64) {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = lab.a / 500.0 + fy;
    let fz = fy - lab.b / 200.0;

    let unpivot = |t: f64| {
        if t * t * t > 0.008856 {
            t * t * t
        } else {
            (t - 16.0 / 116.0) / 7.787
        }
    };

    (
        unpivot(fx) * 95.047,
        unpivot(fy) * 100.0,
        unpivot(fz) * 108.883,
    )
}

fn xyz_to_srgb(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let x = x / 100.0;
    let y = y / 100.0;
    let z = z / 100.0;

    let r = x * 3.2406 + y * -1.5372 + z * -0.4986;
    let g = x * -0.9689 + y * 1.8758 + z * 0.0415;
    let b = x * 0.0557 + y * -0.2040 + z * 1.0570;

    let compress = |c: f64| {
        if c > 0.0031308 {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        } else {
            12.92 * c
        }
    };

    (compress(r) * 255.0, compress(g) * 255.0, compress(b) * 255.0)
}

/// Convert an sRGB pixel (0..255 per channel) to CIELab.
pub fn srgb_to_lab(p: RGB<u8>) -> Lab {
    let (x, y, z) = srgb_to_xyz(f64::from(p.r), f64::from(p.g), f64::from(p.b));
    xyz_to_lab(x, y, z)
}

/// Convert a CIELab color back to sRGB, rounding to the nearest integer
/// channel values. Out-of-gamut results clamp to 0..255.
pub fn lab_to_srgb(lab: Lab) -> RGB<u8> {
    let (x, y, z) = lab_to_xyz(lab);
    let (r, g, b) = xyz_to_srgb(x, y, z);
    RGB {
        r: r.round().clamp(0.0, 255.0) as u8,
        g: g.round().clamp(0.0, 255.0) as u8,
        b: b.round().clamp(0.0, 255.0) as u8,
    }
}

/// CIE94 squared color difference.
///
/// Asymmetric in its arguments (the weights derive from the first color's
/// chroma), but symmetric in practice for the near-equal pairs the optimizer
/// compares.
pub fn cie94_sq(a: Lab, b: Lab) -> f64 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;

    let c1 = (a.a * a.a + a.b * a.b).sqrt();
    let c2 = (b.a * b.a + b.b * b.b).sqrt();
    let dc = c1 - c2;

    let dh_sq = (da * da + db * db - dc * dc).max(0.0);

    let sc = 1.0 + 0.045 * c1;
    let sh = 1.0 + 0.015 * c1;

    dl * dl + (dc / sc) * (dc / sc) + dh_sq / (sh * sh)
}

/// CIEDE2000 squared color difference.
#[inline]
pub fn ciede2000_sq(a: Lab, b: Lab) -> f64 {
    ciede2000_impl(a, b)
}

/// CIEDE2000 color difference (unsquared), mainly for reporting and for
/// checking against the published reference pairs.
pub fn ciede2000(a: Lab, b: Lab) -> f64 {
    ciede2000_impl(a, b).sqrt()
}

// Translated from the Matlab code accompanying "The CIEDE2000 Color-Difference
// Formula: Implementation Notes, Supplementary Test Data, and Mathematical
// Observations", G. Sharma, W. Wu, E. N. Dalal, Color Research and
// Application, vol. 30, no. 1, pp. 21-30, February 2005.
fn ciede2000_impl(std: Lab, sample: Lab) -> f64 {
    let c_std = (std.a * std.a + std.b * std.b).sqrt();
    let c_sample = (sample.a * sample.a + sample.b * sample.b).sqrt();
    let c_mean = (c_std + c_sample) / 2.0;

    let g = 0.5 * (1.0 - (c_mean.powi(7) / (c_mean.powi(7) + 25.0f64.powi(7))).sqrt());

    let ap_std = (1.0 + g) * std.a;
    let ap_sample = (1.0 + g) * sample.a;
    let cp_std = (ap_std * ap_std + std.b * std.b).sqrt();
    let cp_sample = (ap_sample * ap_sample + sample.b * sample.b).sqrt();
    let cp_prod = cp_std * cp_sample;

    // Hues in [0, 2π); exactly zero when the a'/b pair vanishes.
    let hue = |bv: f64, apv: f64| {
        if bv == 0.0 && apv == 0.0 {
            return 0.0;
        }
        let mut h = bv.atan2(apv);
        while h < 0.0 {
            h += 2.0 * PI;
        }
        if apv.abs() + bv.abs() == 0.0 {
            h = 0.0;
        }
        h
    };
    let hp_std = hue(std.b, ap_std);
    let hp_sample = hue(sample.b, ap_sample);

    let dl = sample.l - std.l;
    let dc = cp_sample - cp_std;

    // Signed hue difference, wrapped into (-π, π]; zero when either chroma is.
    let dhp = if cp_prod == 0.0 {
        0.0
    } else {
        let mut d = hp_sample - hp_std;
        if d > PI {
            d -= 2.0 * PI;
        }
        if d < -PI {
            d += 2.0 * PI;
        }
        d
    };

    let dh = 2.0 * cp_prod.sqrt() * (dhp / 2.0).sin();

    let lp = (sample.l + std.l) / 2.0;
    let cp = (cp_std + cp_sample) / 2.0;

    // Mean hue, wraparound-aware.
    let mut hp = (hp_std + hp_sample) / 2.0;
    if (hp_std - hp_sample).abs() > PI {
        hp -= PI;
    }
    while hp < 0.0 {
        hp += 2.0 * PI;
    }
    if cp_prod == 0.0 {
        hp = hp_sample + hp_std;
    }

    let lpm50_sq = (lp - 50.0) * (lp - 50.0);
    let sl = 1.0 + 0.015 * lpm50_sq / (20.0 + lpm50_sq).sqrt();
    let sc = 1.0 + 0.045 * cp;
    let t = 1.0 - 0.17 * (hp - PI / 6.0).cos() + 0.24 * (2.0 * hp).cos()
        + 0.32 * (3.0 * hp + PI / 30.0).cos()
        - 0.20 * (4.0 * hp - 63.0 * PI / 180.0).cos();
    let sh = 1.0 + 0.015 * cp * t;

    // Hung-Berns rotation term for the blue region.
    let dtheta = (30.0 * PI / 180.0) * (-(((180.0 / PI * hp - 275.0) / 25.0).powi(2))).exp();
    let rc = 2.0 * (cp.powi(7) / (cp.powi(7) + 25.0f64.powi(7))).sqrt();
    let rt = -(2.0 * dtheta).sin() * rc;

    let dl_term = dl / sl;
    let dc_term = dc / sc;
    let dh_term = dh / sh;

    dl_term * dl_term + dc_term * dc_term + dh_term * dh_term + rt * dc_term * dh_term
}
