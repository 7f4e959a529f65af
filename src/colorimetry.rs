use crate::error::Error;
use anyhow::Result;
use image::Rgb;

/// HSL with hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shade {
    Darker,
    Lighter,
}

pub fn hex_to_rgb(hex: &str) -> Result<Rgb<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Err(Error::Config(format!("invalid hex color {hex:?}")).into());
    }

    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map_err(|_| Error::Config(format!("invalid hex color {hex:?}")))
    };

    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

pub fn rgb_to_hsl(color: Rgb<u8>) -> Hsl {
    let [r, g, b] = color.0.map(|c| c as f64 / 255.);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.;
    let d = max - min;

    if d == 0. {
        return Hsl {
            h: 0.,
            s: 0.,
            l: l * 100.,
        };
    }

    let s = if l > 0.5 {
        d / (2. - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6. } else { 0. }
    } else if max == g {
        (b - r) / d + 2.
    } else {
        (r - g) / d + 4.
    };

    Hsl {
        h: h * 60.,
        s: s * 100.,
        l: l * 100.,
    }
}

pub fn hsl_to_rgb(hsl: Hsl) -> Rgb<u8> {
    let h = hsl.h.rem_euclid(360.) / 360.;
    let s = (hsl.s / 100.).clamp(0., 1.);
    let l = (hsl.l / 100.).clamp(0., 1.);

    if s == 0. {
        let v = (l * 255.).round() as u8;
        return Rgb([v, v, v]);
    }

    let q = if l < 0.5 { l * (1. + s) } else { l + s - l * s };
    let p = 2. * l - q;
    let channel = |t: f64| {
        let t = t.rem_euclid(1.);
        let v = if t < 1. / 6. {
            p + (q - p) * 6. * t
        } else if t < 0.5 {
            q
        } else if t < 2. / 3. {
            p + (q - p) * (2. / 3. - t) * 6.
        } else {
            p
        };
        (v * 255.).round().clamp(0., 255.) as u8
    };

    Rgb([channel(h + 1. / 3.), channel(h), channel(h - 1. / 3.)])
}

/// Moves the lightness of `color` by `value` percent, clamped to [0, 100].
/// HSL components are rounded to integers first.
pub fn shade(color: Rgb<u8>, value: i32, direction: Shade) -> Rgb<u8> {
    let hsl = rgb_to_hsl(color);
    let l = hsl.l.round();
    let v = value as f64;
    let l = match direction {
        Shade::Darker => {
            if l - v > 0. {
                l - v
            } else {
                0.
            }
        }
        Shade::Lighter => {
            if l + v < 100. {
                l + v
            } else {
                100.
            }
        }
    };

    hsl_to_rgb(Hsl {
        h: hsl.h.round(),
        s: hsl.s.round(),
        l,
    })
}

pub fn darker(color: Rgb<u8>, value: i32) -> Rgb<u8> {
    shade(color, value, Shade::Darker)
}

fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// CIE L*a*b* under D65.
pub fn rgb_to_lab(color: Rgb<u8>) -> Lab {
    let [r, g, b] = color.0.map(srgb_to_linear);
    let x = (0.4124564 * r + 0.3575761 * g + 0.1804375 * b) / 0.95047;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = (0.0193339 * r + 0.1191920 * g + 0.9503041 * b) / 1.08883;

    let f = |t: f64| {
        if t > 216. / 24389. {
            t.cbrt()
        } else {
            (24389. / 27. * t + 16.) / 116.
        }
    };
    let (fx, fy, fz) = (f(x), f(y), f(z));

    Lab {
        l: 116. * fy - 16.,
        a: 500. * (fx - fy),
        b: 200. * (fy - fz),
    }
}

/// CIE76 color difference.
pub fn delta_e(a: Rgb<u8>, b: Rgb<u8>) -> f64 {
    let a = rgb_to_lab(a);
    let b = rgb_to_lab(b);
    ((a.l - b.l).powi(2) + (a.a - b.a).powi(2) + (a.b - b.b).powi(2)).sqrt()
}

/// Smaller value as a percentage of the bigger one. Two zeros are equal;
/// a zero bigger value against a negative one is not finite.
pub fn percentage(a: f64, b: f64) -> f64 {
    if a == 0. && b == 0. {
        100.
    } else if a > b {
        b * 100. / a
    } else {
        a * 100. / b
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn lerp(from: Rgb<u8>, to: Rgb<u8>, t: f64) -> Rgb<u8> {
    let mut out = [0u8; 3];
    for c in 0..3 {
        out[c] = (from[c] as f64 + (to[c] as f64 - from[c] as f64) * t)
            .round()
            .clamp(0., 255.) as u8;
    }
    Rgb(out)
}

/// `count` evenly spaced colors from `from` to `to`, both included.
pub fn steps(from: Rgb<u8>, to: Rgb<u8>, count: usize) -> Vec<Rgb<u8>> {
    match count {
        0 => vec![],
        1 => vec![from],
        _ => (0..count)
            .map(|i| lerp(from, to, i as f64 / (count - 1) as f64))
            .collect(),
    }
}
