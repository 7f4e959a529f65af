use crate::error::Error;
use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate, Interpolation};
use tracing::{span, trace, Level};

/// Rounds to the nearest value representable with an 11-bit significand,
/// the precision eye centers are kept at.
fn half_precision(v: f32) -> f32 {
    if v == 0. || !v.is_finite() {
        return v;
    }
    let step = 2f32.powi(v.abs().log2().floor() as i32 - 10);
    (v / step).round_ties_even() * step
}

pub fn mass_center(points: &[(f32, f32)]) -> Result<(f32, f32)> {
    if points.is_empty() {
        return Err(Error::Geometry("eye points are empty".to_string()).into());
    }
    if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(Error::Geometry("eye points are malformed".to_string()).into());
    }

    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0f32, 0f32), |(ax, ay), (x, y)| (ax + x, ay + y));

    Ok((half_precision(sx / n), half_precision(sy / n)))
}

/// Angle of the line from the left eye center to the right one, in degrees.
pub fn eye_angle(left: (f32, f32), right: (f32, f32)) -> f32 {
    (right.1 - left.1).atan2(right.0 - left.0).to_degrees()
}

/// Rotates the face so the eyes sit on a horizontal line. The rotation
/// pivots on the midpoint between the eyes and keeps the image size.
pub fn align(img: &RgbImage, left_eye: &[(f32, f32)], right_eye: &[(f32, f32)]) -> Result<RgbImage> {
    let span = span!(Level::DEBUG, "face_aligner");
    let _guard = span.enter();

    let left = mass_center(left_eye)?;
    let right = mass_center(right_eye)?;
    let angle = eye_angle(left, right);

    let pivot = (((left.0 + right.0) / 2.).floor(), ((left.1 + right.1) / 2.).floor());
    if !pivot.0.is_finite() || !pivot.1.is_finite() {
        return Err(Error::Geometry(format!("invalid pivot {pivot:?}")).into());
    }
    if img.width() == 0 || img.height() == 0 {
        return Err(Error::Geometry("cannot rotate an empty image".to_string()).into());
    }

    trace!("Rotating by {angle:.2} degrees around {pivot:?}");
    if angle == 0. {
        return Ok(img.clone());
    }

    // positive angles turn counter-clockwise on screen
    Ok(rotate(
        img,
        pivot,
        -angle.to_radians(),
        Interpolation::Bicubic,
        Rgb([0, 0, 0]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mass_center() {
        let center = mass_center(&[(280., 220.), (300., 221.), (298., 223.), (282., 222.)]).unwrap();
        assert_eq!(center, (290., 221.5));
    }

    #[test]
    fn test_half_precision() {
        assert_eq!(half_precision(290.3), 290.25);
        assert_eq!(half_precision(2049.), 2048.);
        assert_eq!(half_precision(0.), 0.);
    }

    #[test]
    fn test_eye_angle() {
        assert_relative_eq!(eye_angle((0., 0.), (10., 10.)), 45.);
        assert_relative_eq!(eye_angle((0., 0.), (10., 0.)), 0.);
    }

    #[test]
    fn test_level_eyes_are_identity() {
        let img = RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8, y as u8, 7]));
        let aligned = align(&img, &[(10., 12.), (12., 12.)], &[(28., 12.), (30., 12.)]).unwrap();
        assert_eq!(aligned, img);
    }

    #[test]
    fn test_rotation_keeps_size() {
        let img = RgbImage::from_pixel(40, 30, Rgb([200, 200, 200]));
        let aligned = align(&img, &[(10., 10.)], &[(30., 16.)]).unwrap();
        assert_eq!(aligned.dimensions(), (40, 30));
        assert_eq!(*aligned.get_pixel(20, 13), Rgb([200, 200, 200]));
    }

    #[test]
    fn test_malformed_points() {
        let img = RgbImage::new(10, 10);
        assert!(align(&img, &[], &[(1., 1.)]).is_err());
        assert!(align(&img, &[(f32::NAN, 1.)], &[(1., 1.)]).is_err());
        assert!(align(&RgbImage::new(0, 0), &[(1., 1.)], &[(3., 1.)]).is_err());
    }
}
