use super::WHITE;
use crate::colorimetry::steps;
use crate::error::Error;
use crate::shapes::{Contour, Point, PointLocation};
use anyhow::Result;
use image::{Rgb, RgbImage};

pub fn line_intersection(a: (Point, Point), b: (Point, Point)) -> Result<Point> {
    let det = |p: (f64, f64), q: (f64, f64)| p.0 * q.1 - p.1 * q.0;
    let xdiff = ((a.0.x - a.1.x) as f64, (b.0.x - b.1.x) as f64);
    let ydiff = ((a.0.y - a.1.y) as f64, (b.0.y - b.1.y) as f64);

    let div = det(xdiff, ydiff);
    if div == 0. {
        return Err(Error::Geometry("lines do not intersect".to_string()).into());
    }

    let d = (
        det((a.0.x as f64, a.0.y as f64), (a.1.x as f64, a.1.y as f64)),
        det((b.0.x as f64, b.0.y as f64), (b.1.x as f64, b.1.y as f64)),
    );
    let x = det(d, xdiff) / div;
    let y = det(d, ydiff) / div;

    Ok(Point::new(x.round() as i32, y.round() as i32))
}

/// Colors each point by the rank of its depth along a gradient from
/// `lighter` (nearest) to `darker` (farthest).
pub fn depth_colors(depths: &[f64], lighter: Rgb<u8>, darker: Rgb<u8>) -> Vec<Rgb<u8>> {
    let mut levels: Vec<f64> = depths.to_vec();
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup();

    let gradient = steps(lighter, darker, levels.len());
    depths
        .iter()
        .map(|z| {
            let rank = levels.iter().position(|l| l == z).unwrap_or(0);
            gradient[rank]
        })
        .collect()
}

/// Barycentric weights of (x, y) in the triangle, or None when the triangle
/// is degenerate.
fn weights(v: &[Point; 3], x: f64, y: f64) -> Option<[f64; 3]> {
    let (x1, y1) = (v[0].x as f64, v[0].y as f64);
    let (x2, y2) = (v[1].x as f64, v[1].y as f64);
    let (x3, y3) = (v[2].x as f64, v[2].y as f64);

    let det = (y2 - y3) * (x1 - x3) + (x3 - x2) * (y1 - y3);
    if det == 0. {
        return None;
    }

    let w1 = ((y2 - y3) * (x - x3) + (x3 - x2) * (y - y3)) / det;
    let w2 = ((y3 - y1) * (x - x3) + (x1 - x3) * (y - y3)) / det;
    Some([w1, w2, 1. - w1 - w2])
}

/// Rasterizes a triangle whose color blends between its vertex colors.
/// Pixels on the edges are left untouched. When `check` is given and the
/// triangle's box pokes out of it, the box pixels outside `check` are
/// whitened.
pub fn triangle(img: &mut RgbImage, vertices: [Point; 3], colors: [Rgb<u8>; 3], check: Option<&Contour>) {
    let x_left = vertices.iter().map(|p| p.x).min().unwrap_or(0);
    let x_right = vertices.iter().map(|p| p.x).max().unwrap_or(0);
    let y_top = vertices.iter().map(|p| p.y).min().unwrap_or(0);
    let y_bottom = vertices.iter().map(|p| p.y).max().unwrap_or(0);

    // degenerate triangles have no inside to fill
    let filled = weights(&vertices, 0., 0.).is_some();
    for x in x_left..x_right {
        for y in y_top..y_bottom {
            if !filled || x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
                continue;
            }
            let Some(w) = weights(&vertices, x as f64, y as f64) else {
                continue;
            };
            if w.iter().any(|v| *v <= 0.) {
                continue;
            }

            let mut out = [0u8; 3];
            for c in 0..3 {
                let v: f64 = (0..3).map(|i| w[i] * colors[i][c] as f64).sum();
                out[c] = v.clamp(0., 255.) as u8;
            }
            img.put_pixel(x as u32, y as u32, Rgb(out));
        }
    }

    if let Some(check) = check {
        let outside = |p: Point| check.locate(p) == PointLocation::Outside;
        if outside(Point::new(x_left, y_top)) || outside(Point::new(x_right, y_bottom)) {
            for x in x_left.max(0)..x_right.min(img.width() as i32) {
                for y in y_top.max(0)..y_bottom.min(img.height() as i32) {
                    if outside(Point::new(x, y)) {
                        img.put_pixel(x as u32, y as u32, WHITE);
                    }
                }
            }
        }
    }
}

fn fill_pass<'a>(img: &mut RgbImage, missing: Rgb<u8>, pixels: impl Iterator<Item = &'a (u32, u32)>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for &(x, y) in pixels {
        if *img.get_pixel(x, y) != missing {
            continue;
        }

        let mut sum = [0u32; 3];
        let mut n = 0;
        for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if !(nx > 0 && nx < w - 1 && ny > 0 && ny < h - 1) {
                continue;
            }
            let p = *img.get_pixel(nx as u32, ny as u32);
            if p == missing || p == WHITE {
                continue;
            }
            for c in 0..3 {
                sum[c] += p[c] as u32;
            }
            n += 1;
        }

        if n > 0 {
            img.put_pixel(x, y, Rgb(sum.map(|s| (s / n) as u8)));
        }
    }
}

/// Fills pixels of the `missing` color from their 4-neighbors, in a forward
/// then a reverse pass.
pub fn fill_missing(img: &mut RgbImage, missing: Rgb<u8>) {
    let pixels: Vec<(u32, u32)> = img
        .enumerate_pixels()
        .filter(|(_, _, p)| **p == missing)
        .map(|(x, y, _)| (x, y))
        .collect();

    fill_pass(img, missing, pixels.iter());
    fill_pass(img, missing, pixels.iter().rev());
}

/// Whitens the pixels outside `contour`, leaving any pixel that shares a
/// channel value with `exclude`.
pub fn exclude_outside(img: &mut RgbImage, contour: &Contour, exclude: Rgb<u8>) {
    for y in 0..img.height() {
        for x in 0..img.width() {
            let p = *img.get_pixel(x, y);
            let differs = (0..3).all(|c| p[c] != exclude[c]);
            if differs && contour.locate(Point::new(x as i32, y as i32)) == PointLocation::Outside {
                img.put_pixel(x, y, WHITE);
            }
        }
    }
}
