use super::{blank, mask_where, BLACK, MASK_ON};
use crate::shapes::{Contour, Point};
use image::{GrayImage, ImageBuffer, Pixel, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::{
    draw_antialiased_line_segment_mut, draw_filled_circle_mut, draw_line_segment_mut,
    draw_polygon_mut, BresenhamLineIter,
};
use imageproc::pixelops::interpolate;

/// Outermost contours of the non-zero regions of `mask`. Holes and anything
/// nested inside them are ignored.
pub fn find_external(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer)
        .map(|c| Contour::new(c.points.into_iter().map(Point::from).collect()))
        .collect()
}

pub fn contours_of(img: &RgbImage, color: Rgb<u8>) -> Vec<Contour> {
    find_external(&mask_where(img, color))
}

/// Fills the contours, boundary included.
pub fn fill<P>(img: &mut ImageBuffer<P, Vec<u8>>, contours: &[Contour], color: P)
where
    P: Pixel<Subpixel = u8> + 'static,
{
    for contour in contours {
        let ring = contour.ring();
        if ring.len() > 2 {
            draw_polygon_mut(img, &ring, color);
        }
        polyline(img, &contour.points, true, color, 1);
    }
}

pub fn fill_mask(contours: &[Contour], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    fill(&mut mask, contours, MASK_ON);
    mask
}

/// Number of pixels covered by the filled contour.
pub fn area(contour: &Contour) -> usize {
    let Some(bounds) = contour.bounds() else {
        return 0;
    };
    let local = contour.translate(-bounds.left, -bounds.top);
    let mask = fill_mask(&[local], bounds.width() + 1, bounds.height() + 1);
    super::count_mask(&mask)
}

pub fn stroke<P>(img: &mut ImageBuffer<P, Vec<u8>>, contours: &[Contour], color: P, thickness: u32)
where
    P: Pixel<Subpixel = u8> + 'static,
{
    for contour in contours {
        polyline(img, &contour.points, true, color, thickness);
    }
}

pub fn stroke_offset(
    img: &mut RgbImage,
    contours: &[Contour],
    color: Rgb<u8>,
    thickness: u32,
    dx: i32,
    dy: i32,
) {
    for contour in contours {
        polyline(img, &contour.translate(dx, dy).points, true, color, thickness);
    }
}

pub fn polyline<P>(
    img: &mut ImageBuffer<P, Vec<u8>>,
    points: &[Point],
    closed: bool,
    color: P,
    thickness: u32,
) where
    P: Pixel<Subpixel = u8> + 'static,
{
    if points.is_empty() {
        return;
    }
    if points.len() == 1 {
        dot(img, points[0], color, thickness);
        return;
    }

    let mut segments: Vec<(Point, Point)> = points.windows(2).map(|w| (w[0], w[1])).collect();
    if closed && points.len() > 2 {
        segments.push((points[points.len() - 1], points[0]));
    }

    for (a, b) in segments {
        if thickness <= 1 {
            draw_line_segment_mut(img, a.into(), b.into(), color);
        } else {
            for (x, y) in BresenhamLineIter::new(a.into(), b.into()) {
                dot(img, Point::new(x, y), color, thickness);
            }
        }
    }
}

fn dot<P>(img: &mut ImageBuffer<P, Vec<u8>>, p: Point, color: P, thickness: u32)
where
    P: Pixel<Subpixel = u8> + 'static,
{
    if thickness <= 1 {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < img.width() && (p.y as u32) < img.height() {
            img.put_pixel(p.x as u32, p.y as u32, color);
        }
    } else {
        draw_filled_circle_mut(img, p.into(), (thickness / 2) as i32, color);
    }
}

pub fn aa_polyline(img: &mut RgbImage, points: &[Point], closed: bool, color: Rgb<u8>) {
    let mut segments: Vec<(Point, Point)> = points.windows(2).map(|w| (w[0], w[1])).collect();
    if closed && points.len() > 2 {
        segments.push((points[points.len() - 1], points[0]));
    }
    for (a, b) in segments {
        draw_antialiased_line_segment_mut(img, a.into(), b.into(), color, interpolate);
    }
}

pub fn aa_stroke(img: &mut RgbImage, contours: &[Contour], color: Rgb<u8>) {
    for contour in contours {
        aa_polyline(img, &contour.points, true, color);
    }
}

/// Rasterizes a 1px polyline on a blank canvas and returns the outer
/// contours of the stroke.
pub fn line_contours(points: &[Point], closed: bool, width: u32, height: u32) -> Vec<Contour> {
    let mut canvas = blank(width, height);
    polyline(&mut canvas, points, closed, BLACK, 1);
    contours_of(&canvas, BLACK)
}

/// Recolors small blobs of `color`: those whose area is under `under`, or
/// that sit entirely above `max_y` when given.
pub fn remove_small(img: &mut RgbImage, color: Rgb<u8>, replace: Rgb<u8>, under: usize, max_y: Option<i32>) {
    let contours = contours_of(img, color);
    let doomed: Vec<Contour> = contours
        .into_iter()
        .filter(|c| {
            let above = match (max_y, c.max_y()) {
                (Some(limit), Some(y)) => y < limit,
                _ => false,
            };
            above || area(c) < under
        })
        .collect();
    fill(img, &doomed, replace);
}

/// Contours of `color` sorted by area, biggest first.
pub fn by_area(img: &RgbImage, color: Rgb<u8>) -> Vec<(Contour, usize)> {
    let mut contours: Vec<(Contour, usize)> = contours_of(img, color)
        .into_iter()
        .map(|c| {
            let a = area(&c);
            (c, a)
        })
        .collect();
    contours.sort_by(|a, b| b.1.cmp(&a.1));
    contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{count_color, WHITE};

    fn square(img: &mut RgbImage, x0: u32, y0: u32, size: u32, color: Rgb<u8>) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                img.put_pixel(x, y, color);
            }
        }
    }

    #[test]
    fn test_find_external_ignores_holes() {
        let mut img = blank(30, 30);
        square(&mut img, 2, 2, 20, BLACK);
        square(&mut img, 6, 6, 8, WHITE);
        square(&mut img, 8, 8, 3, BLACK);

        let contours = contours_of(&img, BLACK);
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn test_fill_round_trip() {
        let mut img = blank(20, 20);
        square(&mut img, 4, 5, 6, BLACK);
        let contours = contours_of(&img, BLACK);

        let mut redrawn = blank(20, 20);
        fill(&mut redrawn, &contours, BLACK);
        assert_eq!(count_color(&redrawn, BLACK), 36);
        assert_eq!(area(&contours[0]), 36);
    }

    #[test]
    fn test_remove_small() {
        let mut img = blank(40, 40);
        square(&mut img, 1, 1, 2, BLACK);
        square(&mut img, 10, 10, 10, BLACK);

        remove_small(&mut img, BLACK, WHITE, 50, None);
        assert_eq!(count_color(&img, BLACK), 100);

        remove_small(&mut img, BLACK, WHITE, 50, Some(25));
        assert_eq!(count_color(&img, BLACK), 0);
    }

    #[test]
    fn test_by_area() {
        let mut img = blank(40, 40);
        square(&mut img, 1, 1, 3, BLACK);
        square(&mut img, 10, 10, 10, BLACK);

        let sorted = by_area(&img, BLACK);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].1, 100);
        assert_eq!(sorted[1].1, 9);
    }

    #[test]
    fn test_line_contours() {
        let points = [Point::new(2, 2), Point::new(12, 2), Point::new(12, 12)];
        let contours = line_contours(&points, true, 20, 20);
        assert_eq!(contours.len(), 1);
        let mask = fill_mask(&contours, 20, 20);
        assert!(mask.get_pixel(10, 5)[0] > 0);
        assert_eq!(mask.get_pixel(3, 10)[0], 0);
    }
}
