use crate::shapes::{Point, Rect};
use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use std::collections::BTreeMap;

pub mod compose;
pub mod contours;
pub mod gradient;
pub mod quantize;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
/// Placeholder white that survives white-as-transparent pasting.
pub const TEMP_WHITE: Rgb<u8> = Rgb([254, 254, 254]);
/// Placeholder black that is never confused with outlines.
pub const NEAR_BLACK: Rgb<u8> = Rgb([1, 1, 1]);

pub const MASK_ON: Luma<u8> = Luma([255]);

pub fn blank(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}

pub fn mask_where<P>(img: &ImageBuffer<P, Vec<u8>>, color: P) -> GrayImage
where
    P: Pixel<Subpixel = u8> + PartialEq,
{
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if *img.get_pixel(x, y) == color {
            MASK_ON
        } else {
            Luma([0])
        }
    })
}

pub fn replace_color<P>(img: &mut ImageBuffer<P, Vec<u8>>, from: P, to: P)
where
    P: Pixel<Subpixel = u8> + PartialEq,
{
    for p in img.pixels_mut() {
        if *p == from {
            *p = to;
        }
    }
}

pub fn replace_where(img: &mut RgbImage, mask: &GrayImage, color: Rgb<u8>) {
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] > 0 && x < img.width() && y < img.height() {
            img.put_pixel(x, y, color);
        }
    }
}

pub fn count_color(img: &RgbImage, color: Rgb<u8>) -> usize {
    img.pixels().filter(|p| **p == color).count()
}

pub fn count_mask(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

pub fn points_of<P>(img: &ImageBuffer<P, Vec<u8>>, color: P) -> Vec<Point>
where
    P: Pixel<Subpixel = u8> + PartialEq,
{
    img.enumerate_pixels()
        .filter(|(_, _, p)| **p == color)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect()
}

/// Bounding box of the pixels carrying `color`. The max row and column are
/// reported as `bottom` and `right`, so cropping to the result leaves them out.
pub fn extent<P>(img: &ImageBuffer<P, Vec<u8>>, color: P) -> Option<Rect>
where
    P: Pixel<Subpixel = u8> + PartialEq,
{
    Rect::bounding(points_of(img, color))
}

/// First pixel of `color` in row-major order.
pub fn first_pixel<P>(img: &ImageBuffer<P, Vec<u8>>, color: P) -> Option<Point>
where
    P: Pixel<Subpixel = u8> + PartialEq,
{
    img.enumerate_pixels()
        .find(|(_, _, p)| **p == color)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
}

pub fn crop<P>(img: &ImageBuffer<P, Vec<u8>>, bounds: Rect) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let left = bounds.left.clamp(0, img.width() as i32) as u32;
    let top = bounds.top.clamp(0, img.height() as i32) as u32;
    let right = bounds.right.clamp(0, img.width() as i32) as u32;
    let bottom = bounds.bottom.clamp(0, img.height() as i32) as u32;

    image::imageops::crop_imm(
        img,
        left,
        top,
        right.saturating_sub(left),
        bottom.saturating_sub(top),
    )
    .to_image()
}

/// Places `img` on a white canvas of `width` x `height` at (`x`, `y`).
pub fn expand(img: &RgbImage, width: u32, height: u32, x: i64, y: i64) -> RgbImage {
    let mut canvas = blank(width, height);
    image::imageops::replace(&mut canvas, img, x, y);
    canvas
}

/// Keeps the pixels of `img` under the mask and whitens the rest. Pure black
/// pixels are whitened as well, matching a masked copy whose black is then
/// treated as background.
pub fn masked_on_white(img: &RgbImage, mask: &GrayImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let inside = x < mask.width() && y < mask.height() && mask.get_pixel(x, y)[0] > 0;
        let p = *img.get_pixel(x, y);
        if inside && p != BLACK { p } else { WHITE }
    })
}

pub fn mask_union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        if a.get_pixel(x, y)[0] > 0 || b.get_pixel(x, y)[0] > 0 {
            MASK_ON
        } else {
            Luma([0])
        }
    })
}

pub fn mask_subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        if a.get_pixel(x, y)[0] > 0 && b.get_pixel(x, y)[0] == 0 {
            MASK_ON
        } else {
            Luma([0])
        }
    })
}

/// Unique colors with their pixel counts, in lexicographic channel order.
pub fn unique_colors(img: &RgbImage) -> Vec<(Rgb<u8>, usize)> {
    let mut counts: BTreeMap<[u8; 3], usize> = BTreeMap::new();
    for p in img.pixels() {
        *counts.entry(p.0).or_default() += 1;
    }
    counts.into_iter().map(|(c, n)| (Rgb(c), n)).collect()
}

/// Most frequent color, leaving out the lexicographically last one, which
/// is the white background of a masked sample.
pub fn dominant_color(img: &RgbImage) -> Option<Rgb<u8>> {
    let mut colors = unique_colors(img);
    colors.pop();
    colors
        .iter()
        .fold(None, |best: Option<(Rgb<u8>, usize)>, (c, n)| match best {
            Some((_, m)) if m >= *n => best,
            _ => Some((*c, *n)),
        })
        .map(|(c, _)| c)
}
