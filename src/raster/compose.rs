use super::WHITE;
use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Copies `src` onto `dst` at (`x`, `y`), treating pure white as transparent.
pub fn paste_non_white(dst: &mut RgbImage, src: &RgbImage, x: i64, y: i64) {
    for (sx, sy, p) in src.enumerate_pixels() {
        if *p == WHITE {
            continue;
        }
        let dx = x + sx as i64;
        let dy = y + sy as i64;
        if dx < 0 || dy < 0 || dx >= dst.width() as i64 || dy >= dst.height() as i64 {
            continue;
        }
        dst.put_pixel(dx as u32, dy as u32, *p);
    }
}

pub fn to_transparent(img: &RgbImage) -> RgbaImage {
    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let Rgb([r, g, b]) = *img.get_pixel(x, y);
        let alpha = if [r, g, b] == WHITE.0 { 0 } else { 255 };
        Rgba([r, g, b, alpha])
    })
}

/// Turns fully opaque white into fully transparent white.
pub fn clear_white(img: &mut RgbaImage) {
    for p in img.pixels_mut() {
        if *p == Rgba([255, 255, 255, 255]) {
            *p = Rgba([255, 255, 255, 0]);
        }
    }
}

/// Pastes `src` onto `dst`, using the alpha of `src` as the blend mask for
/// every channel, alpha included.
pub fn paste_rgba(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64) {
    for (sx, sy, p) in src.enumerate_pixels() {
        let dx = x + sx as i64;
        let dy = y + sy as i64;
        if dx < 0 || dy < 0 || dx >= dst.width() as i64 || dy >= dst.height() as i64 {
            continue;
        }

        let mask = p[3] as u32;
        if mask == 0 {
            continue;
        }
        let under = dst.get_pixel_mut(dx as u32, dy as u32);
        for c in 0..4 {
            under[c] = ((p[c] as u32 * mask + under[c] as u32 * (255 - mask) + 127) / 255) as u8;
        }
    }
}

/// Blends `src` over an opaque `dst` by the source alpha.
pub fn overlay(dst: &mut RgbImage, src: &RgbaImage, x: i64, y: i64) {
    for (sx, sy, p) in src.enumerate_pixels() {
        let dx = x + sx as i64;
        let dy = y + sy as i64;
        if dx < 0 || dy < 0 || dx >= dst.width() as i64 || dy >= dst.height() as i64 {
            continue;
        }

        let alpha = p[3] as u32;
        if alpha == 0 {
            continue;
        }
        let under = dst.get_pixel_mut(dx as u32, dy as u32);
        for c in 0..3 {
            under[c] = ((p[c] as u32 * alpha + under[c] as u32 * (255 - alpha) + 127) / 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paste_non_white() {
        let mut dst = RgbImage::from_pixel(4, 4, Rgb([10, 10, 10]));
        let mut src = RgbImage::from_pixel(2, 2, WHITE);
        src.put_pixel(1, 1, Rgb([1, 2, 3]));

        paste_non_white(&mut dst, &src, 2, 2);
        assert_eq!(*dst.get_pixel(2, 2), Rgb([10, 10, 10]));
        assert_eq!(*dst.get_pixel(3, 3), Rgb([1, 2, 3]));

        paste_non_white(&mut dst, &src, 3, 3);
        assert_eq!(dst.dimensions(), (4, 4));
    }

    #[test]
    fn test_paste_rgba() {
        let mut dst = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        let mut src = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        src.put_pixel(1, 0, Rgba([255, 255, 255, 0]));

        paste_rgba(&mut dst, &src, 0, 0);
        assert_eq!(*dst.get_pixel(0, 0), Rgba([200, 100, 50, 255]));
        assert_eq!(*dst.get_pixel(1, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_overlay_blends_by_alpha() {
        let mut dst = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        let mut src = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        src.put_pixel(1, 0, Rgba([200, 200, 200, 0]));

        overlay(&mut dst, &src, 0, 0);
        assert_eq!(*dst.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*dst.get_pixel(1, 0), Rgb([0, 0, 0]));
    }
}
