use image::{Rgb, RgbImage};

struct ColorBox {
    pixels: Vec<usize>,
}

impl ColorBox {
    fn range(&self, colors: &[[u8; 3]]) -> (usize, u8) {
        let mut widest = (0, 0u8);
        for c in 0..3 {
            let (min, max) = self
                .pixels
                .iter()
                .fold((u8::MAX, u8::MIN), |(lo, hi), &i| (lo.min(colors[i][c]), hi.max(colors[i][c])));
            let spread = max.saturating_sub(min);
            if spread > widest.1 {
                widest = (c, spread);
            }
        }
        widest
    }

    fn mean(&self, colors: &[[u8; 3]]) -> Rgb<u8> {
        let mut sum = [0u64; 3];
        for &i in &self.pixels {
            for c in 0..3 {
                sum[c] += colors[i][c] as u64;
            }
        }
        let n = self.pixels.len().max(1) as u64;
        Rgb(sum.map(|s| ((s + n / 2) / n) as u8))
    }
}

/// Reduces `img` to at most `max_colors` colors with median cut. Every pixel
/// takes the mean color of the box it falls in.
pub fn median_cut(img: &RgbImage, max_colors: usize) -> RgbImage {
    let colors: Vec<[u8; 3]> = img.pixels().map(|p| p.0).collect();
    if colors.is_empty() || max_colors == 0 {
        return img.clone();
    }

    let mut boxes = vec![ColorBox {
        pixels: (0..colors.len()).collect(),
    }];

    while boxes.len() < max_colors {
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.pixels.len() > 1)
            .map(|(i, b)| (i, b.range(&colors)))
            .filter(|(_, (_, spread))| *spread > 0)
            .max_by_key(|(_, (_, spread))| *spread);

        let Some((idx, (channel, _))) = candidate else {
            break;
        };

        let mut splitting = boxes.swap_remove(idx);
        splitting.pixels.sort_by_key(|&i| colors[i][channel]);
        let mid = splitting.pixels.len() / 2;
        // never split a run of equal values across two boxes
        let pivot = colors[splitting.pixels[mid]][channel];
        let cut = splitting
            .pixels
            .iter()
            .position(|&i| colors[i][channel] == pivot)
            .filter(|&p| p > 0)
            .unwrap_or_else(|| {
                splitting
                    .pixels
                    .iter()
                    .position(|&i| colors[i][channel] > pivot)
                    .unwrap_or(mid)
            });

        let upper = splitting.pixels.split_off(cut);
        boxes.push(splitting);
        boxes.push(ColorBox { pixels: upper });
    }

    let mut out = img.clone();
    let width = img.width() as usize;
    for b in &boxes {
        let mean = b.mean(&colors);
        for &i in &b.pixels {
            out.put_pixel((i % width) as u32, (i / width) as u32, mean);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::unique_colors;

    #[test]
    fn test_median_cut_limits_colors() {
        let img = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 40]));
        let quantized = median_cut(&img, 3);
        assert!(unique_colors(&quantized).len() <= 3);
        assert_eq!(quantized.dimensions(), img.dimensions());
    }

    #[test]
    fn test_median_cut_keeps_few_colors() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        for x in 0..5 {
            img.put_pixel(x, 0, Rgb([10, 20, 30]));
        }
        let quantized = median_cut(&img, 200);
        let colors = unique_colors(&quantized);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].0, Rgb([10, 20, 30]));
        assert_eq!(colors[1].0, Rgb([255, 255, 255]));
    }
}
