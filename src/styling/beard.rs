use super::{Executable, RenderContext, StepRegions};
use crate::colorimetry::{delta_e, mean};
use crate::raster::contours::{by_area, contours_of, fill, fill_mask, polyline, remove_small, stroke};
use crate::raster::quantize::median_cut;
use crate::raster::{
    dominant_color, extent, mask_subtract, masked_on_white, replace_color, unique_colors, BLACK, MASK_ON, NEAR_BLACK,
    TEMP_WHITE, WHITE,
};
use crate::shapes::Point;
use anyhow::Result;
use image::RgbImage;
use tracing::debug;

const SAMPLE_COLORS: usize = 200;
const SIDEBURN_WIDTH: i32 = 100;
const SIDEBURN_REACH: i32 = 150;

#[derive(Debug, Clone, Copy)]
pub struct Beard;

/// Whether the lower face holds a color far enough from the skin and close
/// enough to the pilosity color to be a beard. `distances` are the ΔE of
/// every sampled color to the pilosity color.
pub fn beard_decision(distances: &[u32], min_average: u32, max_ratio: f64) -> bool {
    let values: Vec<f64> = distances.iter().map(|d| *d as f64).collect();
    let (Some(average), Some(closest)) = (mean(&values), distances.iter().min()) else {
        return false;
    };
    let average = average.floor() as u32;

    average >= min_average && average > 0 && (*closest as f64 * 100. / average as f64) < max_ratio
}

impl Executable for Beard {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let ear = regions.dependency()?;
        let Some(ears) = extent(&ear.mask, MASK_ON) else {
            debug!("No ears to anchor a beard");
            return Ok(());
        };
        let top = ears.top;
        let max_y = top + (ears.bottom - top) / 2;

        let mut face = ctx.cleaned.clone();
        for y in 0..(top.max(0) as u32).min(face.height()) {
            for x in 0..face.width() {
                if *face.get_pixel(x, y) == BLACK {
                    face.put_pixel(x, y, WHITE);
                }
            }
        }

        let (w, h) = face.dimensions();
        let lower_face = mask_subtract(
            &fill_mask(&contours_of(&face, BLACK), w, h),
            &fill_mask(&contours_of(&face, TEMP_WHITE), w, h),
        );
        let sample = masked_on_white(ctx.photo, &lower_face);

        let pilosity = if ctx.no_hair { &ctx.real_brow } else { &ctx.real_hair };
        let Some(pilosity) = pilosity.as_ref().and_then(dominant_color) else {
            debug!("No pilosity sample to compare against");
            return Ok(());
        };

        let distances: Vec<u32> = unique_colors(&median_cut(&sample, SAMPLE_COLORS))
            .into_iter()
            .map(|(c, _)| delta_e(c, pilosity) as u32)
            .collect();

        let settings = ctx.settings;
        if !beard_decision(&distances, settings.beard_min_average, settings.beard_max_ratio) {
            debug!("No beard detected");
            return Ok(());
        }

        ctx.beard_layer = self.layer(ctx, &sample, &face, top, max_y);
        Ok(())
    }
}

impl Beard {
    fn layer(&self, ctx: &RenderContext, sample: &RgbImage, face: &RgbImage, top: i32, max_y: i32) -> Option<RgbImage> {
        let min_area = ctx.settings.beard_min_area;
        let mut beard = median_cut(sample, 3);

        let mut colors = unique_colors(&beard);
        colors.pop();
        let (hair_color, _) = *colors.first()?;
        let (skin_color, _) = *colors.last()?;

        remove_small(&mut beard, skin_color, BLACK, min_area, None);
        replace_color(&mut beard, skin_color, WHITE);
        remove_small(&mut beard, hair_color, WHITE, min_area, Some(max_y));
        replace_color(&mut beard, hair_color, BLACK);

        // sideburns
        let row: Vec<i32> = (0..face.width())
            .filter(|&x| top >= 0 && (top as u32) < face.height() && *face.get_pixel(x, top as u32) == BLACK)
            .map(|x| x as i32)
            .collect();
        if let (Some(&min_x), Some(&max_x)) = (row.first(), row.last()) {
            for (x, dir) in [(min_x, 1), (max_x, -1)] {
                let cut = [
                    Point::new(x, top),
                    Point::new(x + dir * SIDEBURN_WIDTH, top),
                    Point::new(x + dir * SIDEBURN_REACH, top + SIDEBURN_REACH),
                ];
                polyline(&mut beard, &cut, true, NEAR_BLACK, 1);
                let outline = contours_of(&beard, NEAR_BLACK);
                fill(&mut beard, &outline, WHITE);
            }
        }

        let contours = contours_of(&beard, BLACK);
        replace_color(&mut beard, BLACK, ctx.palette.hair);
        stroke(&mut beard, &contours, BLACK, 1);

        let holes: Vec<_> = by_area(&beard, WHITE).into_iter().skip(1).map(|(c, _)| c).collect();
        stroke(&mut beard, &holes, BLACK, 1);

        Some(beard)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{square_region, Fixture};
    use super::*;
    use crate::pipeline::landmarks::LandmarkSet;
    use crate::pipeline::parsing::RegionName;
    use crate::raster::count_color;
    use image::Rgb;

    #[test]
    fn test_beard_decision() {
        // far from the skin with one sample right on the pilosity color
        assert!(beard_decision(&[30, 30, 30, 0], 20, 5.0));
        assert!(beard_decision(&[40, 30, 1, 33], 20, 5.0));
        // too close on average
        assert!(!beard_decision(&[10, 10, 10], 20, 5.0));
        // nothing close to the pilosity color
        assert!(!beard_decision(&[30, 25, 20], 20, 5.0));
        assert!(!beard_decision(&[], 20, 5.0));
    }

    /// Face with dark pixels in its lower half and a matching hair sample.
    fn bearded(fixture: &mut Fixture) {
        let dark = Rgb([30, 20, 10]);
        let skin = Rgb([220, 180, 150]);
        fixture.photo = RgbImage::from_fn(100, 100, |_, y| if y >= 60 { dark } else { skin });
    }

    #[test]
    fn test_beard_layer_drawn() {
        let mut fixture = Fixture::new(100, LandmarkSet::new(vec![]));
        bearded(&mut fixture);
        let mut ctx = fixture.context(RgbImage::from_pixel(100, 100, BLACK));
        ctx.real_hair = Some(RgbImage::from_fn(10, 10, |x, _| {
            if x < 6 { Rgb([30, 20, 10]) } else { WHITE }
        }));

        let ear = square_region(RegionName::Ear, 0, 30, 4, 50, 100);
        let own = square_region(RegionName::Beard, 0, 0, 0, 0, 100);
        Beard
            .execute(&mut ctx, &StepRegions { region: &own, depends_on: Some(&ear) })
            .unwrap();

        let layer = ctx.beard_layer.expect("beard layer");
        assert!(count_color(&layer, fixture.palette.hair) > 0);
        assert_eq!(*layer.get_pixel(50, 40), WHITE);
    }

    #[test]
    fn test_no_beard_on_clean_face() {
        let fixture = Fixture::new(100, LandmarkSet::new(vec![]));
        let mut ctx = fixture.context(RgbImage::from_pixel(100, 100, BLACK));
        ctx.real_hair = Some(RgbImage::from_pixel(10, 10, Rgb([30, 20, 10])));
        ctx.real_hair.as_mut().unwrap().put_pixel(0, 0, WHITE);

        let ear = square_region(RegionName::Ear, 0, 30, 4, 50, 100);
        let own = square_region(RegionName::Beard, 0, 0, 0, 0, 100);
        Beard
            .execute(&mut ctx, &StepRegions { region: &own, depends_on: Some(&ear) })
            .unwrap();

        assert!(ctx.beard_layer.is_none());
    }

    #[test]
    fn test_brow_stands_in_without_hair() {
        let mut fixture = Fixture::new(100, LandmarkSet::new(vec![]));
        bearded(&mut fixture);
        let mut ctx = fixture.context(RgbImage::from_pixel(100, 100, BLACK));
        ctx.no_hair = true;

        let ear = square_region(RegionName::Ear, 0, 30, 4, 50, 100);
        let own = square_region(RegionName::Beard, 0, 0, 0, 0, 100);
        Beard
            .execute(&mut ctx, &StepRegions { region: &own, depends_on: Some(&ear) })
            .unwrap();
        // no brow sample either
        assert!(ctx.beard_layer.is_none());

        ctx.real_brow = Some(RgbImage::from_fn(10, 10, |x, _| {
            if x < 6 { Rgb([30, 20, 10]) } else { WHITE }
        }));
        Beard
            .execute(&mut ctx, &StepRegions { region: &own, depends_on: Some(&ear) })
            .unwrap();
        assert!(ctx.beard_layer.is_some());
    }
}
