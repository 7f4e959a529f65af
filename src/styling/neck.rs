use super::{Executable, NeckSeam, RenderContext, StepRegions};
use crate::colorimetry::darker;
use crate::error::Error;
use crate::pipeline::landmarks::indices::{LEFT_NECK, RIGHT_NECK};
use crate::raster::compose::paste_non_white;
use crate::raster::contours::{fill, polyline};
use crate::raster::{blank, crop, extent, BLACK};
use crate::shapes::{Contour, Point, Rect};
use anyhow::Result;
use image::{Rgb, RgbImage};

#[derive(Debug, Clone, Copy)]
pub struct Neck;

fn lowest_in_column(img: &RgbImage, x: i32, color: Rgb<u8>) -> Option<i32> {
    if x < 0 || x as u32 >= img.width() {
        return None;
    }
    (0..img.height())
        .rev()
        .find(|&y| *img.get_pixel(x as u32, y) == color)
        .map(|y| y as i32)
}

impl Executable for Neck {
    /// Extends the face with a neck between the jaw landmarks, reaching
    /// `neck_margin` pixels below the lowest skin pixel.
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let skin = ctx.palette.skin;
        let a = ctx.landmarks.point(LEFT_NECK)?.x;
        let b = ctx.landmarks.point(RIGHT_NECK)?.x;
        let (left_x, right_x) = (a.min(b), a.max(b));

        let missing = |x| Error::render(regions.region.name, format!("no skin in column {x}"));
        let left_y = lowest_in_column(&ctx.canvas, left_x, skin).ok_or_else(|| missing(left_x))?;
        let right_y = lowest_in_column(&ctx.canvas, right_x, skin).ok_or_else(|| missing(right_x))?;
        let seam = left_y.min(right_y);

        let lowest_skin = extent(&ctx.canvas, skin)
            .map(|r| r.bottom)
            .ok_or_else(|| Error::render(regions.region.name, "no skin on the face"))?;
        let bottom = lowest_skin + ctx.settings.neck_margin;

        let (w, h) = ctx.canvas.dimensions();
        let mut neck = blank(w, h.max(bottom as u32 + 1));

        let color = darker(skin, ctx.settings.neck_shade);
        let body = Contour::new(vec![
            Point::new(left_x, seam),
            Point::new(left_x, bottom),
            Point::new(right_x, bottom),
            Point::new(right_x, seam),
        ]);
        fill(&mut neck, std::slice::from_ref(&body), color);
        polyline(&mut neck, &[Point::new(left_x, seam), Point::new(left_x, bottom)], false, BLACK, 2);
        polyline(&mut neck, &[Point::new(right_x, seam), Point::new(right_x, bottom)], false, BLACK, 2);

        paste_non_white(&mut neck, &ctx.canvas, 0, 0);
        ctx.canvas = crop(&neck, Rect::new(0, 0, w as i32, bottom));
        ctx.neck = Some(NeckSeam {
            second_point: Point::new(left_x, bottom),
            third_point: Point::new(right_x, bottom),
            color,
        });

        Ok(())
    }
}
