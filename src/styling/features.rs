use super::{Executable, RenderContext, StepRegions};
use crate::colorimetry::darker;
use crate::pipeline::landmarks::indices;
use crate::raster::contours::{aa_polyline, fill, line_contours, stroke, stroke_offset};
use crate::raster::gradient::{depth_colors, triangle};
use crate::raster::{BLACK, NEAR_BLACK, TEMP_WHITE};
use crate::shapes::Point;
use anyhow::Result;

#[derive(Debug, Clone, Copy)]
pub struct Nose;

#[derive(Debug, Clone, Copy)]
pub struct Mouth;

impl Executable for Nose {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let nose = regions.dependency()?;
        let landmarks = ctx.landmarks;
        let skin = ctx.palette.skin;
        let (w, h) = ctx.canvas.dimensions();

        // soften the bottom of the nose
        let bottom = line_contours(&landmarks.points(&indices::DOWN_NOSE)?, false, w, h);
        stroke_offset(&mut ctx.canvas, &bottom, skin, 15, 0, 5);

        let corners: Vec<usize> = indices::NOSE_SHADING.iter().flatten().copied().collect();
        let depths = corners
            .iter()
            .map(|&i| landmarks.get(i).map(|l| l.z))
            .collect::<Result<Vec<f64>>>()?;
        let colors = depth_colors(&depths, skin, darker(skin, ctx.settings.nose_shade));
        for (k, tri) in indices::NOSE_SHADING.iter().enumerate() {
            let vertices = [
                landmarks.point(tri[0])?,
                landmarks.point(tri[1])?,
                landmarks.point(tri[2])?,
            ];
            let shades = [colors[3 * k], colors[3 * k + 1], colors[3 * k + 2]];
            triangle(&mut ctx.canvas, vertices, shades, nose.contours.first());
        }

        aa_polyline(&mut ctx.canvas, &landmarks.points(&indices::NOSE_TIP_LINE)?, false, NEAR_BLACK);

        for nostril in [&indices::LEFT_NOSTRIL, &indices::RIGHT_NOSTRIL] {
            let contours: Vec<_> = line_contours(&landmarks.points(nostril)?, true, w, h)
                .into_iter()
                .filter(|c| c.len() > 1)
                .collect();
            fill(&mut ctx.canvas, &contours, BLACK);
        }

        Ok(())
    }
}

impl Executable for Mouth {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let mouth = regions.dependency()?;
        let landmarks = ctx.landmarks;
        let (w, h) = ctx.canvas.dimensions();

        stroke(&mut ctx.canvas, &mouth.contours, ctx.palette.skin, 10);
        fill(&mut ctx.canvas, &mouth.contours, ctx.palette.mouth);

        let inner = line_contours(&landmarks.points(&indices::INTERN_MOUTH)?, true, w, h);
        fill(&mut ctx.canvas, &inner, TEMP_WHITE);

        for &(a, b) in indices::LIPS.iter() {
            let segment: [Point; 2] = [landmarks.point(a)?, landmarks.point(b)?];
            aa_polyline(&mut ctx.canvas, &segment, false, BLACK);
        }

        Ok(())
    }
}
