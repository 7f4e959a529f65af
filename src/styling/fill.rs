use super::{Executable, RenderContext, StepRegions};
use crate::raster::compose::paste_non_white;
use crate::raster::contours::{fill, stroke};
use crate::raster::{blank, count_color, masked_on_white, replace_color, BLACK, WHITE};
use anyhow::Result;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct Skin;

#[derive(Debug, Clone, Copy)]
pub struct Ear;

#[derive(Debug, Clone, Copy)]
pub struct Brow;

#[derive(Debug, Clone, Copy)]
pub struct Hair;

impl Executable for Skin {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        fill(&mut ctx.canvas, &regions.region.contours, ctx.palette.skin);
        Ok(())
    }
}

impl Executable for Ear {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let contours = &regions.region.contours;
        fill(&mut ctx.canvas, contours, ctx.palette.skin);
        stroke(&mut ctx.canvas, contours, BLACK, 2);
        Ok(())
    }
}

impl Executable for Brow {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let contours = &regions.region.contours;
        fill(&mut ctx.canvas, contours, ctx.palette.hair);
        stroke(&mut ctx.canvas, contours, BLACK, 2);

        ctx.real_brow = Some(masked_on_white(ctx.photo, &regions.region.mask));
        Ok(())
    }
}

impl Executable for Hair {
    /// Draws the hair on the face and on its own layer. Too little hair is
    /// dropped and flagged so the brows stand in for the hair color.
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let contours = &regions.region.contours;
        let hair = ctx.palette.hair;
        let (w, h) = ctx.canvas.dimensions();

        let mut drawn = ctx.canvas.clone();
        fill(&mut drawn, contours, hair);

        let mut layer = blank(w, h);
        fill(&mut layer, contours, hair);
        stroke(&mut layer, contours, BLACK, 1);

        let count = count_color(&drawn, hair);
        if count < ctx.settings.hair_min_pixels {
            debug!("Only {count} hair pixels, drawing without hair");
            replace_color(&mut drawn, hair, WHITE);
            replace_color(&mut layer, hair, WHITE);
            replace_color(&mut layer, BLACK, WHITE);
            ctx.no_hair = true;
        }

        paste_non_white(&mut ctx.canvas, &drawn, 0, 0);
        stroke(&mut ctx.canvas, contours, BLACK, 2);

        ctx.hair_layer = Some(layer);
        ctx.real_hair = Some(masked_on_white(ctx.photo, &regions.region.mask));
        Ok(())
    }
}
