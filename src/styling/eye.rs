use super::{Executable, RenderContext, StepRegions};
use crate::colorimetry::darker;
use crate::error::Error;
use crate::pipeline::landmarks::indices;
use crate::raster::compose::{overlay, paste_non_white};
use crate::raster::contours::{aa_polyline, aa_stroke, fill, line_contours, stroke_offset};
use crate::raster::gradient::{exclude_outside, fill_missing, line_intersection, triangle};
use crate::raster::{blank, extent, replace_color, BLACK, NEAR_BLACK, TEMP_WHITE, WHITE};
use crate::shapes::Point;
use anyhow::Result;
use image::imageops::{resize, FilterType};
use image::{Rgb, RgbImage, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::f64::consts::PI;
use tracing::trace;

/// Radius and center of the iris texture, in texture pixels.
const IRIS_TEXTURE_RADIUS: f64 = 39.;
const IRIS_TEXTURE_CENTER: (f64, f64) = (151., 151.);
const MARK: Rgb<u8> = Rgb([253, 253, 253]);

/// Vertex triples of the iris gradient fan.
const IRIS_TRIANGLES: [[usize; 3]; 8] = [
    [0, 5, 1],
    [0, 4, 1],
    [1, 6, 2],
    [1, 4, 2],
    [2, 4, 3],
    [2, 3, 7],
    [3, 4, 8],
    [4, 8, 0],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct Eye {
    side: Side,
}

struct EyePoints {
    iris: &'static [usize; 4],
    upper_lid: &'static [usize; 9],
    crease: &'static [usize; 7],
    eyelid: &'static [usize; 16],
    corners: (usize, usize),
}

impl Eye {
    pub fn new(side: Side) -> Eye {
        Eye { side }
    }

    fn points(&self) -> EyePoints {
        match self.side {
            Side::Left => EyePoints {
                iris: &indices::LEFT_EYE_IRIS,
                upper_lid: &indices::LEFT_UP_EYE,
                crease: &indices::LEFT_UP_EYELID,
                eyelid: &indices::LEFT_EYELID,
                corners: (indices::LEFT_EYE_LEFT_POINT, indices::LEFT_EYE_RIGHT_POINT),
            },
            Side::Right => EyePoints {
                iris: &indices::RIGHT_EYE_IRIS,
                upper_lid: &indices::RIGHT_UP_EYE,
                crease: &indices::RIGHT_UP_EYELID,
                eyelid: &indices::RIGHT_EYELID,
                corners: (indices::RIGHT_EYE_LEFT_POINT, indices::RIGHT_EYE_RIGHT_POINT),
            },
        }
    }
}

impl Executable for Eye {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        let eye = regions.dependency()?;
        let points = self.points();
        let landmarks = ctx.landmarks;
        let (w, h) = ctx.canvas.dimensions();

        let left = landmarks.point(points.corners.0)?;
        let right = landmarks.point(points.corners.1)?;
        let middle_x = left.x + (right.x - left.x) / 2;

        let eyelid = line_contours(&landmarks.points(points.eyelid)?, true, w, h);
        fill(&mut ctx.canvas, &eyelid, ctx.palette.skin);

        let upper_lid = line_contours(&landmarks.points(points.upper_lid)?, false, w, h);
        stroke_offset(&mut ctx.canvas, &upper_lid, NEAR_BLACK, 3, 0, -3);
        aa_polyline(&mut ctx.canvas, &landmarks.points(points.crease)?, false, NEAR_BLACK);

        fill(&mut ctx.canvas, &eye.contours, MARK);
        let bounds = extent(&ctx.canvas, MARK).ok_or_else(|| Error::render(regions.region.name, "empty eye"))?;
        let middle_y = bounds.top + (bounds.bottom - bounds.top) / 2;
        replace_color(&mut ctx.canvas, MARK, TEMP_WHITE);

        let (iris, center) = self.iris(ctx, points.iris, (w, h))?;
        trace!("Iris centered at {center:?}, eye middle ({middle_x}, {middle_y})");

        let mut moved = blank(w, h);
        paste_non_white(&mut moved, &iris, (middle_x - center.x) as i64, (middle_y - center.y) as i64);
        if let Some(contour) = eye.contours.first() {
            exclude_outside(&mut moved, contour, WHITE);
        }
        paste_non_white(&mut ctx.canvas, &moved, 0, 0);

        aa_stroke(&mut ctx.canvas, &eye.contours, NEAR_BLACK);
        Ok(())
    }
}

impl Eye {
    /// Builds the shaded iris on a white layer and returns it with its
    /// center.
    fn iris(&self, ctx: &mut RenderContext, idxs: &[usize; 4], size: (u32, u32)) -> Result<(RgbImage, Point)> {
        let landmarks = ctx.landmarks;
        let [p1, p2, p3, p4] = [
            landmarks.point(idxs[0])?,
            landmarks.point(idxs[1])?,
            landmarks.point(idxs[2])?,
            landmarks.point(idxs[3])?,
        ];

        let center = line_intersection((p1, p3), (p2, p4))?;
        let radius = (p1.distance(p3) as f64).round() as i32 / 2;

        let eyes = ctx.palette.eyes;
        let shade = ctx.settings.eye_shade;
        let dark = *ctx.darker_eyes.get_or_insert_with(|| darker(eyes, shade));

        let offset = (radius as f64 * 0.5) as i32;
        let vertices = [
            (p1, eyes),
            (p2, dark),
            (p3, dark),
            (p4, eyes),
            (center.offset(offset, offset), eyes),
            (Point::new(p1.x, p2.y), dark),
            (Point::new(p3.x, p2.y), dark),
            (Point::new(p3.x, p4.y), dark),
            (Point::new(p1.x, p4.y), eyes),
        ];

        let mut layer = blank(size.0, size.1);
        draw_filled_circle_mut(&mut layer, (center.x, center.y), radius, NEAR_BLACK);
        for [a, b, c] in IRIS_TRIANGLES {
            triangle(
                &mut layer,
                [vertices[a].0, vertices[b].0, vertices[c].0],
                [vertices[a].1, vertices[b].1, vertices[c].1],
                None,
            );
        }
        fill_missing(&mut layer, NEAR_BLACK);

        // clip to the disc
        let r2 = (radius * radius) as i64;
        for (x, y, p) in layer.enumerate_pixels_mut() {
            let dx = x as i64 - center.x as i64;
            let dy = y as i64 - center.y as i64;
            if dx * dx + dy * dy > r2 || *p == BLACK {
                *p = WHITE;
            }
        }
        aa_polyline(&mut layer, &circle(center, radius), true, NEAR_BLACK);

        overlay_texture(&mut layer, ctx.iris, center, radius);
        Ok((layer, center))
    }
}

fn circle(center: Point, radius: i32) -> Vec<Point> {
    let steps = 64;
    (0..steps)
        .map(|i| {
            let t = i as f64 * 2. * PI / steps as f64;
            Point::new(
                center.x + (radius as f64 * t.cos()).round() as i32,
                center.y + (radius as f64 * t.sin()).round() as i32,
            )
        })
        .collect()
}

/// Scales the iris texture so its pupil matches half the iris radius and
/// lays it over the iris.
fn overlay_texture(layer: &mut RgbImage, texture: &RgbaImage, center: Point, radius: i32) {
    let pct = radius as f64 * 0.5 * 100. / IRIS_TEXTURE_RADIUS;
    let width = (pct * texture.width() as f64 / 100.).ceil() as u32;
    let height = (pct * texture.height() as f64 / 100.).ceil() as u32;
    if width == 0 || height == 0 {
        return;
    }

    let cx = (pct * IRIS_TEXTURE_CENTER.0 / 100.).ceil() as i32;
    let cy = (pct * IRIS_TEXTURE_CENTER.1 / 100.).ceil() as i32;
    let scaled = resize(texture, width, height, FilterType::CatmullRom);

    let x = center.x - (width as i32 - cx);
    let y = center.y - (height as i32 - cy);
    overlay(layer, &scaled, x as i64, y as i64);
}
