use crate::colorimetry::darker;
use crate::config::ShirtConfig;
use crate::error::Error;
use crate::raster::compose::{paste_non_white, to_transparent};
use crate::raster::contours::{contours_of, fill, fill_mask, find_external, polyline, stroke};
use crate::raster::{blank, crop, extent, first_pixel, mask_where, replace_color, BLACK, TEMP_WHITE};
use crate::shapes::{Contour, Point, Rect};
use crate::styling::{NeckSeam, StyledFace};
use anyhow::Result;
use image::{Rgb, RgbImage, RgbaImage};
use tracing::{debug, span, Level};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

const PEC_LIGHTER_GRAY: Rgb<u8> = Rgb([204, 204, 204]);
const PEC_DARKER_GRAY: Rgb<u8> = Rgb([179, 179, 179]);

/// Templates the jersey and crest are drawn from.
pub struct ShirtParts {
    /// Black outlines, red neck, green crest anchor pixel.
    pub jersey: RgbImage,
    /// Red and blue areas take the first and second club colors.
    pub pattern: RgbImage,
    /// Blue marks the lighter shading, red the darker one.
    pub pectoral: RgbImage,
    pub crest_shape: RgbImage,
    pub crest_pattern: RgbImage,
    pub crest_content: RgbImage,
}

#[derive(Debug, Clone, Copy)]
pub struct ClubColors {
    pub first: Rgb<u8>,
    pub second: Rgb<u8>,
}

#[derive(Debug)]
pub struct ShirtLayers {
    pub shirt: RgbaImage,
    pub crest: RgbaImage,
}

/// Face and placement data coming out of parsing and styling.
pub struct ShirtFace<'a> {
    pub styled: &'a StyledFace,
    pub contours: &'a RgbImage,
    pub bottom_y: i32,
    pub skin: Rgb<u8>,
}

pub struct ShirtCompositor {
    config: ShirtConfig,
}

fn marker(img: &RgbImage, color: Rgb<u8>, what: &str) -> Result<Point> {
    first_pixel(img, color).ok_or_else(|| Error::render(what, "marker pixel not found").into())
}

fn build_jersey(parts: &ShirtParts, colors: ClubColors) -> (RgbImage, Vec<Contour>, Vec<Contour>) {
    let (w, h) = parts.jersey.dimensions();
    let outlines = contours_of(&parts.jersey, BLACK);
    let neck = contours_of(&parts.jersey, RED);

    let mut jersey = blank(w, h);
    fill(&mut jersey, &outlines, TEMP_WHITE);
    fill(&mut jersey, &contours_of(&parts.pattern, RED), colors.first);
    fill(&mut jersey, &contours_of(&parts.pattern, BLUE), colors.second);

    (jersey, outlines, neck)
}

/// Crest with its content and emblem, and the crest's center marker.
fn build_crest(parts: &ShirtParts, colors: ClubColors) -> Result<(RgbImage, Point)> {
    let center = marker(&parts.crest_shape, RED, "crest shape")?;
    let emblem_center = marker(&parts.crest_pattern, RED, "crest pattern")?;

    let (w, h) = parts.crest_shape.dimensions();
    let shape = contours_of(&parts.crest_shape, BLACK);
    let mut crest = blank(w, h);
    fill(&mut crest, &shape, TEMP_WHITE);
    stroke(&mut crest, &shape, BLACK, 2);

    let mut content = parts.crest_content.clone();
    replace_color(&mut content, RED, colors.first);
    replace_color(&mut content, BLUE, colors.second);
    paste_non_white(&mut crest, &content, 0, 0);

    let (ew, eh) = parts.crest_pattern.dimensions();
    let emblem_contours = contours_of(&parts.crest_pattern, BLACK);
    let mut emblem = blank(ew, eh);
    fill(&mut emblem, &emblem_contours, colors.first);
    stroke(&mut emblem, &emblem_contours, BLACK, 1);
    paste_non_white(
        &mut crest,
        &emblem,
        (center.x - emblem_center.x) as i64,
        (center.y - emblem_center.y) as i64,
    );

    Ok((crest, center))
}

/// Darkens the club colors under the pectoral marks, and grays the rest.
fn shade_pectorals(jersey: &mut RgbImage, pectoral: &RgbImage, colors: ClubColors, config: &ShirtConfig) {
    let marks = [
        (BLUE, config.pec_dark, PEC_LIGHTER_GRAY),
        (RED, config.pec_darker, PEC_DARKER_GRAY),
    ];

    for (mark, value, gray) in marks {
        let first = darker(colors.first, value);
        let second = darker(colors.second, value);
        for (x, y, p) in pectoral.enumerate_pixels() {
            if *p != mark || x >= jersey.width() || y >= jersey.height() {
                continue;
            }
            let under = jersey.get_pixel_mut(x, y);
            if *under == colors.first {
                *under = first;
            } else if *under == colors.second {
                *under = second;
            } else if under.0.iter().all(|&c| c != 0) {
                *under = gray;
            }
        }
    }
}

/// Grows the face downward with a neck strip of `gap` rows under the seam.
fn extend_neck(face: &RgbImage, seam: &NeckSeam, gap: i32) -> RgbImage {
    let mut extended = blank(face.width(), face.height() + gap as u32);

    let first = seam.second_point;
    let second = seam.third_point;
    let third = first.offset(0, gap - 1);
    let fourth = second.offset(0, gap - 1);

    let strip = Contour::new(vec![first, third, fourth, second]);
    fill(&mut extended, std::slice::from_ref(&strip), seam.color);
    polyline(&mut extended, &[first, third], false, BLACK, 2);
    polyline(&mut extended, &[second, fourth], false, BLACK, 2);

    paste_non_white(&mut extended, face, 0, 0);
    extended
}

impl ShirtCompositor {
    pub fn new(config: ShirtConfig) -> ShirtCompositor {
        ShirtCompositor { config }
    }

    pub fn compose(&self, parts: &ShirtParts, colors: ClubColors, face: &ShirtFace) -> Result<ShirtLayers> {
        let span = span!(Level::DEBUG, "shirt_styling");
        let _guard = span.enter();

        let styled = face.styled;
        let neck = styled.neck;

        let (mut jersey, outlines, neck_contours) = build_jersey(parts, colors);
        let (crest, crest_center) = build_crest(parts, colors)?;
        let anchor = marker(&parts.jersey, GREEN, "jersey crest anchor")?;
        paste_non_white(
            &mut jersey,
            &crest,
            (anchor.x - crest_center.x) as i64,
            (anchor.y - crest_center.y) as i64,
        );

        shade_pectorals(&mut jersey, &parts.pectoral, colors, &self.config);
        stroke(&mut jersey, &outlines, BLACK, 2);
        fill(&mut jersey, &neck_contours, neck.color);

        let collar_left = match self.config.collar_left {
            Some(x) => x,
            None => extent(&parts.jersey, RED)
                .map(|r| r.left)
                .ok_or_else(|| Error::render("jersey", "no neck marker"))?,
        };
        let face_left = extent(&styled.face, neck.color)
            .map(|r| r.left)
            .ok_or_else(|| Error::render("face", "no neck on the styled face"))?;
        let face_x = (collar_left - face_left) as i64;

        let width = jersey.width();
        let height = jersey.height() + face.bottom_y.max(0) as u32;
        let bottom_y = face.bottom_y as i64;

        let mut trial = blank(width, height);
        paste_non_white(&mut trial, &styled.face, face_x, 0);
        paste_non_white(&mut trial, &jersey, 0, bottom_y);
        let (Some(neck_extent), Some(skin_extent)) = (extent(&trial, neck.color), extent(&trial, face.skin)) else {
            return Err(Error::render("shirt", "neck or skin missing after placement").into());
        };
        let gap = self.config.default_neck_height - (neck_extent.bottom - skin_extent.bottom);
        debug!("Neck gap of {gap}px");

        let drawn_face = if gap > 0 {
            extend_neck(&styled.face, &neck, gap)
        } else {
            styled.face.clone()
        };

        let mut canvas = blank(width, height);
        paste_non_white(&mut canvas, &drawn_face, face_x, 0);
        if let Some(beard) = &styled.beard {
            paste_non_white(&mut canvas, beard, face_x, 0);
        }
        paste_non_white(&mut canvas, &jersey, 0, bottom_y + gap as i64);
        if let Some(hair) = &styled.hair {
            paste_non_white(&mut canvas, hair, face_x, 0);
        }

        // neck color inside the face outline goes back to skin
        let mut outline = blank(width, height);
        paste_non_white(&mut outline, face.contours, face_x, 0);
        let inside = fill_mask(&find_external(&mask_where(&outline, BLACK)), width, height);
        for (x, y, m) in inside.enumerate_pixels() {
            if m[0] > 0 && *canvas.get_pixel(x, y) == neck.color {
                canvas.put_pixel(x, y, face.skin);
            }
        }
        paste_non_white(&mut canvas, face.contours, face_x, 0);

        if gap < 0 {
            let rows = (height as i32 + gap).max(0);
            canvas = crop(&canvas, Rect::new(0, 0, width as i32, rows));
        }

        Ok(ShirtLayers {
            shirt: to_transparent(&canvas),
            crest: to_transparent(&crest),
        })
    }
}
