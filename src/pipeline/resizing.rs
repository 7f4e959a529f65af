use super::landmarks::{indices, FaceLandmarker, LandmarkSet, RawLandmarks};
use super::parsing::FaceParser;
use crate::config::ResizingConfig;
use crate::error::Error;
use crate::raster::{blank, crop};
use crate::shapes::Rect;
use anyhow::Result;
use image::imageops::{resize, FilterType};
use image::RgbImage;
use tracing::{debug, span, trace, Level};

/// Pads the shorter axis with white on both sides so the image is square.
/// With an odd difference, one line of the longer axis' neighbor is trimmed
/// first so the padding stays symmetric.
pub fn square(img: &RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == h {
        return img.clone();
    }

    let diff = w.abs_diff(h);
    let (mut width, mut height) = (w, h);
    let pad = if diff % 2 == 1 {
        if h > w {
            width -= 1;
        } else {
            height -= 1;
        }
        (diff + 1) / 2
    } else {
        diff / 2
    };

    let trimmed = crop(img, Rect::from_tl(0, 0, width, height));
    let side = width.max(height);
    let mut canvas = blank(side, side);
    if h > w {
        image::imageops::replace(&mut canvas, &trimmed, pad as i64, 0);
    } else {
        image::imageops::replace(&mut canvas, &trimmed, 0, pad as i64);
    }
    canvas
}

pub struct FaceResizer {
    parsing_width: u32,
    reference: i32,
    tolerance: i32,
    max_iterations: usize,
}

#[derive(Debug)]
pub struct NormalizedFace {
    pub image: RgbImage,
    pub raw: RawLandmarks,
    pub landmarks: LandmarkSet,
}

impl FaceResizer {
    pub fn new(config: &ResizingConfig) -> FaceResizer {
        FaceResizer {
            parsing_width: config.parsing_width,
            reference: config.neck_width_reference,
            tolerance: config.neck_width_tolerance,
            max_iterations: config.max_iterations,
        }
    }

    /// Crops the face to its segmented region and brings it to the parsing
    /// width, squared.
    pub fn resize_for_segmentation(&self, parser: &FaceParser, face: &RgbImage) -> Result<RgbImage> {
        let span = span!(Level::DEBUG, "resize_for_segmentation");
        let _guard = span.enter();

        let cropped = parser.crop_to_face(face)?;
        let (w, h) = cropped.dimensions();
        let resized = if w != self.parsing_width {
            let new_h = (self.parsing_width as u64 * h as u64 / w as u64) as u32;
            resize(&cropped, self.parsing_width, new_h.max(1), FilterType::Lanczos3)
        } else {
            cropped
        };

        Ok(square(&resized))
    }

    /// Rescales the face until the distance between the neck landmarks is
    /// within tolerance of the reference width.
    pub fn normalize_neck_width(&self, landmarker: &FaceLandmarker, face: RgbImage) -> Result<NormalizedFace> {
        let span = span!(Level::DEBUG, "normalize_neck_width");
        let _guard = span.enter();

        let mut image = face;
        let mut raw = landmarker.run(&image)?.ok_or(Error::ResizeLandmarkLoss)?;

        for iteration in 0..self.max_iterations {
            let landmarks = raw.normalize(image.width(), image.height());
            let distance = landmarks.point(indices::RIGHT_NECK)?.x - landmarks.point(indices::LEFT_NECK)?.x;
            trace!("Neck width {distance} at iteration {iteration}");

            if (distance - self.reference).abs() <= self.tolerance {
                return Ok(NormalizedFace {
                    image,
                    raw,
                    landmarks,
                });
            }

            let (w, h) = image.dimensions();
            let new_w = w as i32 + self.reference - distance;
            if new_w <= 0 {
                return Err(Error::Geometry(format!("neck width {distance} cannot be normalized")).into());
            }
            let new_h = (new_w as i64 * h as i64 / w as i64).max(1) as u32;

            image = square(&resize(&image, new_w as u32, new_h, FilterType::Lanczos3));
            raw = landmarker.run(&image)?.ok_or(Error::ResizeLandmarkLoss)?;
        }

        debug!("Neck width did not settle after {} iterations", self.max_iterations);
        Err(Error::ResizeLandmarkLoss.into())
    }
}
