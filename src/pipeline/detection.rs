use super::model::Inference;
use super::resizing::square;
use crate::config::DetectionConfig;
use crate::raster::crop;
use crate::shapes::Rect;
use anyhow::Result;
use image::imageops::{resize, FilterType};
use image::RgbImage;
use ndarray::{Array, ArrayD};
use tracing::{error, span, trace, Level};

const MEAN_BGR: [f32; 3] = [104., 177., 123.];

pub struct FaceDetector {
    model: Box<dyn Inference>,
    min_confidence: f32,
    upscale: f32,
    input_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub confidence: f32,
    pub bounds: Rect,
}

impl FaceDetector {
    /*
    SSD face detector (res10 backbone) run through the Inference seam.

    Model Input: 1x3xHxW f32, BGR planes minus the training means
    Model Output: 1x1xNx7 rows of
      [image_id, label, confidence, x1, y1, x2, y2]
    with corners normalized to the input size.

    Boxes get widened by a margin proportional to the source image so the
    crop keeps hair, ears and neck, then squared with white padding.
     */
    pub fn new(model: Box<dyn Inference>, config: &DetectionConfig) -> FaceDetector {
        FaceDetector {
            model,
            min_confidence: config.min_confidence,
            upscale: config.upscale,
            input_size: config.input_size,
        }
    }

    pub fn run(&self, img: &RgbImage, player: &str) -> Result<Vec<RgbImage>> {
        let span = span!(Level::DEBUG, "face_detector");
        let _guard = span.enter();

        let input = self.to_tensor(img);
        let outputs = self.model.infer(input).map_err(|e| {
            error!("Face detection failed for player {player}: {e}");
            e
        })?;

        let Some(output) = outputs.first() else {
            error!("Face detection returned nothing for player {player}");
            return Ok(vec![]);
        };

        let detections = self.extract_results(output, img.width(), img.height());
        trace!("Detected {} faces", detections.len());

        let faces = detections
            .iter()
            .map(|d| square(&crop(img, d.bounds)))
            .collect();

        Ok(order_faces(faces, img.height()))
    }

    fn to_tensor(&self, img: &RgbImage) -> ArrayD<f32> {
        let resized;
        let input = match self.input_size {
            Some(size) if img.dimensions() != (size, size) => {
                resized = resize(img, size, size, FilterType::Triangle);
                &resized
            }
            _ => img,
        };

        let (w, h) = input.dimensions();
        Array::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
            // BGR planes
            let channel = 2 - c;
            input.get_pixel(x as u32, y as u32)[channel] as f32 - MEAN_BGR[c]
        })
        .into_dyn()
    }

    fn extract_results(&self, output: &ArrayD<f32>, width: u32, height: u32) -> Vec<Detection> {
        let values: Vec<f32> = output.iter().copied().collect();
        let margin_h = (height as f32 * self.upscale).ceil() as i32;
        let margin_w = (width as f32 * self.upscale).ceil() as i32;
        let (w, h) = (width as i32, height as i32);

        let mut results: Vec<Detection> = Vec::new();
        for row in values.chunks_exact(7) {
            let confidence = row[2];
            if confidence <= self.min_confidence {
                continue;
            }

            let left = (row[3] * width as f32) as i32;
            let top = (row[4] * height as f32) as i32;
            let right = (row[5] * width as f32) as i32;
            let bottom = (row[6] * height as f32) as i32;

            let bounds = Rect::new(
                apply_margin(left, margin_w, false, w, 0),
                apply_margin(top, margin_h, false, h, 0),
                apply_margin(right, margin_w, true, w, w),
                apply_margin(bottom, margin_h, true, h, h),
            );

            if bounds.is_empty() || results.iter().any(|d| d.bounds == bounds) {
                continue;
            }
            results.push(Detection { confidence, bounds });
        }

        results
    }
}

/// Moves `coordinate` by `margin`, snapping to `limit` when the result
/// passes `check` or goes negative.
pub fn apply_margin(coordinate: i32, margin: i32, add: bool, check: i32, limit: i32) -> i32 {
    let moved = if add {
        coordinate + margin
    } else {
        coordinate - margin
    };

    if moved > check || moved < 0 {
        limit
    } else {
        moved
    }
}

/// A face goes to the front when it is taller than the current front and
/// still fits in the source image.
pub fn order_faces(faces: Vec<RgbImage>, source_height: u32) -> Vec<RgbImage> {
    let mut sorted: Vec<RgbImage> = Vec::with_capacity(faces.len());
    for face in faces {
        if !sorted.is_empty() && face.height() <= source_height && sorted[0].height() < face.height() {
            sorted.insert(0, face);
        } else {
            sorted.push(face);
        }
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Error;
    use ndarray::IxDyn;

    struct FixedOutput(Vec<[f32; 7]>);

    impl Inference for FixedOutput {
        fn infer(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
            let flat: Vec<f32> = self.0.iter().flatten().copied().collect();
            Ok(vec![ArrayD::from_shape_vec(IxDyn(&[1, 1, self.0.len(), 7]), flat)?])
        }
    }

    struct Failing;

    impl Inference for Failing {
        fn infer(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
            Err(Error::msg("backend unavailable"))
        }
    }

    fn detector(rows: Vec<[f32; 7]>) -> FaceDetector {
        FaceDetector::new(Box::new(FixedOutput(rows)), &DetectionConfig::default())
    }

    #[test]
    fn test_apply_margin() {
        assert_eq!(apply_margin(50, 20, false, 200, 0), 30);
        assert_eq!(apply_margin(10, 20, false, 200, 0), 0);
        assert_eq!(apply_margin(190, 20, true, 200, 200), 200);
        assert_eq!(apply_margin(150, 20, true, 200, 200), 170);

        for coordinate in -50..250 {
            let v = apply_margin(coordinate, 37, true, 200, 200);
            assert!((0..=200).contains(&v));
            let v = apply_margin(coordinate, 37, false, 200, 0);
            assert!((0..=200).contains(&v));
        }
    }

    #[test]
    fn test_confidence_threshold_is_strict() {
        let img = RgbImage::new(100, 100);
        let faces = detector(vec![
            [0., 1., 0.8, 0.4, 0.4, 0.6, 0.6],
            [0., 1., 0.5, 0.1, 0.1, 0.3, 0.3],
        ])
        .run(&img, "P1")
        .unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_faces_are_square() {
        let img = RgbImage::new(300, 200);
        let faces = detector(vec![
            [0., 1., 0.99, 0.3, 0.3, 0.55, 0.75],
            [0., 1., 0.95, 0.1, 0.1, 0.2, 0.13],
        ])
        .run(&img, "P1")
        .unwrap();

        assert_eq!(faces.len(), 2);
        for face in faces {
            assert_eq!(face.width(), face.height());
        }
    }

    #[test]
    fn test_duplicate_boxes_are_dropped() {
        let img = RgbImage::new(100, 100);
        let faces = detector(vec![
            [0., 1., 0.9, 0.3, 0.3, 0.6, 0.6],
            [0., 1., 0.95, 0.3, 0.3, 0.6, 0.6],
        ])
        .run(&img, "P1")
        .unwrap();
        assert_eq!(faces.len(), 1);
    }

    #[test]
    fn test_order_faces() {
        let faces = vec![
            RgbImage::new(10, 10),
            RgbImage::new(30, 30),
            RgbImage::new(20, 20),
            RgbImage::new(90, 90),
        ];
        let sorted = order_faces(faces, 50);
        let heights: Vec<u32> = sorted.iter().map(|f| f.height()).collect();
        assert_eq!(heights, vec![30, 10, 20, 90]);
    }

    #[test]
    fn test_inference_error_propagates() {
        let detector = FaceDetector::new(Box::new(Failing), &DetectionConfig::default());
        assert!(detector.run(&RgbImage::new(10, 10), "P1").is_err());
    }
}
