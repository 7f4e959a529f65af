use super::model::Inference;
use crate::config::LandmarksConfig;
use crate::error::Error;
use crate::shapes::Point;
use anyhow::Result;
use image::imageops::{resize, FilterType};
use image::RgbImage;
use ndarray::Array;
use tracing::{debug, span, Level};

pub mod indices;

pub const MESH_POINTS: usize = 478;

pub struct FaceLandmarker {
    model: Box<dyn Inference>,
    input_size: u32,
    min_presence: f32,
}

/// Landmark normalized to the face image, x and y in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone)]
pub struct RawLandmarks {
    pub points: Vec<RawLandmark>,
}

/// Landmark in pixels. `z` is relative to the nearest point, scaled by ten.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: i32,
    pub y: i32,
    pub z: f64,
}

#[derive(Debug, Clone)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl FaceLandmarker {
    pub fn new(model: Box<dyn Inference>, config: &LandmarksConfig) -> FaceLandmarker {
        FaceLandmarker {
            model,
            input_size: config.input_size,
            min_presence: config.min_presence,
        }
    }

    // ~30-40ms
    pub fn run(&self, img: &RgbImage) -> Result<Option<RawLandmarks>> {
        let span = span!(Level::DEBUG, "face_landmarker");
        let _guard = span.enter();

        let size = self.input_size;
        let input_img = resize(img, size, size, FilterType::Triangle);
        let input = Array::from_shape_fn((1, size as usize, size as usize, 3), |(_, y, x, c)| {
            input_img.get_pixel(x as u32, y as u32)[c] as f32 / 255. // 0. - 1. range
        })
        .into_dyn();

        let outputs = self.model.infer(input)?;
        let Some(mesh) = outputs.first() else {
            return Err(Error::Geometry("landmark model returned no output".to_string()).into());
        };

        if let Some(presence) = outputs.get(1).and_then(|p| p.iter().next().copied()) {
            let score = sigmoid_stable(presence);
            if score < self.min_presence {
                debug!("Face presence {score:.3} under {:.3}", self.min_presence);
                return Ok(None);
            }
        }

        let values: Vec<f32> = mesh.iter().copied().collect();
        if values.len() < MESH_POINTS * 3 {
            return Err(Error::Geometry(format!(
                "expected {} landmark values, got {}",
                MESH_POINTS * 3,
                values.len()
            ))
            .into());
        }

        let scale = size as f32;
        let points = values
            .chunks_exact(3)
            .take(MESH_POINTS)
            .map(|p| RawLandmark {
                x: p[0] / scale,
                y: p[1] / scale,
                z: p[2] / scale,
            })
            .collect();

        Ok(Some(RawLandmarks { points }))
    }

    /// Presence check only.
    pub fn validate(&self, img: &RgbImage) -> Result<bool> {
        Ok(self.run(img)?.is_some())
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

impl RawLandmarks {
    /// Eye points scaled to the image the landmarks were extracted from.
    pub fn scaled(&self, idxs: &[usize], width: u32, height: u32) -> Vec<(f32, f32)> {
        idxs.iter()
            .filter_map(|&i| self.points.get(i))
            .map(|p| {
                (
                    (p.x * width as f32).round_ties_even(),
                    (p.y * height as f32).round_ties_even(),
                )
            })
            .collect()
    }

    pub fn normalize(&self, width: u32, height: u32) -> LandmarkSet {
        let min_z = self
            .points
            .iter()
            .map(|p| p.z as f64)
            .fold(f64::INFINITY, f64::min);

        let mut points: Vec<Landmark> = self
            .points
            .iter()
            .map(|p| Landmark {
                x: (p.x as f64 * width as f64).round_ties_even() as i32,
                y: (p.y as f64 * height as f64).round_ties_even() as i32,
                z: round_to((p.z as f64 - min_z) * 10., 2),
            })
            .collect();

        for &(a, b) in indices::SYNTHESIZED_PAIRS.iter() {
            if let (Some(p1), Some(p2)) = (points.get(a).copied(), points.get(b).copied()) {
                points.push(midpoint(p1, p2));
            }
        }

        LandmarkSet { points }
    }
}

fn toward(from: i32, to: i32) -> i32 {
    let half = ((from - to).abs() as f64 / 2.).round_ties_even() as i32;
    if from < to { from + half } else { from - half }
}

pub fn midpoint(a: Landmark, b: Landmark) -> Landmark {
    Landmark {
        x: toward(a.x, b.x),
        y: toward(a.y, b.y),
        z: round_to((a.z + b.z) / 2., 2),
    }
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> LandmarkSet {
        LandmarkSet { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Result<Landmark> {
        self.points
            .get(idx)
            .copied()
            .ok_or_else(|| Error::Geometry(format!("landmark {idx} out of range")).into())
    }

    pub fn point(&self, idx: usize) -> Result<Point> {
        let l = self.get(idx)?;
        Ok(Point::new(l.x, l.y))
    }

    pub fn points(&self, idxs: &[usize]) -> Result<Vec<Point>> {
        idxs.iter().map(|&i| self.point(i)).collect()
    }

    pub fn translate(&self, dx: i32, dy: i32) -> LandmarkSet {
        LandmarkSet {
            points: self
                .points
                .iter()
                .map(|l| Landmark {
                    x: l.x + dx,
                    y: l.y + dy,
                    z: l.z,
                })
                .collect(),
        }
    }
}

fn sigmoid_stable(x: f32) -> f32 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        x.exp() / (1. + x.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    struct FixedMesh {
        presence: f32,
    }

    impl Inference for FixedMesh {
        fn infer(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
            let size = input.shape()[1] as f32;
            let mut values = Vec::with_capacity(MESH_POINTS * 3);
            for i in 0..MESH_POINTS {
                values.push(size * 0.5);
                values.push(size * 0.25);
                values.push(i as f32 * size / 100.);
            }
            Ok(vec![
                ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, MESH_POINTS * 3]), values)?,
                ArrayD::from_elem(IxDyn(&[1, 1]), self.presence),
            ])
        }
    }

    fn landmarker(presence: f32) -> FaceLandmarker {
        FaceLandmarker::new(Box::new(FixedMesh { presence }), &LandmarksConfig::default())
    }

    #[test]
    fn test_absent_face_is_none() {
        let img = RgbImage::new(64, 64);
        assert!(landmarker(-6.).run(&img).unwrap().is_none());
        assert!(!landmarker(-6.).validate(&img).unwrap());
        assert!(landmarker(6.).validate(&img).unwrap());
    }

    #[test]
    fn test_normalize() {
        let raw = landmarker(6.).run(&RgbImage::new(64, 64)).unwrap().unwrap();
        let set = raw.normalize(200, 100);

        assert_eq!(set.len(), MESH_POINTS + indices::SYNTHESIZED_PAIRS.len());
        let first = set.get(0).unwrap();
        assert_eq!((first.x, first.y), (100, 25));
        assert_eq!(first.z, 0.);
        let tenth = set.get(10).unwrap();
        assert!((tenth.z - 1.).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint_rule() {
        let a = Landmark { x: 10, y: 20, z: 1.25 };
        let b = Landmark { x: 15, y: 11, z: 2.5 };
        let m = midpoint(a, b);
        assert_eq!((m.x, m.y), (12, 16));
        assert!((m.z - 1.88).abs() < 1e-9);

        let m = midpoint(b, a);
        assert_eq!((m.x, m.y), (13, 15));
    }

    #[test]
    fn test_out_of_range_index() {
        let set = LandmarkSet::new(vec![Landmark { x: 1, y: 2, z: 0. }]);
        assert!(set.point(0).is_ok());
        assert!(set.point(1).is_err());
        assert_eq!(set.translate(-1, 3).point(0).unwrap(), Point::new(0, 5));
    }
}
