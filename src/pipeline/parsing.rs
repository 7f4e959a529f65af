use super::landmarks::{indices, LandmarkSet};
use super::model::Inference;
use crate::error::Error;
use crate::raster::contours::{contours_of, fill, fill_mask, find_external, stroke};
use crate::raster::{blank, crop, extent, mask_where, BLACK, WHITE};
use crate::shapes::{Contour, Rect};
use anyhow::Result;
use image::imageops::{resize, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array, Ix4};
use std::fmt;
use tracing::{debug, span, trace, Level};

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];
pub const CLASSES: usize = 19;

/// Classes of the face parsing network, in output channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FacePart {
    Background = 0,
    Skin,
    RightBrow,
    LeftBrow,
    RightEye,
    LeftEye,
    Glasses,
    RightEar,
    LeftEar,
    Headwear,
    Nose,
    MouthInterior,
    TopLip,
    BottomLip,
    Neck,
    Earwear,
    Clothing,
    Hair,
    Neckwear,
}

pub const FACE_PART_COLORS: [Rgb<u8>; CLASSES] = [
    Rgb([255, 255, 255]),
    Rgb([85, 0, 255]),
    Rgb([0, 170, 255]),
    Rgb([0, 85, 255]),
    Rgb([170, 0, 255]),
    Rgb([0, 255, 0]),
    Rgb([0, 255, 85]),
    Rgb([255, 0, 0]),
    Rgb([255, 0, 255]),
    Rgb([170, 255, 0]),
    Rgb([0, 255, 170]),
    Rgb([255, 0, 85]),
    Rgb([255, 0, 170]),
    Rgb([255, 85, 0]),
    Rgb([255, 170, 0]),
    Rgb([0, 255, 255]),
    Rgb([255, 255, 85]),
    Rgb([255, 128, 0]),
    Rgb([85, 255, 0]),
];

/// Regions the class map is merged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Background,
    Skin,
    Brow,
    Ear,
    Nose,
    Hair,
}

impl Region {
    pub fn color(&self) -> Rgb<u8> {
        match self {
            Region::Background => WHITE,
            Region::Skin => FACE_PART_COLORS[FacePart::Skin as usize],
            Region::Brow => FACE_PART_COLORS[FacePart::RightBrow as usize],
            Region::Ear => FACE_PART_COLORS[FacePart::RightEar as usize],
            Region::Nose => FACE_PART_COLORS[FacePart::Nose as usize],
            Region::Hair => FACE_PART_COLORS[FacePart::Hair as usize],
        }
    }
}

const FACE_REGIONS: [Region; 5] = [Region::Skin, Region::Brow, Region::Hair, Region::Ear, Region::Nose];

struct CleanEntry {
    region: Region,
    parts: &'static [FacePart],
}

const CLEAN_ENTRIES: [CleanEntry; 5] = [
    CleanEntry {
        region: Region::Background,
        parts: &[FacePart::Clothing, FacePart::Neckwear, FacePart::Neck],
    },
    CleanEntry {
        region: Region::Skin,
        parts: &[
            FacePart::Skin,
            FacePart::RightEye,
            FacePart::LeftEye,
            FacePart::Nose,
            FacePart::MouthInterior,
            FacePart::TopLip,
            FacePart::BottomLip,
        ],
    },
    CleanEntry {
        region: Region::Brow,
        parts: &[FacePart::RightBrow, FacePart::LeftBrow],
    },
    CleanEntry {
        region: Region::Ear,
        parts: &[FacePart::RightEar, FacePart::LeftEar],
    },
    CleanEntry {
        region: Region::Nose,
        parts: &[FacePart::Nose],
    },
];

const HAIR_ENTRY: CleanEntry = CleanEntry {
    region: Region::Hair,
    parts: &[FacePart::Hair],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanPass {
    /// Every region, hair included.
    AllRegions,
    /// Face regions only, with everything below the skin dropped.
    FaceOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionName {
    LeftEyeClean,
    RightEyeClean,
    LeftEyelidClean,
    RightEyelidClean,
    NoseClean,
    InternMouthClean,
    MouthClean,
    Ear,
    Brow,
    Hair,
    Skin,
    Nose,
    LeftEye,
    RightEye,
    Mouth,
    Neck,
    Beard,
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Contours of one region along with its filled mask, both in crop space.
#[derive(Debug, Clone)]
pub struct RegionContour {
    pub name: RegionName,
    pub contours: Vec<Contour>,
    pub mask: GrayImage,
    pub points: Vec<usize>,
    /// Extra stroke applied along the contour when the region is cleaned.
    pub offset_y: Option<u32>,
}

struct LandmarkRegion {
    name: RegionName,
    points: &'static [usize],
    offset_y: Option<u32>,
}

const LANDMARK_REGIONS: [LandmarkRegion; 7] = [
    LandmarkRegion {
        name: RegionName::LeftEyeClean,
        points: &indices::LEFT_EYE,
        offset_y: None,
    },
    LandmarkRegion {
        name: RegionName::RightEyeClean,
        points: &indices::RIGHT_EYE,
        offset_y: None,
    },
    LandmarkRegion {
        name: RegionName::LeftEyelidClean,
        points: &indices::LEFT_EYELID,
        offset_y: None,
    },
    LandmarkRegion {
        name: RegionName::RightEyelidClean,
        points: &indices::RIGHT_EYELID,
        offset_y: None,
    },
    LandmarkRegion {
        name: RegionName::NoseClean,
        points: &indices::NOSE,
        offset_y: Some(20),
    },
    LandmarkRegion {
        name: RegionName::InternMouthClean,
        points: &indices::INTERN_MOUTH,
        offset_y: None,
    },
    LandmarkRegion {
        name: RegionName::MouthClean,
        points: &indices::EXTERN_MOUTH,
        offset_y: Some(10),
    },
];

const PARSING_REGIONS: [(RegionName, Option<Region>); 10] = [
    (RegionName::Ear, Some(Region::Ear)),
    (RegionName::Brow, Some(Region::Brow)),
    (RegionName::Hair, Some(Region::Hair)),
    (RegionName::Skin, Some(Region::Skin)),
    (RegionName::Nose, Some(Region::Nose)),
    (RegionName::LeftEye, None),
    (RegionName::RightEye, None),
    (RegionName::Mouth, None),
    (RegionName::Neck, None),
    (RegionName::Beard, None),
];

/// Everything the styling stage needs from one parsed face. Rasters are
/// cropped to `roi`; landmarks are translated into the same space.
pub struct ParsedFace {
    pub photo: RgbImage,
    /// Black where a face region is, white elsewhere.
    pub canvas: RgbImage,
    pub region_map: RgbImage,
    pub face_only: RgbImage,
    pub roi: Rect,
    pub bottom_y: i32,
    pub face_contours: RgbImage,
    pub regions: Vec<RegionContour>,
    pub landmarks: LandmarkSet,
}

impl ParsedFace {
    pub fn region(&self, name: RegionName) -> Option<&RegionContour> {
        self.regions.iter().find(|r| r.name == name)
    }
}

pub struct FaceParser {
    model: Box<dyn Inference>,
    input_size: u32,
    hair_min_pixels: usize,
}

impl FaceParser {
    pub fn new(model: Box<dyn Inference>, input_size: u32, hair_min_pixels: usize) -> FaceParser {
        FaceParser {
            model,
            input_size,
            hair_min_pixels,
        }
    }

    /// Class index per pixel, at the resolution of `img`.
    pub fn segment(&self, img: &RgbImage) -> Result<GrayImage> {
        let span = span!(Level::DEBUG, "face_parser");
        let _guard = span.enter();

        let size = self.input_size;
        let resized;
        let input_img = if img.dimensions() != (size, size) {
            resized = resize(img, size, size, FilterType::Nearest);
            &resized
        } else {
            img
        };

        let input = Array::from_shape_fn((1, 3, size as usize, size as usize), |(_, c, y, x)| {
            let v = input_img.get_pixel(x as u32, y as u32)[c] as f32 / 255.;
            (v - MEAN[c]) / STD[c]
        })
        .into_dyn();

        let outputs = self.model.infer(input)?;
        let logits = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::Segmentation("parser returned no output".to_string()))?
            .into_dimensionality::<Ix4>()
            .map_err(|e| Error::Segmentation(format!("unexpected parser output: {e}")))?;

        let (_, classes, in_h, in_w) = logits.dim();
        if classes != CLASSES || in_h == 0 || in_w == 0 {
            return Err(Error::Segmentation(format!("expected {CLASSES} classes, got {classes}")).into());
        }

        let (out_w, out_h) = img.dimensions();
        // bilinear, corners aligned
        let scale = |out: u32, input: usize| {
            if out > 1 {
                (input - 1) as f32 / (out - 1) as f32
            } else {
                0.
            }
        };
        let sx = scale(out_w, in_w);
        let sy = scale(out_h, in_h);

        let mut labels = GrayImage::new(out_w, out_h);
        for y in 0..out_h {
            let fy = y as f32 * sy;
            let y0 = (fy.floor() as usize).min(in_h - 1);
            let y1 = (y0 + 1).min(in_h - 1);
            let wy = fy - y0 as f32;

            for x in 0..out_w {
                let fx = x as f32 * sx;
                let x0 = (fx.floor() as usize).min(in_w - 1);
                let x1 = (x0 + 1).min(in_w - 1);
                let wx = fx - x0 as f32;

                let mut best = (0usize, f32::NEG_INFINITY);
                for c in 0..classes {
                    let top = logits[[0, c, y0, x0]] * (1. - wx) + logits[[0, c, y0, x1]] * wx;
                    let bottom = logits[[0, c, y1, x0]] * (1. - wx) + logits[[0, c, y1, x1]] * wx;
                    let v = top * (1. - wy) + bottom * wy;
                    if v > best.1 {
                        best = (c, v);
                    }
                }
                labels.put_pixel(x, y, Luma([best.0 as u8]));
            }
        }

        Ok(labels)
    }

    /// Paints the class map into region colors. The hair heuristic runs when
    /// landmarks are given and the pass includes hair.
    pub fn clean(&self, labels: &GrayImage, pass: CleanPass, landmarks: Option<&LandmarkSet>) -> RgbImage {
        let mut map = blank(labels.width(), labels.height());

        let mut entries: Vec<&CleanEntry> = CLEAN_ENTRIES.iter().collect();
        if pass == CleanPass::AllRegions {
            entries.push(&HAIR_ENTRY);
        }

        for entry in entries {
            let color = entry.region.color();
            for (x, y, label) in labels.enumerate_pixels() {
                if entry.parts.iter().any(|p| *p as u8 == label[0]) {
                    map.put_pixel(x, y, color);
                }
            }

            if entry.region == Region::Hair {
                if let Some(landmarks) = landmarks {
                    self.clean_hair(&mut map, landmarks);
                }
            }
        }

        if pass == CleanPass::FaceOnly {
            if let Some(skin) = extent(&map, Region::Skin.color()) {
                for y in skin.bottom.max(0) as u32..map.height() {
                    for x in 0..map.width() {
                        map.put_pixel(x, y, WHITE);
                    }
                }
            }
        }

        map
    }

    /// Drops hair blobs that hang below the ears and turns small ones into
    /// skin or background.
    fn clean_hair(&self, map: &mut RgbImage, landmarks: &LandmarkSet) {
        let Ok(ear) = landmarks.point(indices::EAR_POINT) else {
            return;
        };

        for contour in contours_of(map, Region::Hair.color()) {
            let Some(top) = contour.min_y() else {
                continue;
            };
            let count = crate::raster::count_mask(&fill_mask(
                std::slice::from_ref(&contour),
                map.width(),
                map.height(),
            ));
            let skin_top = extent(map, Region::Skin.color()).map(|r| r.top);

            let replacement = if top > ear.y {
                Some(Region::Background)
            } else if count < self.hair_min_pixels {
                match skin_top {
                    Some(skin_top) if top > skin_top => Some(Region::Skin),
                    _ => Some(Region::Background),
                }
            } else {
                None
            };

            if let Some(region) = replacement {
                trace!("Hair blob of {count}px at y={top} becomes {region:?}");
                fill(map, &[contour], region.color());
            }
        }
    }

    fn black_mask(map: &RgbImage) -> RgbImage {
        let face_colors: Vec<Rgb<u8>> = FACE_REGIONS.iter().map(|r| r.color()).collect();
        RgbImage::from_fn(map.width(), map.height(), |x, y| {
            if face_colors.contains(map.get_pixel(x, y)) {
                BLACK
            } else {
                WHITE
            }
        })
    }

    fn roi(black: &RgbImage) -> Result<Rect> {
        extent(black, BLACK).ok_or_else(|| Error::Segmentation("no face region found".to_string()).into())
    }

    /// Crops the photo to the segmented face, hair included.
    pub fn crop_to_face(&self, img: &RgbImage) -> Result<RgbImage> {
        let labels = self.segment(img)?;
        let map = self.clean(&labels, CleanPass::AllRegions, None);
        let roi = Self::roi(&Self::black_mask(&map))?;
        Ok(crop(img, roi))
    }

    pub fn parse(&self, img: &RgbImage, landmarks: &LandmarkSet) -> Result<ParsedFace> {
        let labels = self.segment(img)?;
        let map = self.clean(&labels, CleanPass::AllRegions, Some(landmarks));
        let face_only = self.clean(&labels, CleanPass::FaceOnly, None);

        let black = Self::black_mask(&map);
        let roi = Self::roi(&black)?;
        debug!("Face region {roi:?}");

        let canvas = crop(&black, roi);
        let region_map = crop(&map, roi);
        let (w, h) = canvas.dimensions();
        let local = landmarks.translate(-roi.left, -roi.top);

        let outline = find_external(&mask_where(&canvas, BLACK));
        let mut face_contours = blank(w, h);
        stroke(&mut face_contours, &outline, BLACK, 2);

        let mut regions = Vec::with_capacity(LANDMARK_REGIONS.len() + PARSING_REGIONS.len());
        for def in LANDMARK_REGIONS.iter() {
            let contour = Contour::new(local.points(def.points)?);
            let mask = fill_mask(std::slice::from_ref(&contour), w, h);
            regions.push(RegionContour {
                name: def.name,
                contours: vec![contour],
                mask,
                points: def.points.to_vec(),
                offset_y: def.offset_y,
            });
        }
        for (name, region) in PARSING_REGIONS {
            let contours = match region {
                Some(region) => contours_of(&region_map, region.color()),
                None => vec![],
            };
            let mask = fill_mask(&contours, w, h);
            regions.push(RegionContour {
                name,
                contours,
                mask,
                points: vec![],
                offset_y: None,
            });
        }

        Ok(ParsedFace {
            photo: crop(img, roi),
            canvas,
            region_map,
            face_only: crop(&Self::black_mask(&face_only), roi),
            roi,
            bottom_y: roi.bottom,
            face_contours,
            regions,
            landmarks: local,
        })
    }
}

/// Class map rendered with the class colors.
pub fn colorize(labels: &GrayImage) -> RgbImage {
    RgbImage::from_fn(labels.width(), labels.height(), |x, y| {
        FACE_PART_COLORS[(labels.get_pixel(x, y)[0] as usize).min(CLASSES - 1)]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::landmarks::Landmark;
    use crate::raster::count_color;
    use ndarray::{ArrayD, IxDyn};

    struct NoModel;

    impl Inference for NoModel {
        fn infer(&self, _input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
            Ok(vec![])
        }
    }

    /// Logits that favor one class per quadrant.
    struct Quadrants;

    impl Inference for Quadrants {
        fn infer(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
            let size = input.shape()[2];
            let mut logits = ArrayD::<f32>::zeros(IxDyn(&[1, CLASSES, size, size]));
            for y in 0..size {
                for x in 0..size {
                    let class = match (x < size / 2, y < size / 2) {
                        (true, true) => FacePart::Hair,
                        (false, true) => FacePart::Skin,
                        (true, false) => FacePart::Clothing,
                        (false, false) => FacePart::Nose,
                    };
                    logits[[0, class as usize, y, x]] = 5.;
                }
            }
            Ok(vec![logits])
        }
    }

    fn labels_from(rows: &[&[FacePart]]) -> GrayImage {
        GrayImage::from_fn(rows[0].len() as u32, rows.len() as u32, |x, y| {
            Luma([rows[y as usize][x as usize] as u8])
        })
    }

    fn landmarks_with_ear(ear_y: i32) -> LandmarkSet {
        let mut points = vec![Landmark { x: 0, y: 0, z: 0. }; 480];
        points[indices::EAR_POINT] = Landmark { x: 0, y: ear_y, z: 0. };
        LandmarkSet::new(points)
    }

    fn fill_rect(labels: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, part: FacePart) {
        for y in y0..y1 {
            for x in x0..x1 {
                labels.put_pixel(x, y, Luma([part as u8]));
            }
        }
    }

    #[test]
    fn test_part_colors_are_distinct() {
        for (i, a) in FACE_PART_COLORS.iter().enumerate() {
            for b in &FACE_PART_COLORS[i + 1..] {
                assert_ne!(a, b);
            }
        }
        let labels = labels_from(&[&[FacePart::Neck, FacePart::Clothing]]);
        let colored = colorize(&labels);
        assert_ne!(colored.get_pixel(0, 0), colored.get_pixel(1, 0));
    }

    #[test]
    fn test_segment_quadrants() {
        let parser = FaceParser::new(Box::new(Quadrants), 16, 15000);
        let labels = parser.segment(&RgbImage::new(40, 40)).unwrap();

        assert_eq!(labels.dimensions(), (40, 40));
        assert_eq!(labels.get_pixel(2, 2)[0], FacePart::Hair as u8);
        assert_eq!(labels.get_pixel(37, 2)[0], FacePart::Skin as u8);
        assert_eq!(labels.get_pixel(2, 37)[0], FacePart::Clothing as u8);
        assert_eq!(labels.get_pixel(37, 37)[0], FacePart::Nose as u8);
    }

    #[test]
    fn test_missing_output_is_segmentation_error() {
        let parser = FaceParser::new(Box::new(NoModel), 16, 15000);
        let err = parser.segment(&RgbImage::new(8, 8)).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Segmentation(_))));
    }

    #[test]
    fn test_clean_merges_regions() {
        let labels = labels_from(&[
            &[FacePart::Neck, FacePart::TopLip, FacePart::LeftBrow],
            &[FacePart::LeftEar, FacePart::Nose, FacePart::Glasses],
        ]);
        let parser = FaceParser::new(Box::new(NoModel), 16, 15000);
        let map = parser.clean(&labels, CleanPass::AllRegions, None);

        assert_eq!(*map.get_pixel(0, 0), WHITE);
        assert_eq!(*map.get_pixel(1, 0), Region::Skin.color());
        assert_eq!(*map.get_pixel(2, 0), Region::Brow.color());
        assert_eq!(*map.get_pixel(0, 1), Region::Ear.color());
        assert_eq!(*map.get_pixel(1, 1), Region::Nose.color());
        assert_eq!(*map.get_pixel(2, 1), WHITE);
    }

    #[test]
    fn test_face_only_drops_hair_and_below_skin() {
        let mut labels = GrayImage::new(20, 20);
        fill_rect(&mut labels, 0, 0, 20, 4, FacePart::Hair);
        fill_rect(&mut labels, 5, 4, 15, 12, FacePart::Skin);
        fill_rect(&mut labels, 5, 12, 15, 18, FacePart::RightEar);

        let parser = FaceParser::new(Box::new(NoModel), 16, 15000);
        let map = parser.clean(&labels, CleanPass::FaceOnly, None);

        assert_eq!(count_color(&map, Region::Hair.color()), 0);
        assert_eq!(count_color(&map, Region::Ear.color()), 0);
        assert_eq!(count_color(&map, Region::Skin.color()), 10 * 7);
    }

    #[test]
    fn test_hair_heuristic() {
        let mut labels = GrayImage::new(60, 60);
        fill_rect(&mut labels, 10, 10, 50, 50, FacePart::Skin);
        // big blob on top of the head
        fill_rect(&mut labels, 10, 0, 50, 10, FacePart::Hair);
        // small blob inside the face, under the skin top
        fill_rect(&mut labels, 20, 20, 24, 24, FacePart::Hair);
        // blob below the ear line
        fill_rect(&mut labels, 0, 52, 8, 58, FacePart::Hair);

        let parser = FaceParser::new(Box::new(NoModel), 16, 100);
        let map = parser.clean(&labels, CleanPass::AllRegions, Some(&landmarks_with_ear(40)));

        assert_eq!(*map.get_pixel(30, 5), Region::Hair.color());
        assert_eq!(*map.get_pixel(21, 21), Region::Skin.color());
        assert_eq!(*map.get_pixel(3, 55), WHITE);
    }

    #[test]
    fn test_small_hair_above_skin_becomes_background() {
        let mut labels = GrayImage::new(60, 60);
        fill_rect(&mut labels, 10, 10, 50, 50, FacePart::Skin);
        fill_rect(&mut labels, 20, 2, 24, 6, FacePart::Hair);

        let parser = FaceParser::new(Box::new(NoModel), 16, 100);
        let map = parser.clean(&labels, CleanPass::AllRegions, Some(&landmarks_with_ear(40)));
        assert_eq!(count_color(&map, Region::Hair.color()), 0);
        assert_eq!(*map.get_pixel(21, 3), WHITE);
    }

    #[test]
    fn test_crop_to_face() {
        let parser = FaceParser::new(Box::new(Quadrants), 16, 15000);
        let cropped = parser.crop_to_face(&RgbImage::new(40, 40)).unwrap();
        // everything but the clothing quadrant is face, max row and column excluded
        assert_eq!(cropped.dimensions(), (39, 39));
    }
}
