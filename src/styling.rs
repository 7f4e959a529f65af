use crate::config::StylingConfig;
use crate::error::Error;
use crate::pipeline::landmarks::LandmarkSet;
use crate::pipeline::parsing::{ParsedFace, RegionContour, RegionName};
use crate::raster::contours::stroke;
use crate::raster::{replace_where, TEMP_WHITE};
use crate::shapes::Point;
use anyhow::Result;
use image::{Rgb, RgbImage, RgbaImage};
use tracing::{span, trace, Level};

pub use beard::Beard;
pub use eye::{Eye, Side};
pub use features::{Mouth, Nose};
pub use fill::{Brow, Ear, Hair, Skin};
pub use neck::Neck;
pub use plan::{RenderPlan, RenderStep, StepAction};

mod beard;
mod eye;
mod features;
mod fill;
mod neck;
mod plan;

/// Colors picked for the player.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub skin: Rgb<u8>,
    pub hair: Rgb<u8>,
    pub eyes: Rgb<u8>,
    pub mouth: Rgb<u8>,
}

/// Where the drawn neck ends, used to stitch the shirt collar on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeckSeam {
    pub second_point: Point,
    pub third_point: Point,
    pub color: Rgb<u8>,
}

#[derive(Debug, Clone)]
pub enum Renderer {
    Skin(Skin),
    Ear(Ear),
    Brow(Brow),
    Hair(Hair),
    Beard(Beard),
    Nose(Nose),
    Eye(Eye),
    Mouth(Mouth),
    Neck(Neck),
}

impl From<Eye> for Renderer {
    fn from(e: Eye) -> Renderer {
        Renderer::Eye(e)
    }
}

/// State threaded through the steps of a render plan.
pub struct RenderContext<'a> {
    pub palette: &'a Palette,
    pub iris: &'a RgbaImage,
    pub settings: &'a StylingConfig,
    pub photo: &'a RgbImage,
    pub landmarks: &'a LandmarkSet,
    /// Drawing surface, starts as the black face mask.
    pub canvas: RgbImage,
    /// Face mask with the cleaned regions painted placeholder white.
    pub cleaned: RgbImage,
    pub no_hair: bool,
    pub hair_layer: Option<RgbImage>,
    pub real_hair: Option<RgbImage>,
    pub real_brow: Option<RgbImage>,
    pub beard_layer: Option<RgbImage>,
    pub neck: Option<NeckSeam>,
    pub darker_eyes: Option<Rgb<u8>>,
}

/// A step's own region and the region it depends on, when any.
pub struct StepRegions<'a> {
    pub region: &'a RegionContour,
    pub depends_on: Option<&'a RegionContour>,
}

impl StepRegions<'_> {
    fn dependency(&self) -> Result<&RegionContour> {
        self.depends_on
            .ok_or_else(|| Error::render(self.region.name, "missing dependency").into())
    }
}

trait Executable {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()>;
}

impl Renderer {
    fn execute(&self, ctx: &mut RenderContext, regions: &StepRegions) -> Result<()> {
        match self {
            Renderer::Skin(r) => r.execute(ctx, regions),
            Renderer::Ear(r) => r.execute(ctx, regions),
            Renderer::Brow(r) => r.execute(ctx, regions),
            Renderer::Hair(r) => r.execute(ctx, regions),
            Renderer::Beard(r) => r.execute(ctx, regions),
            Renderer::Nose(r) => r.execute(ctx, regions),
            Renderer::Eye(r) => r.execute(ctx, regions),
            Renderer::Mouth(r) => r.execute(ctx, regions),
            Renderer::Neck(r) => r.execute(ctx, regions),
        }
    }
}

/// Paints a region placeholder white on the cleaned face, widened by a
/// stroke along its contour when the region asks for it.
fn clean_to_skin(ctx: &mut RenderContext, region: &RegionContour) {
    replace_where(&mut ctx.cleaned, &region.mask, TEMP_WHITE);
    if let Some(offset) = region.offset_y {
        stroke(&mut ctx.cleaned, &region.contours, TEMP_WHITE, offset);
    }
}

pub struct StyledFace {
    pub face: RgbImage,
    pub hair: Option<RgbImage>,
    pub beard: Option<RgbImage>,
    pub neck: NeckSeam,
    pub no_hair: bool,
}

pub struct FaceStyler {
    plan: RenderPlan,
    palette: Palette,
    iris: RgbaImage,
    settings: StylingConfig,
}

impl FaceStyler {
    pub fn new(plan: RenderPlan, palette: Palette, iris: RgbaImage, settings: StylingConfig) -> FaceStyler {
        FaceStyler {
            plan,
            palette,
            iris,
            settings,
        }
    }

    pub fn style(&self, parsed: &ParsedFace) -> Result<StyledFace> {
        let span = span!(Level::DEBUG, "face_styling");
        let _guard = span.enter();

        let mut ctx = RenderContext {
            palette: &self.palette,
            iris: &self.iris,
            settings: &self.settings,
            photo: &parsed.photo,
            landmarks: &parsed.landmarks,
            canvas: parsed.canvas.clone(),
            cleaned: parsed.canvas.clone(),
            no_hair: false,
            hair_layer: None,
            real_hair: None,
            real_brow: None,
            beard_layer: None,
            neck: None,
            darker_eyes: None,
        };

        for step in self.plan.steps() {
            let region = lookup(parsed, step.region)?;
            let depends_on = step.depends_on.map(|name| lookup(parsed, name)).transpose()?;
            let regions = StepRegions { region, depends_on };

            match &step.action {
                StepAction::Clean => {
                    trace!("Cleaning {}", step.region);
                    clean_to_skin(&mut ctx, region);
                }
                StepAction::Draw(renderer) => {
                    trace!("Drawing {}", step.region);
                    renderer.execute(&mut ctx, &regions)?;
                }
            }
        }

        let neck = ctx.neck.ok_or_else(|| Error::render(RegionName::Neck, "neck was never drawn"))?;
        Ok(StyledFace {
            face: ctx.canvas,
            hair: ctx.hair_layer,
            beard: ctx.beard_layer,
            neck,
            no_hair: ctx.no_hair,
        })
    }
}

fn lookup(parsed: &ParsedFace, name: RegionName) -> Result<&RegionContour> {
    parsed
        .region(name)
        .ok_or_else(|| Error::render(name, "region was not parsed").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::landmarks::indices;
    use crate::pipeline::landmarks::{RawLandmark, RawLandmarks, MESH_POINTS};
    use crate::pipeline::model::Inference;
    use crate::pipeline::parsing::{FaceParser, FacePart, CLASSES};
    use crate::raster::contours::fill_mask;
    use crate::raster::{count_color, BLACK};
    use crate::shapes::Contour;
    use image::GrayImage;
    use ndarray::{ArrayD, IxDyn};
    use std::f32::consts::PI;

    pub(super) fn square_region(name: RegionName, x0: i32, y0: i32, x1: i32, y1: i32, size: u32) -> RegionContour {
        let contour = Contour::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]);
        RegionContour {
            name,
            mask: fill_mask(std::slice::from_ref(&contour), size, size),
            contours: vec![contour],
            points: vec![],
            offset_y: None,
        }
    }

    pub(super) struct Fixture {
        pub palette: Palette,
        pub settings: StylingConfig,
        pub photo: RgbImage,
        pub landmarks: LandmarkSet,
        pub iris: RgbaImage,
    }

    impl Fixture {
        pub fn new(size: u32, landmarks: LandmarkSet) -> Fixture {
            Fixture {
                palette: Palette {
                    skin: Rgb([200, 150, 120]),
                    hair: Rgb([40, 30, 20]),
                    eyes: Rgb([60, 90, 160]),
                    mouth: Rgb([180, 60, 60]),
                },
                settings: StylingConfig::default(),
                photo: RgbImage::from_pixel(size, size, Rgb([120, 100, 90])),
                landmarks,
                iris: RgbaImage::new(1, 1),
            }
        }

        pub fn context(&self, canvas: RgbImage) -> RenderContext<'_> {
            RenderContext {
                palette: &self.palette,
                iris: &self.iris,
                settings: &self.settings,
                photo: &self.photo,
                landmarks: &self.landmarks,
                cleaned: canvas.clone(),
                canvas,
                no_hair: false,
                hair_layer: None,
                real_hair: None,
                real_brow: None,
                beard_layer: None,
                neck: None,
                darker_eyes: None,
            }
        }
    }

    /// Blocks painted by `Segments` as (class, [u0, u1, v0, v1]) fractions of
    /// the parsed image. Earlier blocks win.
    const FACE_BLOCKS: [(FacePart, [f32; 4]); 12] = [
        (FacePart::LeftBrow, [0.3, 0.45, 0.36, 0.39]),
        (FacePart::RightBrow, [0.55, 0.7, 0.36, 0.39]),
        (FacePart::LeftEye, [0.32, 0.43, 0.42, 0.46]),
        (FacePart::RightEye, [0.57, 0.68, 0.42, 0.46]),
        (FacePart::Nose, [0.45, 0.55, 0.44, 0.62]),
        (FacePart::TopLip, [0.4, 0.6, 0.68, 0.71]),
        (FacePart::BottomLip, [0.4, 0.6, 0.71, 0.74]),
        (FacePart::LeftEar, [0.12, 0.2, 0.4, 0.55]),
        (FacePart::RightEar, [0.8, 0.88, 0.4, 0.55]),
        (FacePart::Hair, [0.2, 0.8, 0.1, 0.3]),
        (FacePart::Skin, [0.2, 0.8, 0.3, 0.84]),
        (FacePart::Neck, [0.32, 0.68, 0.84, 0.95]),
    ];

    fn face_part(u: f32, v: f32) -> FacePart {
        FACE_BLOCKS
            .iter()
            .find(|(_, [u0, u1, v0, v1])| (*u0..*u1).contains(&u) && (*v0..*v1).contains(&v))
            .map_or(FacePart::Background, |(part, _)| *part)
    }

    struct Segments;

    impl Inference for Segments {
        fn infer(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
            let size = input.shape()[2];
            let mut logits = ArrayD::<f32>::zeros(IxDyn(&[1, CLASSES, size, size]));
            for y in 0..size {
                for x in 0..size {
                    let u = (x as f32 + 0.5) / size as f32;
                    let v = (y as f32 + 0.5) / size as f32;
                    logits[[0, face_part(u, v) as usize, y, x]] = 5.;
                }
            }
            Ok(vec![logits])
        }
    }

    fn ring(mesh: &mut [RawLandmark], idxs: &[usize], center: (f32, f32), radius: (f32, f32), start: f32, turn: f32) {
        let n = idxs.len() as f32;
        for (k, &i) in idxs.iter().enumerate() {
            let t = start + turn * k as f32 * 2. * PI / n;
            mesh[i] = RawLandmark {
                x: center.0 + radius.0 * t.cos(),
                y: center.1 - radius.1 * t.sin(),
                z: 0.,
            };
        }
    }

    fn line(mesh: &mut [RawLandmark], idxs: &[usize], from: (f32, f32), to: (f32, f32)) {
        let last = (idxs.len() - 1).max(1) as f32;
        for (k, &i) in idxs.iter().enumerate() {
            let t = k as f32 / last;
            mesh[i] = RawLandmark {
                x: from.0 + (to.0 - from.0) * t,
                y: from.1 + (to.1 - from.1) * t,
                z: 0.,
            };
        }
    }

    /// A mesh laid over the blocks of `face_part`.
    fn face_mesh() -> RawLandmarks {
        let mut mesh = vec![RawLandmark { x: 0.5, y: 0.5, z: 0. }; MESH_POINTS];
        for (eye, iris, crease, cx) in [
            (&indices::LEFT_EYE, &indices::LEFT_EYE_IRIS, &indices::LEFT_UP_EYELID, 0.375),
            (&indices::RIGHT_EYE, &indices::RIGHT_EYE_IRIS, &indices::RIGHT_UP_EYELID, 0.625),
        ] {
            ring(&mut mesh, eye, (cx, 0.44), (0.06, 0.025), 0., 1.);
            ring(&mut mesh, iris, (cx, 0.44), (0.02, 0.02), 0., 1.);
            // creases start at the outer corner
            let outer = if cx < 0.5 { -0.06 } else { 0.06 };
            line(&mut mesh, crease, (cx + outer, 0.405), (cx - outer, 0.405));
        }

        let nose = &indices::NOSE;
        mesh[nose[0]] = RawLandmark { x: 0.5, y: 0.43, z: 0. };
        line(&mut mesh, &nose[1..9], (0.485, 0.44), (0.45, 0.6));
        line(&mut mesh, &nose[9..14], (0.45, 0.62), (0.55, 0.62));
        line(&mut mesh, &nose[14..], (0.55, 0.6), (0.515, 0.44));
        line(&mut mesh, &indices::NOSE_TIP_LINE, (0.46, 0.6), (0.54, 0.6));
        mesh[1].z = -0.02;
        ring(&mut mesh, &indices::LEFT_NOSTRIL, (0.475, 0.61), (0.01, 0.006), 0., 1.);
        ring(&mut mesh, &indices::RIGHT_NOSTRIL, (0.525, 0.61), (0.01, 0.006), 0., 1.);

        ring(&mut mesh, &indices::EXTERN_MOUTH, (0.5, 0.71), (0.1, 0.03), PI, -1.);
        ring(&mut mesh, &indices::INTERN_MOUTH, (0.5, 0.71), (0.07, 0.01), PI, -1.);

        mesh[indices::LEFT_NECK] = RawLandmark { x: 0.332, y: 0.8, z: 0. };
        mesh[indices::RIGHT_NECK] = RawLandmark { x: 0.664, y: 0.8, z: 0. };
        mesh[indices::EAR_POINT] = RawLandmark { x: 0.16, y: 0.45, z: 0. };

        RawLandmarks { points: mesh }
    }

    #[test]
    fn test_standard_plan_styles_parsed_face() {
        let fixture = Fixture::new(512, LandmarkSet::new(vec![]));
        let landmarks = face_mesh().normalize(512, 512);
        let parser = FaceParser::new(Box::new(Segments), 512, fixture.settings.hair_min_pixels);
        let parsed = parser.parse(&fixture.photo, &landmarks).unwrap();

        let styler = FaceStyler::new(
            RenderPlan::standard().unwrap(),
            fixture.palette,
            fixture.iris.clone(),
            fixture.settings.clone(),
        );
        let styled = styler.style(&parsed).unwrap();
        let palette = fixture.palette;
        let (w, h) = styled.face.dimensions();

        assert_eq!(w, parsed.canvas.width());
        assert!(h > parsed.canvas.height());
        // the neck found skin under both jaw landmarks
        let left = parsed.landmarks.point(indices::LEFT_NECK).unwrap();
        let right = parsed.landmarks.point(indices::RIGHT_NECK).unwrap();
        assert_eq!(styled.neck.second_point, Point::new(left.x, h as i32));
        assert_eq!(styled.neck.third_point, Point::new(right.x, h as i32));

        assert!(!styled.no_hair);
        assert!(styled.hair.is_some());
        // the beard step compared against the hair sample
        assert!(styled.beard.is_some());

        let ear = Point::new(82 - parsed.roi.left, 243 - parsed.roi.top);
        assert_eq!(*styled.face.get_pixel(ear.x as u32, ear.y as u32), palette.skin);
        assert!(count_color(&styled.face, palette.mouth) > 0);
        let corner = parsed.landmarks.point(indices::LEFT_EYE_LEFT_POINT).unwrap();
        assert_eq!(*styled.face.get_pixel(corner.x as u32 + 5, corner.y as u32), TEMP_WHITE);
    }

    #[test]
    fn test_clean_to_skin_with_offset() {
        let fixture = Fixture::new(40, LandmarkSet::new(vec![]));
        let mut ctx = fixture.context(RgbImage::from_pixel(40, 40, BLACK));

        let mut region = square_region(RegionName::MouthClean, 10, 10, 20, 20, 40);
        clean_to_skin(&mut ctx, &region);
        assert_eq!(*ctx.cleaned.get_pixel(15, 15), TEMP_WHITE);
        assert_eq!(*ctx.cleaned.get_pixel(22, 15), BLACK);
        assert_eq!(*ctx.canvas.get_pixel(15, 15), BLACK);

        region.offset_y = Some(10);
        region.mask = GrayImage::new(40, 40);
        clean_to_skin(&mut ctx, &region);
        assert_eq!(*ctx.cleaned.get_pixel(22, 15), TEMP_WHITE);
        assert_eq!(*ctx.cleaned.get_pixel(30, 15), BLACK);
    }
}
