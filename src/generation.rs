use crate::card::CardCompositor;
use crate::config::{Config, ModelSource, StylingConfig};
use crate::error::Error;
use crate::parts::GenerationParts;
use crate::pipeline::aligner::align;
use crate::pipeline::detection::FaceDetector;
use crate::pipeline::landmarks::indices::{LEFT_EYE, RIGHT_EYE};
use crate::pipeline::landmarks::FaceLandmarker;
use crate::pipeline::model::{init_runtime, Inference, ModelStore, OrtModel};
use crate::pipeline::parsing::{FaceParser, ParsedFace};
use crate::pipeline::resizing::FaceResizer;
use crate::shirt::{ShirtCompositor, ShirtFace};
use crate::styling::{FaceStyler, RenderPlan, StyledFace};
use crate::tilt::{generate_features, TiltClassifier};
use anyhow::Result;
use image::{ImageBuffer, PixelWithColorType, RgbImage};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, span, warn, Level};

/// The three networks every generation runs.
pub struct Models {
    pub detector: Box<dyn Inference>,
    pub landmarker: Box<dyn Inference>,
    pub parser: Box<dyn Inference>,
}

impl Models {
    pub fn load(store: &ModelStore, config: &Config) -> Result<Models> {
        let threads = config.models.threads;
        let load = |source: &ModelSource| -> Result<Box<dyn Inference>> {
            let path = store.ensure(source)?;
            Ok(Box::new(OrtModel::load(&path, threads)?))
        };

        Ok(Models {
            detector: load(&config.models.detector)?,
            landmarker: load(&config.models.landmarker)?,
            parser: load(&config.models.parser)?,
        })
    }
}

/// Turns a player's photo and parts into a card. Faces are tried in
/// detection order until one makes it through styling.
pub struct CardGenerator {
    detector: FaceDetector,
    landmarker: FaceLandmarker,
    parser: FaceParser,
    resizer: FaceResizer,
    styling: StylingConfig,
    tilt: Option<TiltClassifier>,
    shirt: ShirtCompositor,
    card: CardCompositor,
    debug_dir: Option<PathBuf>,
}

impl CardGenerator {
    pub fn new(models: Models, tilt: Option<TiltClassifier>, config: &Config) -> CardGenerator {
        CardGenerator {
            detector: FaceDetector::new(models.detector, &config.detection),
            landmarker: FaceLandmarker::new(models.landmarker, &config.landmarks),
            parser: FaceParser::new(
                models.parser,
                config.resizing.parsing_width,
                config.styling.hair_min_pixels,
            ),
            resizer: FaceResizer::new(&config.resizing),
            styling: config.styling.clone(),
            tilt,
            shirt: ShirtCompositor::new(config.shirt.clone()),
            card: CardCompositor::new(),
            debug_dir: None,
        }
    }

    /// Loads every model named by the configuration, fetching missing files.
    pub fn from_config(config: &Config) -> Result<CardGenerator> {
        init_runtime()?;
        let store = ModelStore::new(&config.models.dir);
        let models = Models::load(&store, config)?;

        let tilt = if config.tilt.enabled {
            Some(TiltClassifier::load(&store, &config.models, config.tilt.forward_label)?)
        } else {
            None
        };

        Ok(CardGenerator::new(models, tilt, config))
    }

    /// Writes intermediate rasters under `dir` while generating.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> CardGenerator {
        self.debug_dir = Some(dir.into());
        self
    }

    fn dump<P>(&self, name: &str, img: &ImageBuffer<P, Vec<u8>>)
    where
        P: PixelWithColorType<Subpixel = u8>,
    {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let path = dir.join(format!("{name}.png"));
        let saved = fs::create_dir_all(dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| img.save(&path).map_err(anyhow::Error::from));
        match saved {
            Ok(()) => debug!("Wrote {}", path.display()),
            Err(e) => warn!("Could not write {}: {e}", path.display()),
        }
    }

    /// Runs one face from landmarks to styling. `None` means the face was
    /// rejected without an error.
    fn attempt(&self, index: usize, face: &RgbImage, styler: &FaceStyler) -> Result<Option<(ParsedFace, StyledFace)>> {
        let span = span!(Level::DEBUG, "face_attempt", index);
        let _guard = span.enter();

        let Some(raw) = self.landmarker.run(face)? else {
            info!("No landmarks found on face {index}");
            return Ok(None);
        };
        let (w, h) = face.dimensions();
        let aligned = align(face, &raw.scaled(&LEFT_EYE, w, h), &raw.scaled(&RIGHT_EYE, w, h))?;
        self.dump(&format!("face_{index}_aligned"), &aligned);

        let resized = self.resizer.resize_for_segmentation(&self.parser, &aligned)?;
        if !self.landmarker.validate(&resized)? {
            info!("Landmarks lost on face {index} after resizing");
            return Ok(None);
        }
        let normalized = self.resizer.normalize_neck_width(&self.landmarker, resized)?;

        if let Some(tilt) = &self.tilt {
            let features = generate_features(&normalized.landmarks)?;
            if !tilt.looks_forward(&features)? {
                info!("Face {index} does not look forward");
                return Ok(None);
            }
        }

        let parsed = self.parser.parse(&normalized.image, &normalized.landmarks)?;
        self.dump(&format!("face_{index}_regions"), &parsed.region_map);
        self.dump(&format!("face_{index}_face_only"), &parsed.face_only);

        let styled = styler.style(&parsed)?;
        self.dump(&format!("face_{index}_styled"), &styled.face);

        Ok(Some((parsed, styled)))
    }

    /// Generates the card as PNG bytes.
    pub fn generate(&self, parts: &GenerationParts) -> Result<Vec<u8>> {
        let code = &parts.player.code;
        let span = span!(Level::INFO, "generation", player = code.as_str());
        let _guard = span.enter();

        let faces = self.detector.run(&parts.photo, code)?;
        if faces.is_empty() {
            info!("{}", Error::DetectionEmpty);
        }

        let styler = FaceStyler::new(
            RenderPlan::standard()?,
            parts.palette(),
            parts.iris.clone(),
            self.styling.clone(),
        );

        for (index, face) in faces.iter().enumerate() {
            self.dump(&format!("face_{index}"), face);

            let (parsed, styled) = match self.attempt(index, face, &styler) {
                Ok(Some(done)) => done,
                Ok(None) => continue,
                Err(e) if Error::is_fatal(&e) => return Err(e),
                Err(e) => {
                    info!("Skipping face {index} of player {code}: {e}");
                    continue;
                }
            };

            let layers = self.shirt.compose(
                &parts.shirt,
                parts.club_colors(),
                &ShirtFace {
                    styled: &styled,
                    contours: &parsed.face_contours,
                    bottom_y: parsed.bottom_y,
                    skin: parts.colors.skin,
                },
            )?;
            self.dump("shirt", &layers.shirt);
            self.dump("crest", &layers.crest);

            return self.card.compose(parts, &layers);
        }

        let err = Error::Exhausted { player: code.clone() };
        error!("{err}");
        Err(err.into())
    }
}
