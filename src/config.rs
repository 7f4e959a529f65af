use crate::error::Error;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    pub landmarks: LandmarksConfig,
    pub resizing: ResizingConfig,
    pub styling: StylingConfig,
    pub shirt: ShirtConfig,
    pub tilt: TiltConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    pub threads: usize,
    pub detector: ModelSource,
    pub landmarker: ModelSource,
    pub parser: ModelSource,
    /// Base URL the tilt classifiers are fetched from, one file per classifier.
    pub tilt_url_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSource {
    pub file: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_confidence: f32,
    pub upscale: f32,
    /// Run the detector at a fixed square size instead of the source resolution.
    pub input_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarksConfig {
    pub input_size: u32,
    pub min_presence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizingConfig {
    pub parsing_width: u32,
    pub neck_width_reference: i32,
    pub neck_width_tolerance: i32,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylingConfig {
    pub hair_min_pixels: usize,
    pub beard_min_average: u32,
    pub beard_max_ratio: f64,
    pub beard_min_area: usize,
    pub neck_margin: i32,
    pub neck_shade: i32,
    pub eye_shade: i32,
    pub nose_shade: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShirtConfig {
    pub default_neck_height: i32,
    pub pec_dark: i32,
    pub pec_darker: i32,
    /// Overrides the collar's left x, otherwise taken from the jersey neck marker.
    pub collar_left: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TiltConfig {
    pub enabled: bool,
    pub forward_label: i64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./models"),
            threads: 2,
            detector: ModelSource::local("res10_300x300_ssd_iter_140000.onnx"),
            landmarker: ModelSource::local("face_landmarks_detector.onnx"),
            parser: ModelSource::local("face_parsing_bisenet.onnx"),
            tilt_url_base: None,
        }
    }
}

impl ModelSource {
    pub fn local(file: &str) -> Self {
        Self {
            file: file.to_string(),
            url: None,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            upscale: 0.2,
            input_size: None,
        }
    }
}

impl Default for LandmarksConfig {
    fn default() -> Self {
        Self {
            input_size: 256,
            min_presence: 0.5,
        }
    }
}

impl Default for ResizingConfig {
    fn default() -> Self {
        Self {
            parsing_width: 512,
            neck_width_reference: 170,
            neck_width_tolerance: 2,
            max_iterations: 25,
        }
    }
}

impl Default for StylingConfig {
    fn default() -> Self {
        Self {
            hair_min_pixels: 15000,
            beard_min_average: 20,
            beard_max_ratio: 5.0,
            beard_min_area: 50,
            neck_margin: 75,
            neck_shade: 4,
            eye_shade: 10,
            nose_shade: 8,
        }
    }
}

impl Default for ShirtConfig {
    fn default() -> Self {
        Self {
            default_neck_height: 60,
            pec_dark: 10,
            pec_darker: 20,
            collar_left: None,
        }
    }
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            forward_label: 2,
        }
    }
}

impl Config {
    /// Loads the configuration at `path`, falling back to defaults when no
    /// path is given. Missing fields take their default values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No configuration file given, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            return Err(Error::Config(format!("{} does not exist", path.display())).into());
        }

        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str::<Config>(&content)
            .map_err(|e| Error::Config(format!("could not parse {}: {e}", path.display())))?;
        info!("Loaded configuration from {}", path.display());

        Ok(config)
    }
}
