use crate::config::ModelSource;
use crate::error::Error;
use anyhow::Result;
use ndarray::ArrayD;
use ort::execution_providers;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, span, Level};

/// Anything that turns one input tensor into output tensors. Detectors,
/// landmarkers, parsers and tilt classifiers all go through this.
pub trait Inference {
    fn infer(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>>;
}

pub struct OrtModel {
    session: Session,
    input: String,
    outputs: Vec<String>,
}

/// Registers the execution providers once for the process.
pub fn init_runtime() -> Result<()> {
    ort::init()
        .with_execution_providers([execution_providers::XNNPACKExecutionProvider::default().build()])
        .commit()?;
    Ok(())
}

pub fn initialize_model(model_file_path: &Path, threads: usize) -> Result<Session> {
    let model = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(threads.max(1))?
        .commit_from_file(model_file_path)?;

    Ok(model)
}

impl OrtModel {
    pub fn load(path: &Path, threads: usize) -> Result<OrtModel> {
        let session = initialize_model(path, threads)?;
        let input = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| Error::Config(format!("{} declares no input", path.display())))?;
        let outputs = session.outputs.iter().map(|o| o.name.clone()).collect();
        debug!("Loaded {} ({input} -> {outputs:?})", path.display());

        Ok(OrtModel {
            session,
            input,
            outputs,
        })
    }
}

impl Inference for OrtModel {
    fn infer(&self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input.as_str() => tensor]?)?;

        let mut results = Vec::with_capacity(self.outputs.len());
        for name in &self.outputs {
            let value = &outputs[name.as_str()];
            let array = match value.try_extract_tensor::<f32>() {
                Ok(view) => view.to_owned(),
                // classifiers report labels as integers
                Err(_) => value.try_extract_tensor::<i64>()?.mapv(|v| v as f32),
            };
            results.push(array);
        }

        Ok(results)
    }
}

/// Resolves model files under a directory, downloading missing ones.
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> ModelStore {
        ModelStore { dir: dir.into() }
    }

    pub fn ensure(&self, source: &ModelSource) -> Result<PathBuf> {
        let path = self.dir.join(&source.file);
        if path.exists() {
            return Ok(path);
        }

        let url = validate_url(source)?;

        let span = span!(Level::INFO, "model_download");
        let _guard = span.enter();
        info!("Downloading {} from {url}", source.file);

        fs::create_dir_all(&self.dir)?;
        let bytes = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
        fs::write(&path, &bytes)?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());

        Ok(path)
    }
}

fn validate_url(source: &ModelSource) -> Result<reqwest::Url> {
    let Some(raw) = source.url.as_deref() else {
        let err = Error::Config(format!("model {} is missing and has no url", source.file));
        error!("{err}");
        return Err(err.into());
    };

    match reqwest::Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(url),
        Ok(url) => {
            let err = Error::Config(format!("unsupported scheme {} for {}", url.scheme(), source.file));
            error!("{err}");
            Err(err.into())
        }
        Err(e) => {
            let err = Error::Config(format!("invalid url {raw:?} for {}: {e}", source.file));
            error!("{err}");
            Err(err.into())
        }
    }
}
