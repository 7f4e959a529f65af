use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no face detected")]
    DetectionEmpty,

    #[error("no landmarks found for face")]
    LandmarkMiss,

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("landmarks lost while resizing face")]
    ResizeLandmarkLoss,

    #[error("segmentation error: {0}")]
    Segmentation(String),

    #[error("could not render {region}: {reason}")]
    Render { region: String, reason: String },

    #[error("could not generate NFT for player {player}")]
    Exhausted { player: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn render(region: impl ToString, reason: impl ToString) -> Self {
        Error::Render {
            region: region.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Errors that should abort the whole request instead of moving on to
    /// the next detected face.
    pub fn is_fatal(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<Error>(), Some(Error::Config(_)))
    }
}
