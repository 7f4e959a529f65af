pub mod card;
pub mod colorimetry;
pub mod config;
pub mod error;
pub mod generation;
pub mod parts;
pub mod pipeline;
pub mod raster;
pub mod shapes;
pub mod shirt;
pub mod styling;
pub mod tilt;

pub use error::Error;
pub use generation::CardGenerator;
