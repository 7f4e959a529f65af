//! Face stages ahead of styling: detection, landmarks, alignment, resizing
//! and parsing, each behind the [`model::Inference`] seam where a network
//! is involved.

pub mod aligner;
pub mod detection;
pub mod landmarks;
pub mod model;
pub mod parsing;
pub mod resizing;
