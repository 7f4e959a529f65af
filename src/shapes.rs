pub mod point;
pub mod polygon;
pub mod rect;

pub use point::Point;
pub use polygon::{Contour, PointLocation};
pub use rect::Rect;
