use super::point::Point;

/// Axis aligned box given by its edges. `right` and `bottom` are exclusive
/// when the box is used to crop.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_tl(x: i32, y: i32, w: u32, h: u32) -> Rect {
        Rect::new(x, y, x + w as i32, y + h as i32)
    }

    /// Smallest box holding every point, with the max coordinates as edges.
    pub fn bounding(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
        points.into_iter().fold(None, |acc, p| match acc {
            None => Some(Rect::new(p.x, p.y, p.x, p.y)),
            Some(r) => Some(Rect::new(
                r.left.min(p.x),
                r.top.min(p.y),
                r.right.max(p.x),
                r.bottom.max(p.y),
            )),
        })
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right, self.bottom)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl From<Rect> for image::math::Rect {
    fn from(r: Rect) -> image::math::Rect {
        image::math::Rect {
            x: r.left.max(0) as u32,
            y: r.top.max(0) as u32,
            width: r.width(),
            height: r.height(),
        }
    }
}
