use super::point::Point;
use super::rect::Rect;

/// Closed integer polyline, as traced around a region of a mask or built
/// from landmark points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLocation {
    Inside,
    OnEdge,
    Outside,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::bounding(self.points.iter().copied())
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Contour {
        Contour::new(self.points.iter().map(|p| p.offset(dx, dy)).collect())
    }

    pub fn max_y(&self) -> Option<i32> {
        self.points.iter().map(|p| p.y).max()
    }

    pub fn min_y(&self) -> Option<i32> {
        self.points.iter().map(|p| p.y).min()
    }

    pub fn contains(&self, point: Point) -> bool {
        self.locate(point) != PointLocation::Outside
    }

    pub fn locate(&self, point: Point) -> PointLocation {
        let n = self.points.len();
        if n == 0 {
            return PointLocation::Outside;
        }

        if self.on_boundary(point) {
            return PointLocation::OnEdge;
        }
        if n < 3 {
            return PointLocation::Outside;
        }

        // Ray casting for interior points
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = self.points[i];
            let vj = self.points[j];

            if ((vi.y > point.y) != (vj.y > point.y)) && left_of_edge(point, vi, vj) {
                inside = !inside;
            }
            j = i;
        }

        if inside {
            PointLocation::Inside
        } else {
            PointLocation::Outside
        }
    }

    fn on_boundary(&self, point: Point) -> bool {
        let n = self.points.len();
        if self.points.contains(&point) {
            return true;
        }

        (0..n).any(|i| on_edge(point, self.points[i], self.points[(i + 1) % n]))
    }

    /// Vertices in the form imageproc's polygon drawing expects: consecutive
    /// duplicates dropped and the ring left open.
    pub fn ring(&self) -> Vec<imageproc::point::Point<i32>> {
        let mut ring: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            let p: imageproc::point::Point<i32> = (*p).into();
            if ring.last() != Some(&p) {
                ring.push(p);
            }
        }
        while ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        ring
    }
}

impl From<Vec<Point>> for Contour {
    fn from(points: Vec<Point>) -> Self {
        Contour::new(points)
    }
}

fn on_edge(point: Point, p1: Point, p2: Point) -> bool {
    let cross = (point.y - p1.y) as i64 * (p2.x - p1.x) as i64
        - (point.x - p1.x) as i64 * (p2.y - p1.y) as i64;
    if cross != 0 {
        return false;
    }

    point.x >= p1.x.min(p2.x)
        && point.x <= p1.x.max(p2.x)
        && point.y >= p1.y.min(p2.y)
        && point.y <= p1.y.max(p2.y)
}

fn left_of_edge(point: Point, p1: Point, p2: Point) -> bool {
    // (point.x - p1.x) * dy < dx * (point.y - p1.y), kept in integers
    let dx = (p2.x - p1.x) as i64;
    let dy = (p2.y - p1.y) as i64;
    if dy == 0 {
        return false;
    }

    let lhs = (point.x - p1.x) as i64 * dy;
    let rhs = dx * (point.y - p1.y) as i64;
    if dy > 0 { lhs < rhs } else { lhs > rhs }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_point() {
        let contour = Contour::new(vec![Point::new(0, 0), Point::new(3, 0), Point::new(3, 3)]);
        /*
        3 n n n y
        2 n n y y
        1 n y y y
        0 y y y y
          0 1 2 3
        */

        assert!(contour.contains(Point::new(0, 0)));
        assert!(contour.contains(Point::new(2, 1)));
        assert!(contour.contains(Point::new(1, 1)));
        assert!(contour.contains(Point::new(3, 2)));
        assert!(contour.contains(Point::new(3, 3)));

        assert!(!contour.contains(Point::new(4, 4)));
        assert!(!contour.contains(Point::new(0, 1)));
        assert!(!contour.contains(Point::new(1, 2)));
    }

    #[test]
    fn test_locate() {
        let square = Contour::new(vec![
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 4),
            Point::new(0, 4),
        ]);

        assert_eq!(square.locate(Point::new(2, 2)), PointLocation::Inside);
        assert_eq!(square.locate(Point::new(4, 2)), PointLocation::OnEdge);
        assert_eq!(square.locate(Point::new(0, 0)), PointLocation::OnEdge);
        assert_eq!(square.locate(Point::new(5, 2)), PointLocation::Outside);
    }

    #[test]
    fn test_ring_drops_duplicates() {
        let contour = Contour::new(vec![
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(2, 0),
            Point::new(2, 2),
            Point::new(0, 0),
        ]);

        assert_eq!(contour.ring().len(), 3);
    }
}
