use serde::{Deserialize, Serialize};

use crate::LayerKey;

/// A 2D point in layout user units (typically micrometers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Direction vector from `self` to `to`.
    pub fn to(&self, to: &Point) -> Point {
        Point::new(to.x - self.x, to.y - self.y)
    }

    /// 2D cross product (z-component of the 3D cross product) of two vectors.
    pub fn cross(&self, other: &Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Signed shoelace area of a closed ring. Positive for counter-clockwise traversal.
pub fn signed_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for (i, p) in ring.iter().enumerate() {
        let q = &ring[(i + 1) % ring.len()];
        acc += p.cross(q);
    }
    acc / 2.0
}

/// A rectangle defined by lower-left and upper-right corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub layer: LayerKey,
    pub lower_left: Point,
    pub upper_right: Point,
}

impl Rect {
    pub fn new(layer: LayerKey, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            layer,
            lower_left: Point::new(x1.min(x2), y1.min(y2)),
            upper_right: Point::new(x1.max(x2), y1.max(y2)),
        }
    }

    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    /// Corner ring, counter-clockwise from the lower-left corner.
    pub fn ring(&self) -> Vec<Point> {
        let ll = self.lower_left;
        let ur = self.upper_right;
        vec![
            ll,
            Point::new(ur.x, ll.y),
            ur,
            Point::new(ll.x, ur.y),
        ]
    }
}

/// A polygon defined by a list of vertices, without the repeated closing vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub layer: LayerKey,
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(layer: LayerKey, vertices: Vec<Point>) -> Self {
        Self { layer, vertices }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// A path (wire) defined by a centerline and width, with flush ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub layer: LayerKey,
    pub points: Vec<Point>,
    pub width: f64,
}

impl Path {
    pub fn new(layer: LayerKey, points: Vec<Point>, width: f64) -> Self {
        Self {
            layer,
            points,
            width,
        }
    }

    /// Outline of the path as a closed ring, with mitred joins.
    ///
    /// Returns `None` for zero-width paths and paths with fewer than two distinct points.
    pub fn outline(&self) -> Option<Vec<Point>> {
        let mut pts: Vec<Point> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            if pts.last() != Some(p) {
                pts.push(*p);
            }
        }
        if pts.len() < 2 || self.width <= 0.0 {
            return None;
        }

        let half = self.width / 2.0;
        let normals: Vec<Point> = pts
            .windows(2)
            .map(|w| {
                let d = w[0].to(&w[1]);
                let len = d.length();
                Point::new(-d.y / len, d.x / len)
            })
            .collect();

        let mut left = Vec::with_capacity(pts.len());
        let mut right = Vec::with_capacity(pts.len());
        for (k, p) in pts.iter().enumerate() {
            let offset = if k == 0 {
                normals[0]
            } else if k == pts.len() - 1 {
                normals[k - 1]
            } else {
                miter(&normals[k - 1], &normals[k])
            };
            left.push(p.translate(offset.x * half, offset.y * half));
            right.push(p.translate(-offset.x * half, -offset.y * half));
        }

        right.reverse();
        left.extend(right);
        Some(left)
    }
}

/// Miter direction at a join, scaled so that its projection on either normal is 1.
fn miter(n0: &Point, n1: &Point) -> Point {
    let sum = Point::new(n0.x + n1.x, n0.y + n1.y);
    let len = sum.length();
    if len < 1e-12 {
        // Full reversal; no finite miter exists.
        return *n1;
    }
    let m = Point::new(sum.x / len, sum.y / len);
    let scale = 1.0 / m.dot(n1);
    Point::new(m.x * scale, m.y * scale)
}

/// A geometric primitive in a layout cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeomPrimitive {
    Rect(Rect),
    Polygon(Polygon),
    Path(Path),
}

impl GeomPrimitive {
    pub fn layer(&self) -> LayerKey {
        match self {
            GeomPrimitive::Rect(r) => r.layer,
            GeomPrimitive::Polygon(p) => p.layer,
            GeomPrimitive::Path(p) => p.layer,
        }
    }

    /// Boundary ring of the primitive, in the order it was stored.
    pub fn ring(&self) -> Option<Vec<Point>> {
        match self {
            GeomPrimitive::Rect(r) => Some(r.ring()),
            GeomPrimitive::Polygon(p) => Some(p.vertices.clone()),
            GeomPrimitive::Path(p) => p.outline(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_rect_ring_area() {
        let r = Rect::new((0, 0), 0.0, 0.0, 10.0, 5.0);
        assert!((r.width() * r.height() - 50.0).abs() < 1e-10);
        assert!((signed_area(&r.ring()) - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        let mut cw = ccw.clone();
        cw.reverse();
        assert!((signed_area(&ccw) - 4.0).abs() < 1e-10);
        assert!((signed_area(&cw) + 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_straight_path_outline() {
        let path = Path::new(
            (1, 0),
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
            2.0,
        );
        let ring = path.outline().unwrap();
        assert_eq!(ring.len(), 4);
        assert!((signed_area(&ring).abs() - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_bent_path_outline_is_mitred() {
        let path = Path::new(
            (1, 0),
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ],
            2.0,
        );
        let ring = path.outline().unwrap();
        assert_eq!(ring.len(), 6);
        // Both corners of the bend sit on the miter.
        let near = |q: Point| ring.iter().any(|p| p.distance_to(&q) < 1e-9);
        assert!(near(Point::new(11.0, -1.0)));
        assert!(near(Point::new(9.0, 1.0)));
    }

    #[test]
    fn test_degenerate_path_has_no_outline() {
        let path = Path::new((1, 0), vec![Point::new(1.0, 1.0), Point::new(1.0, 1.0)], 2.0);
        assert!(path.outline().is_none());
        let path = Path::new((1, 0), vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)], 0.0);
        assert!(path.outline().is_none());
    }
}
