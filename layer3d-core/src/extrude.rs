use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{signed_area, BBox, Point};
use crate::winding::PlanarShape;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Extrusion height must be positive and finite, got {0}")]
    NonPositiveHeight(f64),

    #[error("Extrusion base must be finite, got {0}")]
    NonFiniteBase(f64),

    #[error("Degenerate shell: {distinct} distinct vertices, area {area}")]
    DegenerateShell { distinct: usize, area: f64 },

    #[error("Cap triangulation failed: {0}")]
    Triangulation(String),
}

/// A closed triangle mesh. Triangles are wound counter-clockwise when seen
/// from outside the solid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solid {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl Solid {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        Some((min, max))
    }

    /// Extent along Z as `[min, max]`.
    pub fn z_extent(&self) -> Option<[f64; 2]> {
        self.bounds().map(|(min, max)| [min[2], max[2]])
    }

    /// Unit normal of triangle `i`.
    pub fn face_normal(&self, i: usize) -> [f64; 3] {
        let [a, b, c] = self.triangles[i].map(|v| self.vertices[v as usize]);
        let u = sub(b, a);
        let v = sub(c, a);
        let n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len == 0.0 {
            return [0.0, 0.0, 0.0];
        }
        n.map(|c| c / len)
    }

    /// Enclosed volume. Positive when faces are wound outward.
    pub fn volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|v| self.vertices[v as usize]);
                a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
                    + a[2] * (b[0] * c[1] - b[1] * c[0])
            })
            .sum::<f64>()
            / 6.0
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Extrude `shape` into a solid spanning `[zbase, zbase + height]`.
///
/// Side walls follow the shell and the hole; both caps are ear-clipped with
/// the hole as an interior ring. A hole is only subtracted when every one of
/// its vertices lies strictly inside the shell; any other hole would overlap
/// the outer boundary and is left out of the solid.
pub fn extrude(shape: &PlanarShape, zbase: f64, height: f64) -> Result<Solid, GeometryError> {
    if !height.is_finite() || height <= 0.0 {
        return Err(GeometryError::NonPositiveHeight(height));
    }
    if !zbase.is_finite() {
        return Err(GeometryError::NonFiniteBase(zbase));
    }

    let mut shell = clean_ring(&shape.shell);
    let shell_area = signed_area(&shell);
    if shell.len() < 3 || is_negligible(shell_area, &shell) {
        return Err(GeometryError::DegenerateShell {
            distinct: shell.len(),
            area: shell_area.abs(),
        });
    }
    if shell_area < 0.0 {
        shell.reverse();
    }

    let hole = shape
        .hole
        .as_deref()
        .map(clean_ring)
        .filter(|h| fits_inside(h, &shell))
        .map(|mut h| {
            if signed_area(&h) > 0.0 {
                h.reverse();
            }
            h
        });
    if shape.hole.is_some() && hole.is_none() {
        log::debug!("Dropping hole ring that is not strictly inside its shell");
    }

    let mut rings = vec![shell];
    rings.extend(hole);

    // Flat 2D coordinates and hole start indices, as earcut expects.
    let mut coords = Vec::new();
    let mut hole_starts = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            hole_starts.push(coords.len() / 2);
        }
        coords.extend(ring.iter().flat_map(|p| [p.x, p.y]));
    }
    let cap = earcutr::earcut(&coords, &hole_starts, 2)
        .map_err(|e| GeometryError::Triangulation(format!("{:?}", e)))?;
    if cap.is_empty() || cap.len() % 3 != 0 {
        return Err(GeometryError::Triangulation(format!(
            "{} indices for {} vertices",
            cap.len(),
            coords.len() / 2
        )));
    }

    let n = coords.len() / 2;
    let ztop = zbase + height;
    let mut vertices = Vec::with_capacity(2 * n);
    for z in [zbase, ztop] {
        vertices.extend(coords.chunks_exact(2).map(|c| [c[0], c[1], z]));
    }

    let mut triangles = Vec::with_capacity(cap.len() / 3 * 2 + 2 * n * 2);
    for tri in cap.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]];
        let ccw = Point::new(coords[2 * a], coords[2 * a + 1])
            .to(&Point::new(coords[2 * b], coords[2 * b + 1]))
            .cross(
                &Point::new(coords[2 * a], coords[2 * a + 1])
                    .to(&Point::new(coords[2 * c], coords[2 * c + 1])),
            )
            > 0.0;
        let (a, b, c) = if ccw { (a, b, c) } else { (a, c, b) };
        // Bottom faces down, top faces up.
        triangles.push([a as u32, c as u32, b as u32]);
        triangles.push([(a + n) as u32, (b + n) as u32, (c + n) as u32]);
    }

    // Shell runs counter-clockwise and the hole clockwise, so the right-hand
    // side of every boundary edge faces out of the material.
    let mut start = 0;
    for ring in &rings {
        let len = ring.len();
        for i in 0..len {
            let b0 = (start + i) as u32;
            let b1 = (start + (i + 1) % len) as u32;
            let t0 = b0 + n as u32;
            let t1 = b1 + n as u32;
            triangles.push([b0, b1, t1]);
            triangles.push([b0, t1, t0]);
        }
        start += len;
    }

    Ok(Solid {
        vertices,
        triangles,
    })
}

/// Drop consecutive duplicates, including a repeated closing vertex.
fn clean_ring(ring: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(ring.len());
    for p in ring {
        if out.last() != Some(p) {
            out.push(*p);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Area too small, relative to the ring's extent, to be anything but collinear.
fn is_negligible(area: f64, ring: &[Point]) -> bool {
    let Some(bbox) = BBox::from_points(ring) else {
        return true;
    };
    let span = bbox.width().max(bbox.height());
    area.abs() <= span * span * 1e-12
}

/// Every hole vertex sits strictly inside the shell: not on a shell vertex,
/// not on a shell edge, and inside by the even-odd rule.
fn fits_inside(hole: &[Point], shell: &[Point]) -> bool {
    let area = signed_area(hole);
    if hole.len() < 3 || is_negligible(area, hole) {
        return false;
    }
    let Some(bbox) = BBox::from_points(shell) else {
        return false;
    };
    let tolerance = bbox.width().max(bbox.height()) * 1e-9;
    hole.iter()
        .all(|p| !on_boundary(shell, p, tolerance) && contains_point(shell, p))
}

/// `p` lies within `tolerance` of some edge of the closed ring.
fn on_boundary(ring: &[Point], p: &Point, tolerance: f64) -> bool {
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        if segment_distance(&ring[j], &ring[i], p) <= tolerance {
            return true;
        }
        j = i;
    }
    false
}

fn segment_distance(a: &Point, b: &Point, p: &Point) -> f64 {
    let ab = a.to(b);
    let ap = a.to(p);
    let len2 = ab.x * ab.x + ab.y * ab.y;
    let t = if len2 == 0.0 {
        0.0
    } else {
        ((ap.x * ab.x + ap.y * ab.y) / len2).clamp(0.0, 1.0)
    };
    let dx = ap.x - ab.x * t;
    let dy = ap.y - ab.y * t;
    (dx * dx + dy * dy).sqrt()
}

/// Even-odd point-in-polygon test.
fn contains_point(ring: &[Point], p: &Point) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}
