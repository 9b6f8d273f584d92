use serde::{Deserialize, Serialize};

use crate::geometry::{GeomPrimitive, Point};
use crate::LayerKey;

/// A transformation for placing subcell instances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation offset.
    pub offset: Point,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f64,
    /// Mirror about X axis, applied before rotation.
    pub mirror_x: bool,
    /// Uniform scale factor (typically 1.0).
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0.0, 0.0),
            rotation: 0.0,
            mirror_x: false,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut p = *point;

        p.x *= self.scale;
        p.y *= self.scale;

        if self.mirror_x {
            p.y = -p.y;
        }

        // Exact quarter turns keep Manhattan geometry on-grid.
        let (sin_r, cos_r) = match self.rotation.rem_euclid(360.0) {
            r if r == 0.0 => (0.0, 1.0),
            r if r == 90.0 => (1.0, 0.0),
            r if r == 180.0 => (0.0, -1.0),
            r if r == 270.0 => (-1.0, 0.0),
            r => r.to_radians().sin_cos(),
        };
        let rx = p.x * cos_r - p.y * sin_r;
        let ry = p.x * sin_r + p.y * cos_r;

        Point::new(rx + self.offset.x, ry + self.offset.y)
    }
}

/// A reference to a subcell placed within a parent cell, resolved by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInstance {
    pub cell_name: String,
    pub transform: Transform,
}

impl CellInstance {
    pub fn new(cell_name: &str, transform: Transform) -> Self {
        Self {
            cell_name: cell_name.to_string(),
            transform,
        }
    }
}

/// A layout cell containing geometric primitives and subcell references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub geometries: Vec<GeomPrimitive>,
    pub instances: Vec<CellInstance>,
}

impl Cell {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            geometries: Vec::new(),
            instances: Vec::new(),
        }
    }

    pub fn add_geometry(&mut self, geom: GeomPrimitive) {
        self.geometries.push(geom);
    }

    pub fn add_instance(&mut self, instance: CellInstance) {
        self.instances.push(instance);
    }

    /// Boundary rings of this cell's own geometry on `layer`, in insertion order.
    /// Subcell references are not followed; see [`crate::LayoutDatabase::polygons`].
    pub fn local_rings(&self, layer: LayerKey) -> Vec<Vec<Point>> {
        self.geometries
            .iter()
            .filter(|g| g.layer() == layer)
            .filter_map(|g| g.ring())
            .collect()
    }

    /// Boundary rings of this cell's own geometry on every layer.
    pub fn all_local_rings(&self) -> Vec<Vec<Point>> {
        self.geometries.iter().filter_map(|g| g.ring()).collect()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}
