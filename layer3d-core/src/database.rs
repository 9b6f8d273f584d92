use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::Cell;
use crate::geometry::{signed_area, Point};
use crate::LayerKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Cell '{0}' referenced but not defined")]
    UndefinedCell(String),

    #[error("Cell '{0}' references itself through its hierarchy")]
    RecursiveReference(String),

    #[error("Layout contains no cells")]
    EmptyLayout,
}

/// Outcome of top-cell selection.
#[derive(Debug, Clone, Copy)]
pub enum TopCell<'a> {
    /// The requested cell exists.
    Requested(&'a Cell),
    /// The requested cell was missing (or none was requested); the largest cell was chosen.
    Largest(&'a Cell),
}

impl<'a> TopCell<'a> {
    pub fn cell(&self) -> &'a Cell {
        match self {
            TopCell::Requested(c) | TopCell::Largest(c) => c,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TopCell::Largest(_))
    }
}

/// A layout library: every cell read from one layout file, in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDatabase {
    /// Library name.
    pub name: String,
    /// Size of one user unit in meters.
    pub user_unit_m: f64,
    cells: Vec<Cell>,
}

impl LayoutDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            user_unit_m: 1e-6,
            cells: Vec::new(),
        }
    }

    // ── Cell management ──────────────────────────────────────────────

    /// Add a cell. A cell with the same name replaces the earlier definition in place.
    pub fn add_cell(&mut self, cell: Cell) {
        match self.cells.iter_mut().find(|c| c.name == cell.name) {
            Some(existing) => *existing = cell,
            None => self.cells.push(cell),
        }
    }

    pub fn find_cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.name == name)
    }

    pub fn cell_names(&self) -> Vec<&str> {
        self.cells.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    // ── Hierarchy queries ────────────────────────────────────────────

    /// Polygon rings of `cell` on `layer`, with subcell references flattened.
    ///
    /// The cell's own geometry comes first in insertion order, followed by each
    /// reference's polygons (depth-first, in reference order).
    pub fn polygons(&self, cell: &Cell, layer: LayerKey) -> Result<Vec<Vec<Point>>, LayoutError> {
        let mut stack = Vec::new();
        self.collect(cell, &|c: &Cell| c.local_rings(layer), &mut stack)
    }

    /// Planar area of `cell`: the summed absolute area of every polygon on
    /// every layer, references included.
    pub fn area(&self, cell: &Cell) -> Result<f64, LayoutError> {
        let mut stack = Vec::new();
        let rings = self.collect(cell, &|c: &Cell| c.all_local_rings(), &mut stack)?;
        Ok(rings.iter().map(|r| signed_area(r).abs()).sum())
    }

    fn collect<'a>(
        &'a self,
        cell: &'a Cell,
        local: &dyn Fn(&Cell) -> Vec<Vec<Point>>,
        stack: &mut Vec<&'a str>,
    ) -> Result<Vec<Vec<Point>>, LayoutError> {
        if stack.contains(&cell.name.as_str()) {
            return Err(LayoutError::RecursiveReference(cell.name.clone()));
        }
        stack.push(&cell.name);

        let mut rings = local(cell);
        for inst in &cell.instances {
            let child = self
                .find_cell_by_name(&inst.cell_name)
                .ok_or_else(|| LayoutError::UndefinedCell(inst.cell_name.clone()))?;
            for ring in self.collect(child, local, stack)? {
                rings.push(ring.iter().map(|p| inst.transform.apply(p)).collect());
            }
        }

        stack.pop();
        Ok(rings)
    }

    /// Pick the cell to render.
    ///
    /// Falls back to the cell with the largest planar area when `requested` is
    /// `None` or names no cell; ties go to the first cell in file order.
    pub fn select_top_cell(&self, requested: Option<&str>) -> Result<TopCell<'_>, LayoutError> {
        if let Some(cell) = requested.and_then(|name| self.find_cell_by_name(name)) {
            return Ok(TopCell::Requested(cell));
        }

        let mut best: Option<(&Cell, f64)> = None;
        for cell in &self.cells {
            let area = self.area(cell)?;
            match best {
                Some((_, best_area)) if area <= best_area => {}
                _ => best = Some((cell, area)),
            }
        }
        best.map(|(cell, _)| TopCell::Largest(cell))
            .ok_or(LayoutError::EmptyLayout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellInstance, Transform};
    use crate::geometry::{GeomPrimitive, Rect};

    fn rect_cell(name: &str, w: f64) -> Cell {
        let mut cell = Cell::new(name);
        cell.add_geometry(GeomPrimitive::Rect(Rect::new((1, 0), 0.0, 0.0, w, 1.0)));
        cell
    }

    #[test]
    fn test_database_create() {
        let db = LayoutDatabase::new("test_project");
        assert_eq!(db.name, "test_project");
        assert_eq!(db.cell_count(), 0);
        assert_eq!(db.select_top_cell(None).unwrap_err(), LayoutError::EmptyLayout);
    }

    #[test]
    fn test_add_and_find_cell() {
        let mut db = LayoutDatabase::new("test");
        db.add_cell(Cell::new("inverter"));
        assert_eq!(db.cell_count(), 1);
        assert_eq!(db.find_cell_by_name("inverter").unwrap().name, "inverter");
        db.add_cell(rect_cell("inverter", 2.0));
        assert_eq!(db.cell_count(), 1);
        assert_eq!(db.find_cell_by_name("inverter").unwrap().geometry_count(), 1);
    }

    #[test]
    fn test_flattened_polygons_follow_references() {
        let mut db = LayoutDatabase::new("lib");
        db.add_cell(rect_cell("leaf", 1.0));
        let mut top = rect_cell("top", 2.0);
        top.add_instance(CellInstance::new("leaf", Transform::translate(10.0, 0.0)));
        db.add_cell(top);

        let top = db.find_cell_by_name("top").unwrap();
        let rings = db.polygons(top, (1, 0)).unwrap();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[1][0], Point::new(10.0, 0.0));
        assert!((db.area(top).unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_undefined_and_recursive_references() {
        let mut db = LayoutDatabase::new("lib");
        let mut a = rect_cell("a", 1.0);
        a.add_instance(CellInstance::new("missing", Transform::default()));
        db.add_cell(a);
        let a = db.find_cell_by_name("a").unwrap();
        assert_eq!(
            db.polygons(a, (1, 0)).unwrap_err(),
            LayoutError::UndefinedCell("missing".into())
        );

        let mut db = LayoutDatabase::new("lib");
        let mut a = rect_cell("a", 1.0);
        a.add_instance(CellInstance::new("a", Transform::default()));
        db.add_cell(a);
        let a = db.find_cell_by_name("a").unwrap();
        assert!(matches!(
            db.area(a),
            Err(LayoutError::RecursiveReference(_))
        ));
    }

    #[test]
    fn test_top_cell_selection() {
        let mut db = LayoutDatabase::new("lib");
        db.add_cell(rect_cell("small", 1.0));
        db.add_cell(rect_cell("big", 5.0));
        db.add_cell(rect_cell("big_too", 5.0));

        let chosen = db.select_top_cell(Some("small")).unwrap();
        assert!(!chosen.is_fallback());
        assert_eq!(chosen.cell().name, "small");

        // Missing name falls back to the largest; ties go to the first one.
        let chosen = db.select_top_cell(Some("nope")).unwrap();
        assert!(chosen.is_fallback());
        assert_eq!(chosen.cell().name, "big");
        assert_eq!(db.select_top_cell(None).unwrap().cell().name, "big");
    }
}
