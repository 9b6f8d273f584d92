//! Boundary winding classification and shell/hole assembly.
//!
//! A layout polygon arrives as one boundary traversal. Shapes with holes are
//! stored as a single traversal that walks into the hole and back out, so the
//! hole has to be recovered from the turns the traversal makes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geometry::{signed_area, Point};

/// Turn direction between two consecutive edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    /// Cross product of the edge directions is `<= 0`: a convex corner of a
    /// clockwise traversal.
    CounterClockwise,
    /// Cross product is `> 0`: a concave corner.
    Clockwise,
}

/// A directed boundary edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: Point,
    pub to: Point,
}

impl Edge {
    pub fn direction(&self) -> Point {
        self.from.to(&self.to)
    }

    fn bits(&self) -> [u64; 4] {
        let [fx, fy] = point_bits(&self.from);
        let [tx, ty] = point_bits(&self.to);
        [fx, fy, tx, ty]
    }
}

/// Two consecutive edges and the turn between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePair {
    pub first: Edge,
    pub second: Edge,
    pub turn: Turn,
}

/// Classify the turn from `e1` into `e2`.
pub fn classify_turn(e1: &Edge, e2: &Edge) -> Turn {
    if e1.direction().cross(&e2.direction()) <= 0.0 {
        Turn::CounterClockwise
    } else {
        Turn::Clockwise
    }
}

/// Classify every pair of consecutive edges of a boundary traversal.
///
/// Rings with positive signed area are reversed first, so classification
/// always runs on a clockwise traversal. Edges join vertices `i` and `i + 1`
/// only; the closing edge from the last vertex back to the first is not
/// part of the edge list.
pub fn classify_ring(ring: &[Point]) -> Vec<EdgePair> {
    let mut ring = ring.to_vec();
    if signed_area(&ring) > 0.0 {
        ring.reverse();
    }

    let edges: Vec<Edge> = ring
        .windows(2)
        .map(|w| Edge { from: w[0], to: w[1] })
        .collect();

    edges
        .windows(2)
        .map(|w| EdgePair {
            first: w[0],
            second: w[1],
            turn: classify_turn(&w[0], &w[1]),
        })
        .collect()
}

/// A planar shape: one outer shell and at most one hole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanarShape {
    pub shell: Vec<Point>,
    pub hole: Option<Vec<Point>>,
}

/// Build the shell and the hole from classified edge pairs.
///
/// The shell is every vertex touched by a counter-clockwise pair, in
/// first-seen order. The hole is every vertex touched by a clockwise pair,
/// taken from the deduplicated edge list in reverse. All clockwise turns
/// feed one combined hole loop; a hole with fewer than three vertices is
/// dropped.
pub fn assemble(pairs: &[EdgePair]) -> PlanarShape {
    let shell_edges = unique_edges(pairs, Turn::CounterClockwise);
    let shell = unique_vertices(shell_edges.iter());

    let mut hole_edges = unique_edges(pairs, Turn::Clockwise);
    hole_edges.reverse();
    let hole = unique_vertices(hole_edges.iter());

    PlanarShape {
        shell,
        hole: (hole.len() >= 3).then_some(hole),
    }
}

/// Classify and assemble in one step.
pub fn shape_from_ring(ring: &[Point]) -> PlanarShape {
    assemble(&classify_ring(ring))
}

fn unique_edges(pairs: &[EdgePair], turn: Turn) -> Vec<Edge> {
    let mut seen = HashSet::new();
    pairs
        .iter()
        .filter(|p| p.turn == turn)
        .flat_map(|p| [p.first, p.second])
        .filter(|e| seen.insert(e.bits()))
        .collect()
}

fn unique_vertices<'a>(edges: impl Iterator<Item = &'a Edge>) -> Vec<Point> {
    let mut seen = HashSet::new();
    edges
        .flat_map(|e| [e.from, e.to])
        .filter(|p| seen.insert(point_bits(p)))
        .collect()
}

/// Hashable identity of a point; `-0.0` and `0.0` compare equal.
fn point_bits(p: &Point) -> [u64; 2] {
    [(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits()]
}
