//! # layer3d Core
//!
//! Layout cells and their polygon hierarchy, the technology layer stack with
//! via placement resolution, and the geometry engine that turns a polygon
//! boundary into an extruded 3D solid, plus the scene graph those solids are
//! composed into.
//!
//! This crate is the heart of the layer3d layout-to-mesh converter.

pub mod geometry;
pub mod cell;
pub mod database;
pub mod layer;
pub mod winding;
pub mod extrude;
pub mod scene;

/// A `(layer, datatype)` pair, as stored in GDSII.
pub type LayerKey = (u16, u16);

pub use database::{LayoutDatabase, LayoutError, TopCell};
pub use cell::{Cell, CellInstance, Transform};
pub use layer::{
    Layer, LayerEntry, LayerMap, LayerMetadata, LayerProperties, LayerStack, LayerStackBuilder,
    Material, StackError,
};
pub use geometry::{Point, Polygon, Rect, Path, GeomPrimitive};
pub use winding::{PlanarShape, Turn};
pub use extrude::{extrude, GeometryError, Solid};
pub use scene::{GeometryNode, LayerScene, Scene};
