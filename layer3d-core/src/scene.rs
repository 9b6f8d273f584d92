use serde::{Deserialize, Serialize};

use crate::extrude::Solid;
use crate::LayerKey;

/// One extruded polygon, ready for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryNode {
    /// `"layer,datatype,index"`.
    pub name: String,
    pub solid: Solid,
    /// Flat face color, RGBA.
    pub color: [u8; 4],
}

/// All solids extruded from one `(layer, datatype)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerScene {
    /// `"layer,datatype,layer-name"`.
    pub id: String,
    /// `"layer,datatype"`.
    pub name: String,
    pub key: LayerKey,
    pub nodes: Vec<GeometryNode>,
}

impl LayerScene {
    pub fn new(key: LayerKey, layer_name: &str) -> Self {
        Self {
            id: format!("{},{},{}", key.0, key.1, layer_name),
            name: format!("{},{}", key.0, key.1),
            key,
            nodes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Root of a rendered scene, named after the top cell. Children follow
/// layer-stack order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    pub layers: Vec<LayerScene>,
}

impl Scene {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            layers: Vec::new(),
        }
    }

    pub fn find_layer(&self, key: LayerKey) -> Option<&LayerScene> {
        self.layers.iter().find(|l| l.key == key)
    }

    /// Geometry nodes in scene order.
    pub fn nodes(&self) -> impl Iterator<Item = &GeometryNode> {
        self.layers.iter().flat_map(|l| l.nodes.iter())
    }

    pub fn node_count(&self) -> usize {
        self.layers.iter().map(|l| l.nodes.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes().map(|n| n.solid.triangle_count()).sum()
    }
}
