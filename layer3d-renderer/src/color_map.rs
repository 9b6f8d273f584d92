use std::collections::BTreeMap;

use layer3d_core::layer::Layer;
use layer3d_core::LayerKey;

/// Explicit per-polygon face colors, keyed by `(layer, datatype)` and the
/// polygon's index within that layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorMap {
    colors: BTreeMap<(LayerKey, usize), [u8; 4]>,
}

impl ColorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: LayerKey, index: usize, rgba: [u8; 4]) -> Option<[u8; 4]> {
        self.colors.insert((key, index), rgba)
    }

    pub fn get(&self, key: LayerKey, index: usize) -> Option<[u8; 4]> {
        self.colors.get(&(key, index)).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl FromIterator<((LayerKey, usize), [u8; 4])> for ColorMap {
    fn from_iter<I: IntoIterator<Item = ((LayerKey, usize), [u8; 4])>>(iter: I) -> Self {
        Self {
            colors: iter.into_iter().collect(),
        }
    }
}

/// Face color of polygon `index` on `layer`: the map's entry if there is one,
/// otherwise the layer's material color.
pub fn face_color(map: Option<&ColorMap>, layer: &Layer, index: usize) -> [u8; 4] {
    map.and_then(|m| m.get(layer.key, index))
        .unwrap_or_else(|| layer.material().rgba)
}
