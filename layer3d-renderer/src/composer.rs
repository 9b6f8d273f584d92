//! Composition of a layout cell into a 3D scene graph.
//!
//! The scene has three levels: a root named after the top cell, one child
//! per `(layer, datatype)` of the layer stack (in stack order, empty layers
//! included), and one geometry node per polygon.

use layer3d_core::database::LayoutDatabase;
use layer3d_core::extrude::extrude;
use layer3d_core::layer::{Layer, LayerStack};
use layer3d_core::scene::{GeometryNode, LayerScene, Scene};
use layer3d_core::winding::shape_from_ring;
use layer3d_core::Cell;

use crate::color_map::{face_color, ColorMap};
use crate::error::RenderError;

/// Settings for one render.
pub struct RenderOptions<'a> {
    /// Cell to render. When absent or unknown the largest cell is used.
    pub top_cell: Option<String>,
    /// Per-polygon color overrides.
    pub color_map: Option<ColorMap>,
    /// Destination for pipeline log records.
    pub logger: &'a dyn log::Log,
}

impl Default for RenderOptions<'static> {
    fn default() -> Self {
        Self {
            top_cell: None,
            color_map: None,
            logger: log::logger(),
        }
    }
}

impl<'a> RenderOptions<'a> {
    pub fn with_top_cell(mut self, name: &str) -> Self {
        self.top_cell = Some(name.to_string());
        self
    }

    pub fn with_color_map(mut self, map: ColorMap) -> Self {
        self.color_map = Some(map);
        self
    }

    pub fn with_logger<'b>(self, logger: &'b dyn log::Log) -> RenderOptions<'b> {
        RenderOptions {
            top_cell: self.top_cell,
            color_map: self.color_map,
            logger,
        }
    }
}

/// Render the selected top cell of `layout` against `stack`.
///
/// Fails on the first polygon that cannot be extruded; no partial scene is
/// returned.
pub fn render_scene(
    layout: &LayoutDatabase,
    stack: &LayerStack,
    options: &RenderOptions<'_>,
) -> Result<Scene, RenderError> {
    let top = layout.select_top_cell(options.top_cell.as_deref())?;
    let cell = top.cell();
    if top.is_fallback() {
        match &options.top_cell {
            Some(name) => log::warn!(
                logger: options.logger,
                "Top cell '{}' not found in layout; rendering largest cell '{}'",
                name,
                cell.name
            ),
            None => log::warn!(
                logger: options.logger,
                "No top cell given; rendering largest cell '{}'",
                cell.name
            ),
        }
    }

    let mut scene = Scene::empty(&cell.name);
    for layer in stack.iter() {
        scene.layers.push(compose_layer(layout, cell, layer, options)?);
    }

    log::debug!(
        logger: options.logger,
        "Scene '{}': {} layers, {} nodes",
        scene.name,
        scene.layers.len(),
        scene.node_count()
    );
    Ok(scene)
}

fn compose_layer(
    layout: &LayoutDatabase,
    cell: &Cell,
    layer: &Layer,
    options: &RenderOptions<'_>,
) -> Result<LayerScene, RenderError> {
    let mut layer_scene = LayerScene::new(layer.key, &layer.name);
    let rings = layout.polygons(cell, layer.key)?;
    if rings.is_empty() {
        return Ok(layer_scene);
    }

    let missing = |field| RenderError::MissingPlacement {
        layer: layer.name.clone(),
        key: layer.key,
        field,
    };
    let zh = layer.zh().ok_or_else(|| missing("zh"))?;
    let th = layer.th().ok_or_else(|| missing("th"))?;

    let (ly, dt) = layer.key;
    for (index, ring) in rings.iter().enumerate() {
        let shape = shape_from_ring(ring);
        let solid = extrude(&shape, zh, th).map_err(|source| RenderError::Geometry {
            key: layer.key,
            index,
            source,
        })?;
        layer_scene.nodes.push(GeometryNode {
            name: format!("{},{},{}", ly, dt, index),
            solid,
            color: face_color(options.color_map.as_ref(), layer, index),
        });
    }

    log::debug!(
        logger: options.logger,
        "Layer {} ({},{}) {}: {} polygons at z={} th={}",
        layer.name,
        ly,
        dt,
        layer.material().hex(),
        layer_scene.nodes.len(),
        zh,
        th
    );
    Ok(layer_scene)
}
