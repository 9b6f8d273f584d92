use thiserror::Error;

use layer3d_core::database::LayoutError;
use layer3d_core::extrude::GeometryError;
use layer3d_core::LayerKey;
use layer3d_io::{ConfigError, ExportError};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Layer {},{} ({layer}) is missing property {field}", .key.0, .key.1)]
    MissingPlacement {
        layer: String,
        key: LayerKey,
        field: &'static str,
    },

    #[error("Polygon {},{},{index}: {source}", .key.0, .key.1)]
    Geometry {
        key: LayerKey,
        index: usize,
        source: GeometryError,
    },

    #[error(transparent)]
    Export(#[from] ExportError),
}
