//! # layer3d I/O
//!
//! GDS-II stream reader and writer, YAML layer-stack loading, and exporters
//! for the composed 3D scene (glTF, GLB, OBJ, STL, PLY).

pub mod gds;
pub mod config;
pub mod export;

pub use gds::{GdsReader, GdsWriter, GdsError};
pub use config::{load_layerstack, load_layout, parse_layerstack, ConfigError};
pub use export::{export_scene, write_scene, ExportError, ExportFormat};
