//! # layer3d Renderer
//!
//! Turns a layout cell and a resolved layer stack into a 3D scene graph:
//! every polygon is split into shell and hole, extruded at its layer's
//! height, colored, and grouped per `(layer, datatype)`. The pipeline
//! functions load inputs from disk and hand the scene to an exporter.

pub mod color_map;
pub mod composer;
pub mod error;
pub mod pipeline;

pub use color_map::ColorMap;
pub use composer::{render_scene, RenderOptions};
pub use error::RenderError;
pub use pipeline::{render_files, render_to_file};
