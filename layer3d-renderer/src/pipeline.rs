use std::path::Path;

use layer3d_core::database::LayoutDatabase;
use layer3d_core::layer::LayerStack;
use layer3d_core::scene::Scene;
use layer3d_io::{export_scene, load_layerstack, load_layout, ExportFormat};

use crate::composer::{render_scene, RenderOptions};
use crate::error::RenderError;

/// Render and export to `out`. The output format is checked before any
/// geometry is built.
pub fn render_to_file(
    layout: &LayoutDatabase,
    stack: &LayerStack,
    options: &RenderOptions<'_>,
    out: &Path,
) -> Result<Scene, RenderError> {
    let format = ExportFormat::from_path(out)?;
    let scene = render_scene(layout, stack, options)?;
    export_scene(&scene, out)?;
    log::info!(
        logger: options.logger,
        "Rendered '{}' to {} ({})",
        scene.name,
        out.display(),
        format.extension()
    );
    Ok(scene)
}

/// Load the layer stack and the layout from disk, then render to `out`.
pub fn render_files(
    layout_path: &Path,
    stack_path: &Path,
    options: &RenderOptions<'_>,
    out: &Path,
) -> Result<Scene, RenderError> {
    ExportFormat::from_path(out)?;
    let stack = load_layerstack(stack_path)?;
    let layout = load_layout(layout_path)?;
    render_to_file(&layout, &stack, options, out)
}
