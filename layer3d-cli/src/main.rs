//! # layer3d
//!
//! GDS-II layout to 3D scene converter.
//!

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::Parser;
use thiserror::Error;

use layer3d_io::{load_layerstack, load_layout};
use layer3d_renderer::{render_to_file, RenderError, RenderOptions};

/// Render a GDS-II layout to a 3D scene, one extruded solid per polygon
#[derive(Parser, Debug)]
#[command(name = "layer3d", version)]
struct ProgramOptions {
    /// Layout input file (.gds, .gdsii)
    #[arg(short = 'i', long)]
    input: PathBuf,
    /// Layer stack file (.yaml, .yml, .ymls)
    #[arg(short = 't', long)]
    layerstack: PathBuf,
    /// Top cell to render; defaults to the largest cell
    #[arg(short = 'c', long)]
    top_cell: Option<String>,
    /// Output file (.gltf, .glb, .obj, .stl, .ply)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Verbose output mode
    #[arg(short, long)]
    verbose: bool,
    /// Open the rendered scene in Blender
    #[arg(long)]
    blender: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("No output specified (use --output or --blender)")]
    NoOutput,

    #[error("Could not load input files: {0}")]
    Load(RenderError),

    #[error("Could not render to output file: {0}")]
    Render(RenderError),

    #[error("Could not render to Blender: no `blender` executable on PATH")]
    BlenderNotFound,

    #[error("Could not render to Blender: {0}")]
    Blender(String),
}

fn main() -> ExitCode {
    let options = ProgramOptions::parse();
    init_logger(options.verbose);

    match _main(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn _main(options: &ProgramOptions) -> Result<(), CliError> {
    if options.output.is_none() && !options.blender {
        return Err(CliError::NoOutput);
    }

    let stack = load_layerstack(&options.layerstack).map_err(|e| CliError::Load(e.into()))?;
    let layout = load_layout(&options.input).map_err(|e| CliError::Load(e.into()))?;

    let mut render = RenderOptions::default();
    render.top_cell = options.top_cell.clone();

    if let Some(out) = &options.output {
        render_to_file(&layout, &stack, &render, out).map_err(CliError::Render)?;
        log::info!("Rendered to 3D object: {}", out.display());
    }

    if options.blender {
        let blender = find_executable("blender").ok_or(CliError::BlenderNotFound)?;
        let scratch = std::env::temp_dir().join(format!("layer3d-{}.glb", std::process::id()));
        let result = render_to_file(&layout, &stack, &render, &scratch)
            .map_err(|e| CliError::Blender(e.to_string()))
            .and_then(|_| run_blender(&blender, &scratch));
        if let Err(e) = std::fs::remove_file(&scratch) {
            log::debug!("Could not remove {}: {}", scratch.display(), e);
        }
        result?;
    }

    Ok(())
}

fn run_blender(blender: &Path, scene: &Path) -> Result<(), CliError> {
    log::info!("Running {} {}", blender.display(), scene.display());
    // glTF has to go through Blender's importer.
    let script = format!(
        "import bpy; bpy.ops.wm.read_factory_settings(use_empty=True); \
         bpy.ops.import_scene.gltf(filepath={:?})",
        scene.display().to_string()
    );
    let status = Command::new(blender)
        .arg("--python-expr")
        .arg(script)
        .status()
        .map_err(|e| CliError::Blender(e.to_string()))?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::Blender(format!("blender exited with {}", status)))
    }
}

/// First file called `name` in a `PATH` directory.
fn find_executable(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{}.exe", name), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    std::env::split_paths(&path)
        .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
        .find(|p| p.is_file())
}
