//! Loading of layer-stack documents and layout files.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;

use layer3d_core::database::LayoutDatabase;
use layer3d_core::layer::{LayerEntry, LayerStack, LayerStackBuilder, StackError};

use crate::gds::{GdsError, GdsReader};

pub const LAYERSTACK_EXTENSIONS: &[&str] = &["yaml", "yml", "ymls"];
pub const GDS_EXTENSIONS: &[&str] = &["gds", "gdsii"];
pub const OASIS_EXTENSIONS: &[&str] = &["oas", "oasis"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported extension for {}, expected one of {expected:?}", .path.display())]
    UnsupportedExtension {
        path: PathBuf,
        expected: &'static [&'static str],
    },

    #[error("OASIS layouts are not supported: {}", .0.display())]
    UnsupportedLayoutFormat(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid entry for layer '{layer}' in {}: {source}", .path.display())]
    InvalidEntry {
        path: PathBuf,
        layer: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid layout {}: {source}", .path.display())]
    Layout { path: PathBuf, source: GdsError },

    #[error(transparent)]
    Stack(#[from] StackError),
}

/// Lower-cased extension of `path`, without the dot.
fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn check_extension(path: &Path, expected: &'static [&'static str]) -> Result<(), ConfigError> {
    if expected.contains(&extension(path).as_str()) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedExtension {
            path: path.to_path_buf(),
            expected,
        })
    }
}

fn check_exists(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::NotFound(path.to_path_buf()))
    }
}

// ── Layer stack ───────────────────────────────────────────────────────

/// Load and resolve a layer-stack document.
pub fn load_layerstack(path: &Path) -> Result<LayerStack, ConfigError> {
    check_extension(path, LAYERSTACK_EXTENSIONS)?;
    check_exists(path)?;

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let stack = parse_layerstack(&text, path)?;
    log::info!("Loaded {} layers from {}", stack.len(), path.display());
    Ok(stack)
}

/// Parse and resolve a layer-stack document. `origin` only labels errors.
///
/// Entries are read in document order from the top-level `layers` mapping.
pub fn parse_layerstack(text: &str, origin: &Path) -> Result<LayerStack, ConfigError> {
    let doc: Value = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
        path: origin.to_path_buf(),
        source,
    })?;

    let layers = match doc.get("layers") {
        Some(Value::Mapping(layers)) if !layers.is_empty() => layers,
        _ => return Err(StackError::NoLayers.into()),
    };

    let mut builder = LayerStackBuilder::new();
    for (name, value) in layers {
        let name = match name {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => format!("{:?}", other),
        };
        let entry = match value {
            Value::Null => LayerEntry::default(),
            value => serde_yaml::from_value::<LayerEntry>(value.clone()).map_err(|source| {
                ConfigError::InvalidEntry {
                    path: origin.to_path_buf(),
                    layer: name.clone(),
                    source,
                }
            })?,
        };
        builder.add_entry(&name, entry)?;
    }

    Ok(builder.resolve()?)
}

// ── Layout ────────────────────────────────────────────────────────────

/// Load a layout file, dispatching on its extension.
pub fn load_layout(path: &Path) -> Result<LayoutDatabase, ConfigError> {
    let ext = extension(path);
    if OASIS_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ConfigError::UnsupportedLayoutFormat(path.to_path_buf()));
    }
    check_extension(path, GDS_EXTENSIONS)?;
    check_exists(path)?;

    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    GdsReader::new(BufReader::new(file))
        .read()
        .map_err(|source| ConfigError::Layout {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gds::GdsWriter;
    use layer3d_core::cell::Cell;
    use layer3d_core::geometry::{GeomPrimitive, Rect};

    const STACK: &str = r#"
layers:
  metal1:
    metadata: { type: routing, keys: [m1], rgba: [0, 0, 255, 255], text: metal }
    properties: { ly: 1, dt: 0, zh: 0.0, th: 1.0, sqrres: 0.08, extra: ignored }
  via1:
    metadata: { type: cut }
    properties: { ly: 2, dt: 0, top: metal2, bot: metal1 }
  metal2:
    metadata: { type: routing }
    properties: { ly: 3, dt: 0, zh: 1.5, th: 1.0 }
"#;

    fn origin() -> &'static Path {
        Path::new("stack.yaml")
    }

    #[test]
    fn test_parse_resolves_vias() {
        let stack = parse_layerstack(STACK, origin()).unwrap();
        assert_eq!(stack.keys().collect::<Vec<_>>(), vec![(1, 0), (2, 0), (3, 0)]);
        let via = stack.find_by_name("via1").unwrap();
        assert_eq!(via.zh(), Some(1.0));
        assert!((via.th().unwrap() - 0.5).abs() < 1e-10);

        let m1 = stack.find_by_alias("m1").unwrap();
        assert_eq!(m1.material().rgba, [0, 0, 255, 255]);
        // Unset material falls back to mid-gray.
        assert_eq!(
            stack.find_by_name("metal2").unwrap().material().rgba,
            [128, 128, 128, 255]
        );
    }

    #[test]
    fn test_parse_rejects_missing_layers() {
        for text in ["{}", "layers:", "layers: {}", "other: 1"] {
            assert!(
                matches!(
                    parse_layerstack(text, origin()),
                    Err(ConfigError::Stack(StackError::NoLayers))
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn test_parse_reports_entry_errors() {
        let no_meta = "layers:\n  m1:\n    properties: { ly: 1, dt: 0 }\n";
        assert!(matches!(
            parse_layerstack(no_meta, origin()),
            Err(ConfigError::Stack(StackError::MissingMetadata { .. }))
        ));

        let no_dt = "layers:\n  m1:\n    metadata: { type: routing }\n    properties: { ly: 1 }\n";
        match parse_layerstack(no_dt, origin()) {
            Err(ConfigError::Stack(StackError::MissingKeyFields { fields, .. })) => {
                assert_eq!(fields, vec!["dt"])
            }
            other => panic!("unexpected: {:?}", other),
        }

        let bad_type = "layers:\n  m1:\n    metadata: { type: routing }\n    properties: { ly: one, dt: 0 }\n";
        assert!(matches!(
            parse_layerstack(bad_type, origin()),
            Err(ConfigError::InvalidEntry { .. })
        ));

        assert!(matches!(
            parse_layerstack("layers: [", origin()),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn test_load_checks_extension_and_existence() {
        assert!(matches!(
            load_layerstack(Path::new("stack.json")),
            Err(ConfigError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            load_layerstack(Path::new("/nonexistent/dir/stack.yml")),
            Err(ConfigError::NotFound(_))
        ));
        assert!(matches!(
            load_layout(Path::new("chip.oas")),
            Err(ConfigError::UnsupportedLayoutFormat(_))
        ));
        assert!(matches!(
            load_layout(Path::new("chip.dxf")),
            Err(ConfigError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            load_layout(Path::new("/nonexistent/dir/chip.gds")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_files_from_disk() {
        let dir = std::env::temp_dir().join(format!("layer3d-io-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let stack_path = dir.join("stack.YML");
        std::fs::write(&stack_path, STACK).unwrap();
        assert_eq!(load_layerstack(&stack_path).unwrap().len(), 3);

        let mut db = LayoutDatabase::new("disk");
        let mut cell = Cell::new("X");
        cell.add_geometry(GeomPrimitive::Rect(Rect::new((1, 0), 0.0, 0.0, 1.0, 1.0)));
        db.add_cell(cell);
        let mut buffer = Vec::new();
        GdsWriter::new(&mut buffer).write(&db).unwrap();
        let gds_path = dir.join("chip.gds");
        std::fs::write(&gds_path, buffer).unwrap();

        let loaded = load_layout(&gds_path).unwrap();
        assert_eq!(loaded.cell_names(), vec!["X"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
