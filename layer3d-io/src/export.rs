//! Scene exporters: glTF (JSON + `.bin`), GLB, OBJ, binary STL and ASCII PLY.
//!
//! Every writer emits nodes in scene order and formats numbers the same way
//! on every run, so identical scenes produce identical bytes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use thiserror::Error;

use layer3d_core::scene::{GeometryNode, Scene};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported output format: {} (expected .gltf, .glb, .obj, .stl or .ply)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    Stream(#[from] io::Error),

    #[error("glTF encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scene too large for a GLB container ({0} bytes)")]
    TooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Gltf,
    Glb,
    Obj,
    Stl,
    Ply,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Gltf,
        ExportFormat::Glb,
        ExportFormat::Obj,
        ExportFormat::Stl,
        ExportFormat::Ply,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Gltf => "gltf",
            ExportFormat::Glb => "glb",
            ExportFormat::Obj => "obj",
            ExportFormat::Stl => "stl",
            ExportFormat::Ply => "ply",
        }
    }

    /// Pick the format from the extension of `path` (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == ext)
            .ok_or_else(|| ExportError::UnsupportedFormat(path.to_path_buf()))
    }
}

/// Write `scene` to `path` in the format named by its extension.
///
/// A `.gltf` export also writes its buffer next to it, as `<stem>.bin`.
pub fn export_scene(scene: &Scene, path: &Path) -> Result<(), ExportError> {
    let format = ExportFormat::from_path(path)?;
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source: io::Error| ExportError::Io { path: p, source }
    };

    match format {
        ExportFormat::Gltf => {
            let bin_path = path.with_extension("bin");
            let bin_name = bin_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("scene.bin")
                .to_string();
            let doc = build_gltf(scene, Some(&bin_name));
            if !doc.buffer.is_empty() {
                std::fs::write(&bin_path, &doc.buffer).map_err(io_err(&bin_path))?;
            }
            let json = serde_json::to_vec_pretty(&doc.json)?;
            std::fs::write(path, json).map_err(io_err(path))?;
        }
        _ => {
            let file = File::create(path).map_err(io_err(path))?;
            let mut out = BufWriter::new(file);
            write_scene(scene, format, &mut out)?;
            out.flush().map_err(io_err(path))?;
        }
    }

    log::info!(
        "Exported {} nodes ({} triangles) to {}",
        scene.node_count(),
        scene.triangle_count(),
        path.display()
    );
    Ok(())
}

/// Write `scene` to a stream. glTF is written with its buffer embedded as a
/// base64 data URI.
pub fn write_scene<W: Write>(
    scene: &Scene,
    format: ExportFormat,
    out: &mut W,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Gltf => {
            let doc = build_gltf(scene, None);
            let mut json = doc.json;
            if !doc.buffer.is_empty() {
                json["buffers"][0]["uri"] = json!(format!(
                    "data:application/octet-stream;base64,{}",
                    base64(&doc.buffer)
                ));
            }
            serde_json::to_writer_pretty(&mut *out, &json)?;
        }
        ExportFormat::Glb => write_glb(scene, out)?,
        ExportFormat::Obj => write_obj(scene, out)?,
        ExportFormat::Stl => write_stl(scene, out)?,
        ExportFormat::Ply => write_ply(scene, out)?,
    }
    Ok(())
}

// ── glTF ──────────────────────────────────────────────────────────────

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const TRIANGLES: u32 = 4;

struct GltfDocument {
    json: Value,
    buffer: Vec<u8>,
}

#[derive(Default)]
struct GltfBuilder {
    buffer: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
    materials: Vec<Value>,
    colors: Vec<[u8; 4]>,
    meshes: Vec<Value>,
    nodes: Vec<Value>,
}

impl GltfBuilder {
    fn push_view(&mut self, bytes: &[u8], target: u32) -> usize {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
            "target": target,
        }));
        self.views.len() - 1
    }

    fn material(&mut self, color: [u8; 4]) -> usize {
        if let Some(i) = self.colors.iter().position(|c| *c == color) {
            return i;
        }
        let factor = color.map(|c| c as f64 / 255.0);
        let mut material = json!({
            "pbrMetallicRoughness": {
                "baseColorFactor": factor,
                "metallicFactor": 0.0,
                "roughnessFactor": 1.0,
            },
            "doubleSided": false,
        });
        if color[3] < 255 {
            material["alphaMode"] = json!("BLEND");
        }
        self.colors.push(color);
        self.materials.push(material);
        self.materials.len() - 1
    }

    fn geometry_node(&mut self, node: &GeometryNode) -> Option<usize> {
        let solid = &node.solid;
        if solid.vertices.is_empty() || solid.triangles.is_empty() {
            return None;
        }

        let positions: Vec<[f32; 3]> = solid.vertices.iter().map(|v| v.map(|c| c as f32)).collect();
        let mut min = positions[0];
        let mut max = positions[0];
        for p in &positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        let position_bytes: Vec<u8> = positions.iter().flatten().flat_map(|c| c.to_le_bytes()).collect();
        let index_bytes: Vec<u8> = solid
            .triangles
            .iter()
            .flatten()
            .flat_map(|i| i.to_le_bytes())
            .collect();

        let position_view = self.push_view(&position_bytes, ARRAY_BUFFER);
        self.accessors.push(json!({
            "bufferView": position_view,
            "componentType": FLOAT,
            "count": positions.len(),
            "type": "VEC3",
            "min": min,
            "max": max,
        }));
        let position_accessor = self.accessors.len() - 1;

        let index_view = self.push_view(&index_bytes, ELEMENT_ARRAY_BUFFER);
        self.accessors.push(json!({
            "bufferView": index_view,
            "componentType": UNSIGNED_INT,
            "count": solid.triangles.len() * 3,
            "type": "SCALAR",
        }));
        let index_accessor = self.accessors.len() - 1;

        let material = self.material(node.color);
        self.meshes.push(json!({
            "name": node.name,
            "primitives": [{
                "attributes": { "POSITION": position_accessor },
                "indices": index_accessor,
                "material": material,
                "mode": TRIANGLES,
            }],
        }));
        self.nodes.push(json!({ "name": node.name, "mesh": self.meshes.len() - 1 }));
        Some(self.nodes.len() - 1)
    }
}

fn with_children(mut node: Value, children: Vec<usize>) -> Value {
    if !children.is_empty() {
        node["children"] = json!(children);
    }
    node
}

/// Build the glTF JSON and its binary buffer. `buffer_uri` names an external
/// buffer file; `None` leaves the buffer without a URI (GLB).
fn build_gltf(scene: &Scene, buffer_uri: Option<&str>) -> GltfDocument {
    let mut b = GltfBuilder::default();
    // Node 0 is the root; filled in once its children exist.
    b.nodes.push(Value::Null);

    let mut layer_nodes = Vec::with_capacity(scene.layers.len());
    for layer in &scene.layers {
        let children: Vec<usize> = layer.nodes.iter().filter_map(|n| b.geometry_node(n)).collect();
        b.nodes.push(with_children(
            json!({ "name": layer.name, "extras": { "id": layer.id } }),
            children,
        ));
        layer_nodes.push(b.nodes.len() - 1);
    }
    b.nodes[0] = with_children(json!({ "name": scene.name }), layer_nodes);

    let mut json = json!({
        "asset": { "version": "2.0", "generator": "layer3d" },
        "scene": 0,
        "scenes": [{ "name": scene.name, "nodes": [0] }],
        "nodes": b.nodes,
    });
    if !b.buffer.is_empty() {
        let mut buffer = json!({ "byteLength": b.buffer.len() });
        if let Some(uri) = buffer_uri {
            buffer["uri"] = json!(uri);
        }
        json["buffers"] = json!([buffer]);
        json["bufferViews"] = json!(b.views);
        json["accessors"] = json!(b.accessors);
        json["materials"] = json!(b.materials);
        json["meshes"] = json!(b.meshes);
    }

    GltfDocument {
        json,
        buffer: b.buffer,
    }
}

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_CHUNK_BIN: u32 = 0x004E_4942;

fn write_glb<W: Write>(scene: &Scene, out: &mut W) -> Result<(), ExportError> {
    let doc = build_gltf(scene, None);
    let mut json = serde_json::to_vec(&doc.json)?;
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = doc.buffer;
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json.len() + if bin.is_empty() { 0 } else { 8 + bin.len() };
    let total_u32 = u32::try_from(total).map_err(|_| ExportError::TooLarge(total))?;

    out.write_all(&GLB_MAGIC.to_le_bytes())?;
    out.write_all(&2u32.to_le_bytes())?;
    out.write_all(&total_u32.to_le_bytes())?;
    out.write_all(&(json.len() as u32).to_le_bytes())?;
    out.write_all(&GLB_CHUNK_JSON.to_le_bytes())?;
    out.write_all(&json)?;
    if !bin.is_empty() {
        out.write_all(&(bin.len() as u32).to_le_bytes())?;
        out.write_all(&GLB_CHUNK_BIN.to_le_bytes())?;
        out.write_all(&bin)?;
    }
    Ok(())
}

fn base64(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let n = chunk
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc | (b as u32) << (16 - 8 * i));
        for i in 0..4 {
            if i <= chunk.len() {
                out.push(TABLE[(n >> (18 - 6 * i) & 0x3F) as usize] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}

// ── Mesh formats ──────────────────────────────────────────────────────

fn write_obj<W: Write>(scene: &Scene, out: &mut W) -> Result<(), ExportError> {
    writeln!(out, "# layer3d scene {}", scene.name)?;
    let mut base = 1usize;
    for node in scene.nodes() {
        let [r, g, b, _] = node.color.map(|c| c as f64 / 255.0);
        writeln!(out, "o {}", node.name)?;
        for v in &node.solid.vertices {
            writeln!(out, "v {} {} {} {:.6} {:.6} {:.6}", v[0], v[1], v[2], r, g, b)?;
        }
        for t in &node.solid.triangles {
            writeln!(
                out,
                "f {} {} {}",
                base + t[0] as usize,
                base + t[1] as usize,
                base + t[2] as usize
            )?;
        }
        base += node.solid.vertices.len();
    }
    Ok(())
}

fn write_stl<W: Write>(scene: &Scene, out: &mut W) -> Result<(), ExportError> {
    let mut header = [0u8; 80];
    let title = format!("layer3d {}", scene.name);
    let len = title.len().min(80);
    header[..len].copy_from_slice(&title.as_bytes()[..len]);
    out.write_all(&header)?;

    let count = scene.triangle_count();
    let count_u32 = u32::try_from(count).map_err(|_| ExportError::TooLarge(count))?;
    out.write_all(&count_u32.to_le_bytes())?;

    for node in scene.nodes() {
        let solid = &node.solid;
        for (i, t) in solid.triangles.iter().enumerate() {
            for c in solid.face_normal(i) {
                out.write_all(&(c as f32).to_le_bytes())?;
            }
            for &v in t {
                for c in solid.vertices[v as usize] {
                    out.write_all(&(c as f32).to_le_bytes())?;
                }
            }
            out.write_all(&0u16.to_le_bytes())?;
        }
    }
    Ok(())
}

fn write_ply<W: Write>(scene: &Scene, out: &mut W) -> Result<(), ExportError> {
    let vertex_count: usize = scene.nodes().map(|n| n.solid.vertices.len()).sum();
    writeln!(out, "ply")?;
    writeln!(out, "format ascii 1.0")?;
    writeln!(out, "comment layer3d scene {}", scene.name)?;
    writeln!(out, "element vertex {}", vertex_count)?;
    for axis in ["x", "y", "z"] {
        writeln!(out, "property double {}", axis)?;
    }
    writeln!(out, "element face {}", scene.triangle_count())?;
    writeln!(out, "property list uchar uint vertex_indices")?;
    for channel in ["red", "green", "blue", "alpha"] {
        writeln!(out, "property uchar {}", channel)?;
    }
    writeln!(out, "end_header")?;

    for node in scene.nodes() {
        for v in &node.solid.vertices {
            writeln!(out, "{} {} {}", v[0], v[1], v[2])?;
        }
    }
    let mut base = 0usize;
    for node in scene.nodes() {
        let [r, g, b, a] = node.color;
        for t in &node.solid.triangles {
            writeln!(
                out,
                "3 {} {} {} {} {} {} {}",
                base + t[0] as usize,
                base + t[1] as usize,
                base + t[2] as usize,
                r,
                g,
                b,
                a
            )?;
        }
        base += node.solid.vertices.len();
    }
    Ok(())
}
