//! Technology layer stack: layer records, the configuration entries they are
//! built from, and the via placement resolver.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::LayerKey;

/// Metadata type tag marking via (connector) layers.
pub const VIA_LAYER_TYPE: &str = "cut";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StackError {
    #[error("Layer stack is missing layers")]
    NoLayers,

    #[error("Layer {layer} is missing metadata")]
    MissingMetadata { layer: String },

    #[error("Layer {layer} is missing metadata type")]
    MissingMetadataType { layer: String },

    #[error("Layer {layer} is missing properties")]
    MissingProperties { layer: String },

    #[error("Layer {layer} is missing properties: {fields:?}")]
    MissingKeyFields {
        layer: String,
        fields: Vec<&'static str>,
    },

    #[error("Via layer {layer} is missing {field} property")]
    MissingViaReference { layer: String, field: &'static str },

    #[error("Via layer {layer} references unknown layer '{reference}' as {field}")]
    UnresolvedViaReference {
        layer: String,
        field: &'static str,
        reference: String,
    },

    #[error("Via layer {layer} needs {field} declared on layer {reference}")]
    UndeclaredPlacement {
        layer: String,
        reference: String,
        field: &'static str,
    },
}

/// Layer material: a texture identifier and an RGBA color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub text: String,
    pub rgba: [u8; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            text: String::new(),
            rgba: [128, 128, 128, 255],
        }
    }
}

impl Material {
    pub fn rgb(&self) -> [u8; 3] {
        [self.rgba[0], self.rgba[1], self.rgba[2]]
    }

    /// `#rrggbb`
    pub fn hex(&self) -> String {
        let [r, g, b] = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    /// Type tag, e.g. `"routing"` or `"cut"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Alternative names for the layer.
    pub keys: Vec<String>,
    pub material: Material,
}

/// Physical properties of a layer. Only `ly`, `dt`, `zh`, `th`, `top` and
/// `bot` take part in extrusion; the electrical fields are carried through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerProperties {
    pub ly: u16,
    pub dt: u16,
    /// Base height.
    pub zh: Option<f64>,
    /// Thickness.
    pub th: Option<f64>,
    /// Name of the layer above a via.
    pub top: Option<String>,
    /// Name of the layer below a via.
    pub bot: Option<String>,
    pub mw: Option<f64>,
    pub sqrres: Option<f64>,
    pub dc_avgcd: Option<f64>,
    pub ac_rmscd: Option<f64>,
    pub sqrcap: Option<f64>,
}

/// A technology layer.
///
/// The derived `PartialEq` is full structural equality. Layer *identity* is
/// the `(ly, dt)` key alone; compare identities with [`Layer::key_eq`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub key: LayerKey,
    pub metadata: Option<LayerMetadata>,
    pub properties: Option<LayerProperties>,
}

impl Layer {
    pub fn new(name: &str, key: LayerKey) -> Self {
        Self {
            name: name.to_string(),
            key,
            metadata: None,
            properties: None,
        }
    }

    /// Equal-by-key: true when both layers sit on the same `(ly, dt)`,
    /// whatever their other fields hold.
    pub fn key_eq(&self, other: &Layer) -> bool {
        self.key == other.key
    }

    pub fn is_via(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| m.kind == VIA_LAYER_TYPE)
    }

    /// Material of the layer, or the default gray when it has no metadata.
    pub fn material(&self) -> Material {
        self.metadata
            .as_ref()
            .map(|m| m.material.clone())
            .unwrap_or_default()
    }

    pub fn zh(&self) -> Option<f64> {
        self.properties.as_ref().and_then(|p| p.zh)
    }

    pub fn th(&self) -> Option<f64> {
        self.properties.as_ref().and_then(|p| p.th)
    }

    /// Whether `name` is this layer's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name
            || self
                .metadata
                .as_ref()
                .is_some_and(|m| m.keys.iter().any(|k| k == name))
    }
}

// ── Ordered layer map ────────────────────────────────────────────────

/// Insertion-ordered map from `(ly, dt)` to [`Layer`], keys unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMap {
    layers: Vec<Layer>,
}

impl LayerMap {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn get(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.iter().find(|l| l.key == key)
    }

    pub fn get_mut(&mut self, key: LayerKey) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.key == key)
    }

    /// Insert `layer`. An existing layer with the same key is replaced in
    /// place (keeping its position) and returned.
    pub fn insert(&mut self, layer: Layer) -> Option<Layer> {
        match self.get_mut(layer.key) {
            Some(existing) => Some(std::mem::replace(existing, layer)),
            None => {
                self.layers.push(layer);
                None
            }
        }
    }

    pub fn remove(&mut self, key: LayerKey) -> Option<Layer> {
        let idx = self.layers.iter().position(|l| l.key == key)?;
        Some(self.layers.remove(idx))
    }

    pub fn contains_key(&self, key: LayerKey) -> bool {
        self.get(key).is_some()
    }

    /// First layer named `name`, in map order.
    pub fn find_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = LayerKey> + '_ {
        self.layers.iter().map(|l| l.key)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

// ── Configuration entries ────────────────────────────────────────────

/// One named entry of a layer-stack document, as written. Every field is
/// optional here so that validation can name what is missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerEntry {
    pub metadata: Option<MetadataEntry>,
    pub properties: Option<PropertiesEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataEntry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub keys: Option<Vec<String>>,
    pub rgba: Option<[u8; 4]>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertiesEntry {
    pub ly: Option<u16>,
    pub dt: Option<u16>,
    pub zh: Option<f64>,
    pub th: Option<f64>,
    pub top: Option<String>,
    pub bot: Option<String>,
    pub mw: Option<f64>,
    pub sqrres: Option<f64>,
    pub dc_avgcd: Option<f64>,
    pub ac_rmscd: Option<f64>,
    pub sqrcap: Option<f64>,
}

impl LayerEntry {
    /// Validate the entry and build the [`Layer`] it declares.
    pub fn into_layer(self, name: &str) -> Result<Layer, StackError> {
        let meta = self.metadata.ok_or_else(|| StackError::MissingMetadata {
            layer: name.to_string(),
        })?;
        let kind = meta.kind.ok_or_else(|| StackError::MissingMetadataType {
            layer: name.to_string(),
        })?;
        let props = self.properties.ok_or_else(|| StackError::MissingProperties {
            layer: name.to_string(),
        })?;

        let (ly, dt) = match (props.ly, props.dt) {
            (Some(ly), Some(dt)) => (ly, dt),
            (ly, dt) => {
                let mut fields = Vec::new();
                if ly.is_none() {
                    fields.push("ly");
                }
                if dt.is_none() {
                    fields.push("dt");
                }
                return Err(StackError::MissingKeyFields {
                    layer: name.to_string(),
                    fields,
                });
            }
        };

        let material = Material {
            text: meta.text.unwrap_or_default(),
            rgba: meta.rgba.unwrap_or(Material::default().rgba),
        };

        Ok(Layer {
            name: name.to_string(),
            key: (ly, dt),
            metadata: Some(LayerMetadata {
                kind,
                keys: meta.keys.unwrap_or_default(),
                material,
            }),
            properties: Some(LayerProperties {
                ly,
                dt,
                zh: props.zh,
                th: props.th,
                top: props.top,
                bot: props.bot,
                mw: props.mw,
                sqrres: props.sqrres,
                dc_avgcd: props.dc_avgcd,
                ac_rmscd: props.ac_rmscd,
                sqrcap: props.sqrcap,
            }),
        })
    }
}

// ── Two-phase build ──────────────────────────────────────────────────

/// Unresolved layer stack. Layers are collected here, then [`resolve`]d into
/// a read-only [`LayerStack`].
///
/// [`resolve`]: LayerStackBuilder::resolve
#[derive(Debug, Clone, Default)]
pub struct LayerStackBuilder {
    layers: LayerMap,
}

impl LayerStackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a configuration entry and insert the layer it declares.
    pub fn add_entry(&mut self, name: &str, entry: LayerEntry) -> Result<(), StackError> {
        let layer = entry.into_layer(name)?;
        self.layers.insert(layer);
        Ok(())
    }

    pub fn insert(&mut self, layer: Layer) -> Option<Layer> {
        self.layers.insert(layer)
    }

    pub fn remove(&mut self, key: LayerKey) -> Option<Layer> {
        self.layers.remove(key)
    }

    pub fn get(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Derive the placement of every via layer from the layers it bridges.
    ///
    /// For each `"cut"` layer, in stack order: `zh = bot.zh + bot.th` and
    /// `th = top.zh - zh`, where `top` and `bot` are the first layers carrying
    /// those names. Vias read the current state of the stack, so a via may
    /// bridge an earlier, already-resolved via.
    pub fn resolve(mut self) -> Result<LayerStack, StackError> {
        if self.layers.is_empty() {
            return Err(StackError::NoLayers);
        }

        let via_keys: Vec<LayerKey> = self
            .layers
            .iter()
            .filter(|l| l.is_via())
            .map(|l| l.key)
            .collect();

        for key in via_keys {
            let (zh, th) = self.via_placement(key)?;
            if let Some(props) = self.layers.get_mut(key).and_then(|l| l.properties.as_mut()) {
                props.zh = Some(zh);
                props.th = Some(th);
            }
        }

        Ok(LayerStack {
            layers: self.layers,
        })
    }

    fn via_placement(&self, key: LayerKey) -> Result<(f64, f64), StackError> {
        let Some(via) = self.layers.get(key) else {
            return Err(StackError::NoLayers);
        };
        let props = via.properties.as_ref();
        let top_name = props
            .and_then(|p| p.top.as_deref())
            .ok_or_else(|| StackError::MissingViaReference {
                layer: via.name.clone(),
                field: "top",
            })?;
        let bot_name = props
            .and_then(|p| p.bot.as_deref())
            .ok_or_else(|| StackError::MissingViaReference {
                layer: via.name.clone(),
                field: "bot",
            })?;

        let lookup = |field: &'static str, reference: &str| {
            self.layers
                .find_by_name(reference)
                .ok_or_else(|| StackError::UnresolvedViaReference {
                    layer: via.name.clone(),
                    field,
                    reference: reference.to_string(),
                })
        };
        let top = lookup("top", top_name)?;
        let bot = lookup("bot", bot_name)?;

        let declared = |layer: &Layer, field: &'static str, value: Option<f64>| {
            value.ok_or_else(|| StackError::UndeclaredPlacement {
                layer: via.name.clone(),
                reference: layer.name.clone(),
                field,
            })
        };
        let bot_zh = declared(bot, "zh", bot.zh())?;
        let bot_th = declared(bot, "th", bot.th())?;
        let top_zh = declared(top, "zh", top.zh())?;

        let zh = bot_zh + bot_th;
        let th = top_zh - zh;
        if th < 0.0 {
            log::warn!(
                "Via layer {} resolves to negative thickness {} ({} below {})",
                via.name,
                th,
                top.name,
                bot.name
            );
        }
        log::debug!("Via layer {}: zh={}, th={}", via.name, zh, th);
        Ok((zh, th))
    }
}

/// A resolved, read-only technology layer stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStack {
    layers: LayerMap,
}

impl LayerStack {
    pub fn get(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn contains_key(&self, key: LayerKey) -> bool {
        self.layers.contains_key(key)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.find_by_name(name)
    }

    /// First layer whose name or alias is `name`.
    pub fn find_by_alias(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.answers_to(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = LayerKey> + '_ {
        self.layers.keys()
    }

    pub fn vias(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.is_via())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: &str, ly: u16, zh: Option<f64>, th: Option<f64>) -> LayerEntry {
        LayerEntry {
            metadata: Some(MetadataEntry {
                kind: Some(kind.to_string()),
                keys: Some(vec![format!("L{}", ly)]),
                rgba: Some([ly as u8, 0, 0, 255]),
                text: None,
            }),
            properties: Some(PropertiesEntry {
                ly: Some(ly),
                dt: Some(0),
                zh,
                th,
                ..Default::default()
            }),
        }
    }

    fn via(ly: u16, top: &str, bot: &str) -> LayerEntry {
        let mut e = entry(VIA_LAYER_TYPE, ly, None, None);
        if let Some(p) = e.properties.as_mut() {
            p.top = Some(top.to_string());
            p.bot = Some(bot.to_string());
        }
        e
    }

    fn three_layer_builder() -> LayerStackBuilder {
        let mut b = LayerStackBuilder::new();
        b.add_entry("met1", entry("routing", 2, Some(1.0), Some(0.5))).unwrap();
        b.add_entry("via1", via(3, "met2", "met1")).unwrap();
        b.add_entry("met2", entry("routing", 4, Some(2.5), Some(0.8))).unwrap();
        b
    }

    #[test]
    fn test_material_views() {
        let m = Material {
            text: "copper".into(),
            rgba: [255, 16, 0, 128],
        };
        assert_eq!(m.rgb(), [255, 16, 0]);
        assert_eq!(m.hex(), "#ff1000");
    }

    #[test]
    fn test_key_equality_ignores_other_fields() {
        let a = Layer::new("met1", (2, 0));
        let mut b = Layer::new("metal_one", (2, 0));
        b.properties = Some(LayerProperties::default());
        assert!(a.key_eq(&b));
        assert_ne!(a, b);
        assert!(!a.key_eq(&Layer::new("met1", (2, 1))));
    }

    #[test]
    fn test_layer_map_operations() {
        let mut map = LayerMap::new();
        assert!(map.insert(Layer::new("a", (1, 0))).is_none());
        assert!(map.insert(Layer::new("b", (2, 0))).is_none());
        let replaced = map.insert(Layer::new("a2", (1, 0))).unwrap();
        assert_eq!(replaced.name, "a");
        assert_eq!(map.len(), 2);
        // Replacement keeps the original position.
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![(1, 0), (2, 0)]);
        assert_eq!(map.get((1, 0)).unwrap().name, "a2");
        assert!(map.remove((1, 0)).is_some());
        assert!(!map.contains_key((1, 0)));
        assert!(map.get((9, 9)).is_none());
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let mut e = entry("routing", 2, None, None);
        e.metadata = None;
        assert_eq!(
            e.into_layer("m").unwrap_err(),
            StackError::MissingMetadata { layer: "m".into() }
        );

        let mut e = entry("routing", 2, None, None);
        e.metadata.as_mut().unwrap().kind = None;
        assert!(matches!(
            e.into_layer("m"),
            Err(StackError::MissingMetadataType { .. })
        ));

        let mut e = entry("routing", 2, None, None);
        e.properties = None;
        assert!(matches!(
            e.into_layer("m"),
            Err(StackError::MissingProperties { .. })
        ));

        let mut e = entry("routing", 2, None, None);
        e.properties.as_mut().unwrap().ly = None;
        e.properties.as_mut().unwrap().dt = None;
        assert_eq!(
            e.into_layer("m").unwrap_err(),
            StackError::MissingKeyFields {
                layer: "m".into(),
                fields: vec!["ly", "dt"]
            }
        );
    }

    #[test]
    fn test_entry_defaults() {
        let e = LayerEntry {
            metadata: Some(MetadataEntry {
                kind: Some("routing".into()),
                ..Default::default()
            }),
            properties: Some(PropertiesEntry {
                ly: Some(5),
                dt: Some(1),
                ..Default::default()
            }),
        };
        let layer = e.into_layer("poly").unwrap();
        assert_eq!(layer.key, (5, 1));
        assert_eq!(layer.material(), Material::default());
        assert!(layer.metadata.unwrap().keys.is_empty());
    }

    #[test]
    fn test_via_placement_is_derived() {
        let stack = three_layer_builder().resolve().unwrap();
        let v = stack.get((3, 0)).unwrap();
        let bot = stack.find_by_name("met1").unwrap();
        let top = stack.find_by_name("met2").unwrap();

        let zh = v.zh().unwrap();
        let th = v.th().unwrap();
        assert!(zh.is_finite() && th.is_finite());
        assert!((zh - (bot.zh().unwrap() + bot.th().unwrap())).abs() < 1e-10);
        assert!((zh + th - top.zh().unwrap()).abs() < 1e-10);
        assert_eq!(stack.vias().count(), 1);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = three_layer_builder().resolve().unwrap();
        let b = three_layer_builder().resolve().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stacked_vias_resolve_in_order() {
        let mut b = LayerStackBuilder::new();
        b.add_entry("met1", entry("routing", 2, Some(0.0), Some(1.0))).unwrap();
        b.add_entry("via1", via(3, "met2", "met1")).unwrap();
        b.add_entry("via2", via(5, "met3", "via1")).unwrap();
        b.add_entry("met2", entry("routing", 4, Some(2.0), Some(1.0))).unwrap();
        b.add_entry("met3", entry("routing", 6, Some(4.0), Some(1.0))).unwrap();
        let stack = b.resolve().unwrap();
        let via2 = stack.find_by_name("via2").unwrap();
        // via1 spans [1, 2], so via2 starts at 2.
        assert!((via2.zh().unwrap() - 2.0).abs() < 1e-10);
        assert!((via2.th().unwrap() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_via_errors() {
        let mut b = LayerStackBuilder::new();
        b.add_entry("met1", entry("routing", 2, Some(0.0), Some(1.0))).unwrap();
        b.add_entry("via1", via(3, "met9", "met1")).unwrap();
        assert_eq!(
            b.resolve().unwrap_err(),
            StackError::UnresolvedViaReference {
                layer: "via1".into(),
                field: "top",
                reference: "met9".into()
            }
        );

        let mut b = LayerStackBuilder::new();
        b.add_entry("via1", entry(VIA_LAYER_TYPE, 3, None, None)).unwrap();
        assert!(matches!(
            b.resolve(),
            Err(StackError::MissingViaReference { field: "top", .. })
        ));

        let mut b = LayerStackBuilder::new();
        b.add_entry("met1", entry("routing", 2, None, Some(1.0))).unwrap();
        b.add_entry("met2", entry("routing", 4, Some(2.0), Some(1.0))).unwrap();
        b.add_entry("via1", via(3, "met2", "met1")).unwrap();
        assert!(matches!(
            b.resolve(),
            Err(StackError::UndeclaredPlacement { field: "zh", .. })
        ));

        assert_eq!(
            LayerStackBuilder::new().resolve().unwrap_err(),
            StackError::NoLayers
        );
    }

    #[test]
    fn test_alias_lookup() {
        let stack = three_layer_builder().resolve().unwrap();
        assert_eq!(stack.find_by_alias("L4").unwrap().name, "met2");
        assert_eq!(stack.find_by_alias("met1").unwrap().key, (2, 0));
        assert!(stack.find_by_alias("nope").is_none());
    }
}
