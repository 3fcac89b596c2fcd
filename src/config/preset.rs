//! Preset data model
//!
//! A preset bundles model assignments for both host documents. The plugin
//! state file holds every preset plus the name of the active one.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::constants::keys;

/// Leaf of a hierarchical preset: a model plus whatever else the host accepts
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    /// Non-empty variant name
    pub variant: Option<String>,
    /// Everything besides model/variant, in document order
    pub extra: Map<String, Value>,
}

impl ModelConfig {
    /// Typed view of a leaf object; `None` when `model` is not a string
    pub fn from_node(node: &Map<String, Value>) -> Option<Self> {
        let model = node.get(keys::MODEL)?.as_str()?.to_string();
        let mut variant = None;
        let mut extra = Map::new();
        for (key, value) in node {
            match (key.as_str(), value) {
                (keys::MODEL, _) => {}
                // An empty variant means no variant
                (keys::VARIANT, Value::String(v)) if v.is_empty() => {}
                (keys::VARIANT, Value::String(v)) => variant = Some(v.clone()),
                _ => {
                    extra.insert(key.clone(), value.clone());
                }
            }
        }
        Some(Self { model, variant, extra })
    }
}

/// Arbitrary-depth tree of leaves and branches (see `crate::tree`)
pub type HierarchicalPreset = Map<String, Value>;

/// One named configuration bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModePreset {
    #[serde(default)]
    pub description: String,

    /// Global default model written to opencode.json's top-level `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Applied to the `agent` tree of opencode.json
    #[serde(default)]
    pub opencode: HierarchicalPreset,

    /// Applied to the root of oh-my-opencode.json
    #[serde(rename = "oh-my-opencode", default)]
    pub oh_my_opencode: HierarchicalPreset,
}

/// Plugin-owned persistent state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeSwitcherConfig {
    pub current_mode: String,
    #[serde(default)]
    pub show_toast_on_startup: bool,
    pub presets: PresetMap,
}

impl ModeSwitcherConfig {
    /// Preset for `current_mode`, if the user kept it
    pub fn current_preset(&self) -> Option<&ModePreset> {
        self.presets.get(&self.current_mode)
    }

    /// Structural problems that make operations degrade.
    /// Returns human-readable issues; an empty list means the state is sound.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.presets.is_empty() {
            issues.push("no presets defined".to_string());
        }
        if !self.presets.contains(&self.current_mode) {
            issues.push(format!(
                "currentMode \"{}\" has no matching preset",
                self.current_mode
            ));
        }
        issues
    }
}

/// Presets keyed by name, in the order they appear in the state file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetMap(Vec<(String, ModePreset)>);

impl PresetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ModePreset> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace; replacing keeps the original position
    pub fn insert(&mut self, name: impl Into<String>, preset: ModePreset) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = preset,
            None => self.0.push((name, preset)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModePreset)> {
        self.0.iter().map(|(n, p)| (n.as_str(), p))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PresetMap {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, preset) in &self.0 {
            map.serialize_entry(name, preset)?;
        }
        map.end()
    }
}

/// Deserializes a JSON object without losing its key order.
/// A duplicated name keeps the last definition, like a plain JSON object.
impl<'de> Deserialize<'de> for PresetMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PresetMapVisitor;

        impl<'de> Visitor<'de> for PresetMapVisitor {
            type Value = PresetMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of preset name to preset")
            }

            fn visit_map<A>(self, mut access: A) -> Result<PresetMap, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut presets = PresetMap::new();
                while let Some((name, preset)) = access.next_entry::<String, ModePreset>()? {
                    presets.insert(name, preset);
                }
                Ok(presets)
            }
        }

        deserializer.deserialize_map(PresetMapVisitor)
    }
}
