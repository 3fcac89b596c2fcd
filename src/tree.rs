//! Hierarchical preset engine
//!
//! Presets and host documents share one untagged shape: a JSON object whose
//! values are either leaves (objects with a string `model` field) or branches
//! (any other object), nested to arbitrary depth. [`classify`] is the only
//! place that decides which is which; merge, drift detection, formatting and
//! economy derivation all go through it.
//!
//! Values that are not objects (arrays, strings, numbers) are skipped by every
//! walker here. Host documents contain plenty of those next to the agent
//! trees and they are not part of any preset.

use serde_json::{Map, Value};

use crate::config::ModelConfig;
use crate::constants::{format, keys};

/// A node of a hierarchical preset, as seen by the walkers
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// Carries a model assignment
    Leaf(&'a Map<String, Value>),
    /// Only nests further children
    Branch(&'a Map<String, Value>),
}

/// True iff the object has a `model` key holding a string
pub fn is_leaf_node(node: &Map<String, Value>) -> bool {
    matches!(node.get(keys::MODEL), Some(Value::String(_)))
}

/// Classify a value; `None` for anything that is not an object
pub fn classify(value: &Value) -> Option<Node<'_>> {
    let object = value.as_object()?;
    if is_leaf_node(object) {
        Some(Node::Leaf(object))
    } else {
        Some(Node::Branch(object))
    }
}

/// Overlay `preset` onto `target` in place.
///
/// Leaf fields from the preset overwrite the matching fields of the existing
/// target leaf; fields only the target has are kept. Branches missing from
/// the target are created. Nothing is ever deleted.
pub fn merge_model(target: &mut Map<String, Value>, preset: &Map<String, Value>) {
    for (key, value) in preset {
        match classify(value) {
            None => continue,
            Some(Node::Leaf(leaf)) => {
                let mut merged = match target.get(key) {
                    Some(Value::Object(existing)) => existing.clone(),
                    _ => Map::new(),
                };
                for (field, field_value) in leaf {
                    merged.insert(field.clone(), field_value.clone());
                }
                target.insert(key.clone(), Value::Object(merged));
            }
            Some(Node::Branch(branch)) => {
                let child = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                // A scalar sitting where the preset expects a branch is replaced
                if !child.is_object() {
                    *child = Value::Object(Map::new());
                }
                if let Value::Object(child) = child {
                    merge_model(child, branch);
                }
            }
        }
    }
}

/// True as soon as `actual` disagrees with any leaf field in `expected`.
///
/// A leaf missing from `actual` counts as drift. Fields that only `actual`
/// carries are never inspected.
pub fn has_drift(actual: &Map<String, Value>, expected: &Map<String, Value>) -> bool {
    expected.iter().any(|(key, value)| match classify(value) {
        None => false,
        Some(Node::Leaf(leaf)) => match actual.get(key).and_then(Value::as_object) {
            None => true,
            Some(current) => leaf
                .iter()
                .any(|(field, expected_value)| current.get(field) != Some(expected_value)),
        },
        Some(Node::Branch(branch)) => match actual.get(key).and_then(Value::as_object) {
            Some(child) => has_drift(child, branch),
            None => has_drift(&Map::new(), branch),
        },
    })
}

/// Render a preset as an indented tree, one line per node, no trailing newline.
///
/// Leaves render as `key: model (variant) [other: json, ...]`; branches render
/// as `key:` followed by their children one indent step deeper.
pub fn format_tree(preset: &Map<String, Value>, indent: &str) -> String {
    let mut lines = Vec::new();
    let child_indent = format!("{indent}{}", format::TREE_INDENT);

    for (key, value) in preset {
        match classify(value) {
            None => continue,
            Some(Node::Leaf(leaf)) => {
                let Some(config) = ModelConfig::from_node(leaf) else {
                    continue;
                };
                let mut line = format!("{indent}{key}: {}", config.model);
                if let Some(variant) = &config.variant {
                    line.push_str(&format!(" ({variant})"));
                }
                if !config.extra.is_empty() {
                    let extras: Vec<String> = config
                        .extra
                        .iter()
                        .map(|(name, extra)| format!("{name}: {extra}"))
                        .collect();
                    line.push_str(&format!(" [{}]", extras.join(", ")));
                }
                lines.push(line);
            }
            Some(Node::Branch(branch)) => {
                lines.push(format!("{indent}{key}:"));
                let nested = format_tree(branch, &child_indent);
                if !nested.is_empty() {
                    lines.push(nested);
                }
            }
        }
    }

    lines.join("\n")
}

/// Deep copy of `tree` with every leaf's `model` replaced by `model`.
/// Other leaf fields and non-object values are carried over untouched.
pub fn replace_leaf_models(tree: &Map<String, Value>, model: &str) -> Map<String, Value> {
    tree.iter()
        .map(|(key, value)| {
            let replaced = match classify(value) {
                None => value.clone(),
                Some(Node::Leaf(leaf)) => {
                    let mut leaf = leaf.clone();
                    leaf.insert(keys::MODEL.to_string(), Value::String(model.to_string()));
                    Value::Object(leaf)
                }
                Some(Node::Branch(branch)) => Value::Object(replace_leaf_models(branch, model)),
            };
            (key.clone(), replaced)
        })
        .collect()
}
