//! Comment-preserving rewrites
//!
//! Walks the new data alongside the previously parsed snapshot and edits the
//! text only where a value actually changed. Unchanged subtrees are never
//! touched, so comments, key order and layout around them survive. Every
//! edit is located against the text as left by the previous edit.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::ops::Range;

use super::{parse_tree, Property, SyntaxNode};
use crate::constants::format;

/// Layout used for any text the patcher writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub tab_size: usize,
    pub insert_spaces: bool,
    pub eol: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            tab_size: format::TAB_SIZE,
            insert_spaces: true,
            eol: format::EOL.to_string(),
        }
    }
}

impl FormatOptions {
    fn indent_unit(&self) -> String {
        if self.insert_spaces {
            " ".repeat(self.tab_size)
        } else {
            "\t".to_string()
        }
    }

    /// Pretty-print `value`; continuation lines are prefixed with `base_indent`
    pub fn render(&self, value: &Value, base_indent: &str) -> Result<String> {
        let unit = self.indent_unit();
        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(unit.as_bytes()));
        value
            .serialize(&mut serializer)
            .context("Failed to serialize value")?;
        let pretty = String::from_utf8(out).context("Serializer produced invalid UTF-8")?;
        Ok(pretty.replace('\n', &format!("{}{base_indent}", self.eol)))
    }
}

/// Rewrite `text` so it parses to `updated`.
///
/// `original` is the value `text` was parsed to. Subtrees equal in both are
/// left alone; changed scalars and arrays are replaced in place; changed
/// objects that already exist in the text are descended into key by key.
pub fn patch_document(
    text: &str,
    original: &Value,
    updated: &Value,
    options: &FormatOptions,
) -> Result<String> {
    let mut text = text.to_string();
    let mut path = Vec::new();
    patch_node(&mut text, Some(original), updated, &mut path, options)?;
    Ok(text)
}

fn patch_node(
    text: &mut String,
    original: Option<&Value>,
    updated: &Value,
    path: &mut Vec<String>,
    options: &FormatOptions,
) -> Result<()> {
    if original == Some(updated) {
        return Ok(());
    }

    if let Value::Object(entries) = updated {
        let root = parse_tree(text)?;
        let is_object_in_text = root
            .find(path)
            .is_some_and(|node| node.properties().is_some());

        if is_object_in_text {
            for (key, value) in entries {
                path.push(key.clone());
                let before = original.and_then(|o| o.get(key));
                patch_node(text, before, value, path, options)?;
                path.pop();
            }
            return remove_stale_properties(text, entries, path);
        }
    }

    set_value(text, path, updated, options)
}

/// Replace the value at `path`, or add it to its parent object
fn set_value(
    text: &mut String,
    path: &[String],
    value: &Value,
    options: &FormatOptions,
) -> Result<()> {
    let root = parse_tree(text)?;

    if let Some(node) = root.find(path) {
        let indent = line_indent(text, node.span.start);
        let rendered = options.render(value, &indent)?;
        text.replace_range(node.span.clone(), &rendered);
        return Ok(());
    }

    let Some((key, parent_path)) = path.split_last() else {
        bail!("No value at {} and it cannot be inserted", describe(path));
    };
    let Some(parent) = root.find(parent_path).filter(|n| n.properties().is_some()) else {
        bail!("Parent of {} is not an object", describe(path));
    };
    insert_property(text, parent, key, value, options)
}

fn insert_property(
    text: &mut String,
    object: &SyntaxNode,
    key: &str,
    value: &Value,
    options: &FormatOptions,
) -> Result<()> {
    let props = object.properties().unwrap_or_default();
    let key_json = serde_json::to_string(key).context("Failed to serialize key")?;
    let object_indent = line_indent(text, object.span.start);
    let eol = &options.eol;

    let (Some(first), Some(last)) = (props.first(), props.last()) else {
        let inner_indent = format!("{object_indent}{}", options.indent_unit());
        let rendered = options.render(value, &inner_indent)?;
        let entry = format!("{eol}{inner_indent}{key_json}: {rendered}");
        let body = &text[object.span.start + 1..object.span.end - 1];
        if body.trim().is_empty() {
            text.replace_range(object.span.clone(), &format!("{{{entry}{eol}{object_indent}}}"));
        } else {
            // Only comments inside the braces; keep them after the new entry
            text.insert_str(object.span.start + 1, &entry);
        }
        return Ok(());
    };

    let at = last.comma.map_or(last.value.span.end, |comma| comma + 1);
    let separator = if last.comma.is_some() { "" } else { "," };
    let multiline = text[object.span.start..first.key_span.start].contains('\n');

    let entry = if multiline {
        let prop_indent = line_indent(text, first.key_span.start);
        let rendered = options.render(value, &prop_indent)?;
        format!("{separator}{eol}{prop_indent}{key_json}: {rendered}")
    } else {
        let rendered = options.render(value, &object_indent)?;
        format!("{separator} {key_json}: {rendered}")
    };
    text.insert_str(at, &entry);
    Ok(())
}

/// Drop properties of the object at `path` that `entries` no longer has
fn remove_stale_properties(
    text: &mut String,
    entries: &Map<String, Value>,
    path: &[String],
) -> Result<()> {
    loop {
        let root = parse_tree(text)?;
        let Some(props) = root.find(path).and_then(SyntaxNode::properties) else {
            return Ok(());
        };
        let Some(index) = props.iter().position(|p| !entries.contains_key(&p.key)) else {
            return Ok(());
        };
        let range = removal_range(text, props, index);
        text.replace_range(range, "");
    }
}

fn removal_range(text: &str, props: &[Property], index: usize) -> Range<usize> {
    let prop = &props[index];
    let mut start = prop.key_span.start;
    let mut end = prop.comma.map_or(prop.value.span.end, |comma| comma + 1);

    // Last entry without a trailing comma takes the separator before it
    if prop.comma.is_none() && index > 0 {
        if let Some(previous) = props[index - 1].comma {
            start = previous;
        }
        return start..end;
    }

    // Swallow the whole line when the property stands alone on it
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i + 1);
    if text[line_start..start].trim().is_empty() && text[end..line_end].trim().is_empty() {
        start = line_start;
        end = line_end;
    }
    start..end
}

/// Leading whitespace of the line containing `pos`
fn line_indent(text: &str, pos: usize) -> String {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    text[line_start..pos]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

fn describe(path: &[String]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonc::parse;
    use serde_json::json;

    fn patch(text: &str, updated: &Value) -> String {
        let original = parse(text).unwrap();
        patch_document(text, &original, updated, &FormatOptions::default()).unwrap()
    }

    const COMMENTED: &str = r#"{
  // Global model
  "model": "anthropic/claude-sonnet-4",
  "agent": {
    /* primary agents */
    "build": {
      "model": "anthropic/claude-sonnet-4", // strong
      "temperature": 0.2
    },
    "plan": { "model": "openai/gpt-5" }
  }
}
"#;

    #[test]
    fn test_unchanged_data_is_byte_identical() {
        let odd = "{ \"a\" :1,\n\n\t\"b\": [ 1,2 ] , // keep\n}";
        assert_eq!(patch(odd, &parse(odd).unwrap()), odd);
        assert_eq!(patch(COMMENTED, &parse(COMMENTED).unwrap()), COMMENTED);
    }

    #[test]
    fn test_model_change_keeps_comments() {
        let mut updated = parse(COMMENTED).unwrap();
        updated["model"] = json!("opencode/grok-code");
        updated["agent"]["build"]["model"] = json!("opencode/grok-code");
        updated["agent"]["plan"]["model"] = json!("opencode/grok-code");

        let patched = patch(COMMENTED, &updated);

        assert_eq!(
            patched,
            r#"{
  // Global model
  "model": "opencode/grok-code",
  "agent": {
    /* primary agents */
    "build": {
      "model": "opencode/grok-code", // strong
      "temperature": 0.2
    },
    "plan": { "model": "opencode/grok-code" }
  }
}
"#
        );
        assert_eq!(parse(&patched).unwrap(), updated);
    }

    #[test]
    fn test_insert_into_multiline_object() {
        let mut updated = parse(COMMENTED).unwrap();
        updated["agent"]["explore"] = json!({"model": "x"});

        let patched = patch(COMMENTED, &updated);

        assert!(patched.contains(
            "\"plan\": { \"model\": \"openai/gpt-5\" },\n    \"explore\": {\n      \"model\": \"x\"\n    }\n  }\n}"
        ));
        assert!(patched.contains("// strong"));
        assert_eq!(parse(&patched).unwrap(), updated);
    }

    #[test]
    fn test_insert_into_empty_object() {
        assert_eq!(patch("{}", &json!({"a": 1})), "{\n  \"a\": 1\n}");
        assert_eq!(
            patch("{\n  \"agent\": {}\n}", &json!({"agent": {"build": {"model": "m"}}})),
            "{\n  \"agent\": {\n    \"build\": {\n      \"model\": \"m\"\n    }\n  }\n}"
        );
    }

    #[test]
    fn test_insert_into_object_holding_only_comments() {
        let text = "{ /* nothing yet */ }";
        let patched = patch(text, &json!({"a": true}));
        assert!(patched.contains("/* nothing yet */"));
        assert_eq!(parse(&patched).unwrap(), json!({"a": true}));
    }

    #[test]
    fn test_insert_inline_object() {
        assert_eq!(patch(r#"{"a": 1}"#, &json!({"a": 1, "b": 2})), r#"{"a": 1, "b": 2}"#);
    }

    #[test]
    fn test_insert_after_trailing_comma() {
        let text = "{\n  \"a\": 1,\n}";
        let patched = patch(text, &json!({"a": 1, "b": 2}));
        assert_eq!(patched, "{\n  \"a\": 1,\n  \"b\": 2\n}");
    }

    #[test]
    fn test_creates_missing_parent_objects() {
        let text = "{\n  // settings\n  \"theme\": \"dark\"\n}";
        let updated = json!({"theme": "dark", "agents": {"oracle": {"model": "o1"}}});

        let patched = patch(text, &updated);

        assert!(patched.contains("// settings"));
        assert_eq!(parse(&patched).unwrap(), updated);
    }

    #[test]
    fn test_array_replaced_wholesale() {
        let text = "{\n  \"tags\": [1, 2], // numbers\n  \"x\": 0\n}";
        let updated = json!({"tags": [3], "x": 0});

        let patched = patch(text, &updated);

        assert_eq!(patched, "{\n  \"tags\": [\n    3\n  ], // numbers\n  \"x\": 0\n}");
    }

    #[test]
    fn test_type_change_replaces_value() {
        let patched = patch(r#"{"agent": "none"}"#, &json!({"agent": {"build": {"model": "m"}}}));
        assert_eq!(parse(&patched).unwrap(), json!({"agent": {"build": {"model": "m"}}}));
    }

    #[test]
    fn test_remove_property_on_own_line() {
        let text = "{\n  \"a\": 1,\n  \"b\": 2\n}";
        assert_eq!(patch(text, &json!({"b": 2})), "{\n  \"b\": 2\n}");
        assert_eq!(patch(text, &json!({"a": 1})), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_remove_only_property() {
        let text = "{\n  \"keep\": {\n    \"a\": 1\n  }\n}";
        let patched = patch(text, &json!({"keep": {}}));
        assert_eq!(parse(&patched).unwrap(), json!({"keep": {}}));
    }

    #[test]
    fn test_scalar_root_replaced() {
        assert_eq!(patch("// c\n1", &json!(2)), "// c\n2");
    }

    #[test]
    fn test_render_uses_tabs_when_requested() {
        let options = FormatOptions {
            tab_size: 4,
            insert_spaces: false,
            eol: "\r\n".to_string(),
        };
        let rendered = options.render(&json!({"a": 1}), "  ").unwrap();
        assert_eq!(rendered, "{\r\n  \t\"a\": 1\r\n  }");
    }
}
