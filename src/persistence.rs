//! Host document persistence
//!
//! Host documents are JSON with comments and belong to the user. Reads go
//! through [`DocumentStore::load`], which remembers the raw text; writes go
//! through [`DocumentStore::save`], which patches that remembered text so
//! comments and layout survive, then remembers the new text.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::jsonc::{self, FormatOptions};

/// Last known raw text per file, used as the base for the next patch
#[derive(Debug, Default)]
pub struct TextCache {
    entries: HashMap<PathBuf, String>,
}

impl TextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: String) {
        self.entries.insert(path.into(), text);
    }

    #[cfg(test)]
    pub fn remove(&mut self, path: &Path) -> Option<String> {
        self.entries.remove(path)
    }

    /// Forget everything; the next save of any file is a full rewrite
    #[cfg(test)]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads and writes host documents, owning the text cache
#[derive(Debug, Default)]
pub struct DocumentStore {
    cache: TextCache,
    format: FormatOptions,
}

impl DocumentStore {
    pub fn new(format: FormatOptions) -> Self {
        Self {
            cache: TextCache::new(),
            format,
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &TextCache {
        &self.cache
    }

    #[cfg(test)]
    pub fn cache_mut(&mut self) -> &mut TextCache {
        &mut self.cache
    }

    /// Whether `path` exists; errors when existence cannot be determined
    pub async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to check {}", path.display()))
    }

    /// Parsed document; `Ok(None)` when it is missing or malformed.
    /// Other read failures are errors.
    pub async fn load(&mut self, path: &Path) -> Result<Option<Value>> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Document not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        match jsonc::parse(&text) {
            Ok(value) => {
                self.cache.insert(path, text);
                Ok(Some(value))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Failed to parse document");
                Ok(None)
            }
        }
    }

    /// Write `value` to `path`, preserving comments when the previous text is known
    pub async fn save(&mut self, path: &Path, value: &Value) -> Result<()> {
        let text = self.render(path, value)?;

        fs::write(path, &text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        self.cache.insert(path, text);
        info!(path = %path.display(), "Saved document");
        Ok(())
    }

    /// Text that `save` would write
    fn render(&self, path: &Path, value: &Value) -> Result<String> {
        if let Some(original) = self.cache.get(path) {
            match jsonc::parse(original) {
                Ok(snapshot) => {
                    return jsonc::patch_document(original, &snapshot, value, &self.format)
                        .with_context(|| format!("Failed to patch {}", path.display()));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{e:#}"), "Cached text no longer parses, rewriting in full");
                }
            }
        } else {
            debug!(path = %path.display(), "No cached text, writing full document");
        }
        self.format.render(value, "")
    }
}
