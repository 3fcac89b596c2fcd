//! Mode switching operations
//!
//! The three user-facing operations (`switch`, `status`, `list`) and the
//! startup sequence. Operations never fail: every error ends up as text in
//! the returned result so the caller can show it as-is.

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::persistent::object_or_empty;
use crate::config::{ModePreset, ModeSwitcherConfig, Paths};
use crate::constants::{format, keys, paths as file_names, toast};
use crate::notify::{fire_and_forget, Notifier, Toast, ToastVariant};
use crate::persistence::DocumentStore;
use crate::tree::{format_tree, has_drift, merge_model};

/// Result of updating one host document during a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Updated,
    Skipped,
    Failed(String),
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Updated => f.write_str("updated"),
            FileOutcome::Skipped => f.write_str("skipped (not found)"),
            FileOutcome::Failed(message) => write!(f, "error: {message}"),
        }
    }
}

/// Whether the host documents matched the active preset at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftState {
    Clean,
    Drifted,
}

pub struct ModeSwitcher<N: Notifier> {
    paths: Paths,
    store: DocumentStore,
    notifier: Arc<N>,
}

impl<N: Notifier> ModeSwitcher<N> {
    pub fn new(paths: Paths, store: DocumentStore, notifier: Arc<N>) -> Self {
        Self {
            paths,
            store,
            notifier,
        }
    }

    /// Load or create the plugin state, then bring the host documents back
    /// in line with the active preset. Failures are logged, never returned.
    pub async fn initialize(&mut self) -> Option<ModeSwitcherConfig> {
        let config = match ModeSwitcherConfig::load_or_create(&self.paths, &mut self.store).await {
            Ok(config) => config,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to initialize plugin state");
                return None;
            }
        };

        if self.reconcile(&config).await == DriftState::Drifted {
            fire_and_forget(
                &self.notifier,
                Toast::new(
                    "Agent Mode",
                    format!(
                        "Config drift detected, re-applied \"{}\". Restart opencode to apply.",
                        config.current_mode
                    ),
                    ToastVariant::Warning,
                    toast::RESTART_DURATION,
                ),
            );
        }

        if config.show_toast_on_startup {
            fire_and_forget(
                &self.notifier,
                Toast::new(
                    "Agent Mode",
                    format!("Current mode: {}", config.current_mode),
                    ToastVariant::Info,
                    toast::STARTUP_DURATION,
                ),
            );
        }

        Some(config)
    }

    /// Re-apply the active preset if the host documents disagree with it.
    /// Only documents that exist are written.
    pub async fn reconcile(&mut self, config: &ModeSwitcherConfig) -> DriftState {
        let Some(preset) = config.current_preset() else {
            warn!(mode = %config.current_mode, "Current mode has no preset, skipping drift check");
            return DriftState::Clean;
        };

        let opencode_path = self.paths.opencode();
        let omo_path = self.paths.oh_my_opencode();
        let opencode = self.load_for_reconcile(&opencode_path).await;
        let oh_my_opencode = self.load_for_reconcile(&omo_path).await;

        let drifted = opencode.as_ref().is_some_and(|doc| opencode_drift(doc, preset))
            || oh_my_opencode
                .as_ref()
                .is_some_and(|doc| has_drift(&object_or_empty(Some(doc)), &preset.oh_my_opencode));
        if !drifted {
            return DriftState::Clean;
        }

        info!(mode = %config.current_mode, "Host config drifted from preset, re-applying");
        if let Some(mut doc) = opencode {
            self.apply_and_save(&opencode_path, &mut doc, |doc| apply_opencode_preset(doc, preset))
                .await;
        }
        if let Some(mut doc) = oh_my_opencode {
            self.apply_and_save(&omo_path, &mut doc, |doc| apply_oh_my_opencode_preset(doc, preset))
                .await;
        }
        DriftState::Drifted
    }

    /// Apply the named preset to both host documents and make it current
    pub async fn switch(&mut self, mode: &str) -> String {
        let mut config = match ModeSwitcherConfig::load_or_create(&self.paths, &mut self.store).await {
            Ok(config) => config,
            Err(e) => return format!("error: {e:#}"),
        };

        let Some(preset) = config.presets.get(mode).cloned() else {
            let available: Vec<&str> = config.presets.names().collect();
            info!(mode, "Unknown mode requested");
            return format!(
                "Mode \"{mode}\" not found. Available modes: {}",
                available.join(", ")
            );
        };

        let opencode_path = self.paths.opencode();
        let omo_path = self.paths.oh_my_opencode();
        let opencode = self
            .update_file(&opencode_path, |doc| apply_opencode_preset(doc, &preset))
            .await;
        let oh_my_opencode = self
            .update_file(&omo_path, |doc| apply_oh_my_opencode_preset(doc, &preset))
            .await;

        config.current_mode = mode.to_string();
        let state = match config.save(&self.paths.plugin_state()).await {
            Ok(()) => FileOutcome::Updated,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to save plugin state");
                FileOutcome::Failed(format!("{e:#}"))
            }
        };
        info!(mode, %opencode, %oh_my_opencode, "Switched mode");

        let failed = [&opencode, &oh_my_opencode, &state]
            .iter()
            .any(|outcome| matches!(outcome, FileOutcome::Failed(_)));
        let (variant, message) = if failed {
            (
                ToastVariant::Error,
                format!("Switched to {mode} with errors. Check the switch results."),
            )
        } else {
            (
                ToastVariant::Success,
                format!("Switched to {mode}. Restart opencode to apply."),
            )
        };
        fire_and_forget(
            &self.notifier,
            Toast::new("Agent Mode", message, variant, toast::RESTART_DURATION),
        );

        let mut lines = vec![format!("Switched to {mode} mode")];
        if !preset.description.is_empty() {
            lines.push(preset.description.clone());
        }
        lines.push(String::new());
        lines.push("Results:".to_string());
        lines.push(format!("- {}: {opencode}", file_names::OPENCODE_FILE));
        lines.push(format!("- {}: {oh_my_opencode}", file_names::OH_MY_OPENCODE_FILE));
        lines.push(format!("- {}: {state}", file_names::PLUGIN_STATE_FILE));
        lines.push(String::new());
        lines.push("Restart opencode to apply the new configuration.".to_string());
        lines.join("\n")
    }

    /// Active mode with its formatted preset trees
    pub async fn status(&mut self) -> String {
        let config = match ModeSwitcherConfig::load_or_create(&self.paths, &mut self.store).await {
            Ok(config) => config,
            Err(e) => return format!("error: {e:#}"),
        };

        let Some(preset) = config.current_preset() else {
            return format!("Current mode: {} (preset not found)", config.current_mode);
        };

        let header = format!(
            "Current mode: {}\nDescription: {}\nGlobal model: {}",
            config.current_mode,
            preset.description,
            preset.model.as_deref().unwrap_or("(not set)")
        );
        [
            header,
            format!("OpenCode agents:\n{}", tree_or_placeholder(&preset.opencode)),
            format!("Oh-my-opencode:\n{}", tree_or_placeholder(&preset.oh_my_opencode)),
        ]
        .join("\n\n")
    }

    /// Every preset name and description, marking the active one
    pub async fn list(&mut self) -> String {
        let config = match ModeSwitcherConfig::load_or_create(&self.paths, &mut self.store).await {
            Ok(config) => config,
            Err(e) => return format!("error: {e:#}"),
        };

        let mut lines = vec!["Available modes:".to_string()];
        for (name, preset) in config.presets.iter() {
            let marker = if name == config.current_mode { " (current)" } else { "" };
            lines.push(format!("- {name}{marker}: {}", preset.description));
        }
        lines.join("\n")
    }

    async fn update_file<F>(&mut self, path: &Path, apply: F) -> FileOutcome
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        match self.store.exists(path).await {
            Ok(true) => {}
            Ok(false) => return FileOutcome::Skipped,
            Err(e) => {
                error!(path = %path.display(), error = %format!("{e:#}"), "Failed to check document");
                return FileOutcome::Failed(format!("{e:#}"));
            }
        }
        let mut doc = match self.store.load(path).await {
            Ok(Some(doc)) => doc,
            // Malformed documents are treated like missing ones
            Ok(None) => return FileOutcome::Skipped,
            Err(e) => return FileOutcome::Failed(format!("{e:#}")),
        };
        self.apply_and_save(path, &mut doc, apply).await
    }

    async fn apply_and_save<F>(&mut self, path: &Path, doc: &mut Value, apply: F) -> FileOutcome
    where
        F: FnOnce(&mut Value) -> Result<()>,
    {
        let result = match apply(&mut *doc) {
            Ok(()) => self.store.save(path, doc).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => FileOutcome::Updated,
            Err(e) => {
                error!(path = %path.display(), error = %format!("{e:#}"), "Failed to update document");
                FileOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    async fn load_for_reconcile(&mut self, path: &Path) -> Option<Value> {
        match self.store.load(path).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Skipping drift check for document");
                None
            }
        }
    }
}

/// Global model differs, or the agent tree drifted
fn opencode_drift(doc: &Value, preset: &ModePreset) -> bool {
    let global_drift = preset
        .model
        .as_deref()
        .is_some_and(|model| doc.get(keys::MODEL).and_then(Value::as_str) != Some(model));
    global_drift || has_drift(&object_or_empty(doc.get(keys::AGENT)), &preset.opencode)
}

fn apply_opencode_preset(doc: &mut Value, preset: &ModePreset) -> Result<()> {
    let Some(root) = doc.as_object_mut() else {
        bail!("opencode config is not a JSON object");
    };
    if let Some(model) = &preset.model {
        root.insert(keys::MODEL.to_string(), Value::String(model.clone()));
    }
    let agent = root
        .entry(keys::AGENT)
        .or_insert_with(|| Value::Object(Map::new()));
    if !agent.is_object() {
        *agent = Value::Object(Map::new());
    }
    if let Value::Object(agent) = agent {
        merge_model(agent, &preset.opencode);
    }
    Ok(())
}

fn apply_oh_my_opencode_preset(doc: &mut Value, preset: &ModePreset) -> Result<()> {
    let Some(root) = doc.as_object_mut() else {
        bail!("oh-my-opencode config is not a JSON object");
    };
    merge_model(root, &preset.oh_my_opencode);
    Ok(())
}

fn tree_or_placeholder(tree: &Map<String, Value>) -> String {
    let formatted = format_tree(tree, format::TREE_INDENT);
    if formatted.is_empty() {
        format!("{}(none)", format::TREE_INDENT)
    } else {
        formatted
    }
}
