//! Plugin state file and first-run preset creation
//!
//! The state file is owned by this tool and always rewritten in full. On the
//! first run it is created from a snapshot of the host's current config:
//! "performance" keeps every model as-is, "economy" swaps every leaf model
//! for the default free model.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::config::preset::{ModePreset, ModeSwitcherConfig, PresetMap};
use crate::constants::{env as env_vars, keys, paths, presets};
use crate::persistence::DocumentStore;
use crate::tree::replace_leaf_models;

/// Resolved locations of every file this tool touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    config_dir: PathBuf,
}

impl Paths {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Flag value, then `OPENCODE_CONFIG_DIR`, then `~/.config/opencode`
    pub fn resolve(flag: Option<&Path>) -> Self {
        if let Some(dir) = flag {
            return Self::new(expand_home(dir));
        }
        match env::var_os(env_vars::CONFIG_DIR) {
            Some(dir) if !dir.is_empty() => Self::new(expand_home(Path::new(&dir))),
            _ => Self::new(expand_home(Path::new(paths::HOST_CONFIG_DIR))),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn plugin_state(&self) -> PathBuf {
        self.config_dir.join(paths::PLUGIN_STATE_FILE)
    }

    pub fn opencode(&self) -> PathBuf {
        self.config_dir.join(paths::OPENCODE_FILE)
    }

    pub fn oh_my_opencode(&self) -> PathBuf {
        self.config_dir.join(paths::OH_MY_OPENCODE_FILE)
    }
}

/// Expand a leading `~` component to the home directory; other paths pass through
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => {
            warn!(path = %path.display(), "Home directory unknown, leaving path unexpanded");
            path.to_path_buf()
        }
    }
}

impl ModeSwitcherConfig {
    /// Read the state file; `Ok(None)` when it does not exist yet
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse plugin state from {}", path.display()))?;

        for issue in config.validate() {
            warn!(path = %path.display(), issue = %issue, "Plugin state needs attention");
        }
        Ok(Some(config))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize plugin state to JSON")?;
        fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write plugin state to {}", path.display()))?;
        info!(path = %path.display(), mode = %self.current_mode, "Saved plugin state");
        Ok(())
    }

    /// Existing state verbatim, or a fresh one built from the host config
    pub async fn load_or_create(paths: &Paths, store: &mut DocumentStore) -> Result<Self> {
        let state_path = paths.plugin_state();
        if let Some(config) = Self::load(&state_path).await? {
            return Ok(config);
        }

        info!(path = %state_path.display(), "Plugin state not found, creating presets from current host config");
        let opencode = store.load(&paths.opencode()).await?;
        let oh_my_opencode = store.load(&paths.oh_my_opencode()).await?;
        let config = Self::from_host_documents(opencode.as_ref(), oh_my_opencode.as_ref());
        config.save(&state_path).await?;
        Ok(config)
    }

    /// Built-in presets from the host documents (absent documents count as empty)
    pub fn from_host_documents(opencode: Option<&Value>, oh_my_opencode: Option<&Value>) -> Self {
        let agent_tree = object_or_empty(opencode.and_then(|doc| doc.get(keys::AGENT)));
        let omo_tree = object_or_empty(oh_my_opencode);
        let global_model = opencode
            .and_then(|doc| doc.get(keys::MODEL))
            .and_then(Value::as_str)
            .map(str::to_string);

        let economy = ModePreset {
            description: presets::ECONOMY_DESCRIPTION.to_string(),
            model: Some(presets::DEFAULT_ECONOMY_MODEL.to_string()),
            opencode: replace_leaf_models(&agent_tree, presets::DEFAULT_ECONOMY_MODEL),
            oh_my_opencode: replace_leaf_models(&omo_tree, presets::DEFAULT_ECONOMY_MODEL),
        };
        let performance = ModePreset {
            description: presets::PERFORMANCE_DESCRIPTION.to_string(),
            model: global_model,
            opencode: agent_tree,
            oh_my_opencode: omo_tree,
        };

        let mut preset_map = PresetMap::new();
        preset_map.insert(presets::PERFORMANCE, performance);
        preset_map.insert(presets::ECONOMY, economy);

        Self {
            current_mode: presets::PERFORMANCE.to_string(),
            show_toast_on_startup: true,
            presets: preset_map,
        }
    }
}

/// Object at `value`, or an empty tree when it is missing or not an object
pub(crate) fn object_or_empty(value: Option<&Value>) -> Map<String, Value> {
    value.and_then(Value::as_object).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home(Path::new("~")), home);
        assert_eq!(expand_home(Path::new("~/.config/opencode")), home.join(".config/opencode"));
        assert_eq!(expand_home(Path::new("/etc/opencode")), PathBuf::from("/etc/opencode"));
        assert_eq!(expand_home(Path::new("~other/x")), PathBuf::from("~other/x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_config_dir_keeps_non_utf8_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = Path::new(OsStr::from_bytes(b"/tmp/opencode-\xff"));
        let paths = Paths::resolve(Some(raw));
        assert_eq!(paths.config_dir(), raw);
        assert_eq!(paths.opencode(), raw.join("opencode.json"));

        let home = dirs::home_dir().unwrap();
        let under_home = Path::new(OsStr::from_bytes(b"~/conf-\xfe"));
        assert_eq!(
            expand_home(under_home),
            home.join(OsStr::from_bytes(b"conf-\xfe"))
        );
    }

    #[test]
    fn test_paths_layout() {
        let paths = Paths::resolve(Some(Path::new("/tmp/oc")));
        assert_eq!(paths.plugin_state(), PathBuf::from("/tmp/oc/agent-mode-switcher.json"));
        assert_eq!(paths.opencode(), PathBuf::from("/tmp/oc/opencode.json"));
        assert_eq!(paths.oh_my_opencode(), PathBuf::from("/tmp/oc/oh-my-opencode.json"));
    }

    #[test]
    fn test_from_host_documents() {
        let opencode = json!({
            "model": "anthropic/claude-opus",
            "theme": "dark",
            "agent": {
                "build": {"model": "anthropic/claude-sonnet", "temperature": 0.2},
                "team": {"review": {"model": "openai/gpt-5", "variant": "high"}}
            }
        });
        let omo = json!({
            "agents": {"oracle": {"model": "openai/gpt-5"}},
            "disabled_hooks": ["x"]
        });

        let config = ModeSwitcherConfig::from_host_documents(Some(&opencode), Some(&omo));

        assert_eq!(config.current_mode, "performance");
        assert_eq!(config.presets.names().collect::<Vec<_>>(), vec!["performance", "economy"]);

        let performance = config.presets.get("performance").unwrap();
        assert_eq!(performance.model.as_deref(), Some("anthropic/claude-opus"));
        assert_eq!(Value::Object(performance.opencode.clone()), opencode["agent"]);
        assert_eq!(Value::Object(performance.oh_my_opencode.clone()), omo);

        let economy = config.presets.get("economy").unwrap();
        assert_eq!(economy.model.as_deref(), Some(presets::DEFAULT_ECONOMY_MODEL));
        assert_eq!(
            Value::Object(economy.opencode.clone()),
            json!({
                "build": {"model": presets::DEFAULT_ECONOMY_MODEL, "temperature": 0.2},
                "team": {"review": {"model": presets::DEFAULT_ECONOMY_MODEL, "variant": "high"}}
            })
        );
        assert_eq!(
            Value::Object(economy.oh_my_opencode.clone()),
            json!({
                "agents": {"oracle": {"model": presets::DEFAULT_ECONOMY_MODEL}},
                "disabled_hooks": ["x"]
            })
        );
    }

    #[test]
    fn test_from_missing_host_documents() {
        let config = ModeSwitcherConfig::from_host_documents(None, None);

        let performance = config.presets.get("performance").unwrap();
        assert_eq!(performance.model, None);
        assert!(performance.opencode.is_empty());
        assert!(performance.oh_my_opencode.is_empty());

        // Economy always carries the default global model
        let economy = config.presets.get("economy").unwrap();
        assert_eq!(economy.model.as_deref(), Some(presets::DEFAULT_ECONOMY_MODEL));
        assert!(config.validate().is_empty());
    }

    #[tokio::test]
    async fn test_load_or_create_snapshots_then_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let paths = Paths::new(dir.path());
        std::fs::write(
            paths.opencode(),
            "{\n  // host\n  \"agent\": { \"build\": { \"model\": \"big\" } }\n}",
        )
        .unwrap();
        let mut store = DocumentStore::default();

        let created = ModeSwitcherConfig::load_or_create(&paths, &mut store).await.unwrap();
        assert!(paths.plugin_state().exists());
        assert_eq!(
            created.presets.get("performance").unwrap().opencode.get("build"),
            Some(&json!({"model": "big"}))
        );

        // A user edit to the state file must survive the next start
        let mut edited = created.clone();
        edited.current_mode = "economy".to_string();
        edited.save(&paths.plugin_state()).await.unwrap();

        let reloaded = ModeSwitcherConfig::load_or_create(&paths, &mut store).await.unwrap();
        assert_eq!(reloaded, edited);
    }

    #[tokio::test]
    async fn test_load_reports_malformed_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agent-mode-switcher.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ModeSwitcherConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse plugin state"));
    }

    #[test]
    fn test_object_or_empty() {
        assert!(object_or_empty(None).is_empty());
        assert!(object_or_empty(Some(&json!([1]))).is_empty());
        assert_eq!(object_or_empty(Some(&json!({"a": 1}))).len(), 1);
    }
}
