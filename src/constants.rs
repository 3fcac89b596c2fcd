//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// File locations for the plugin state and the host's configuration documents
pub mod paths {
    /// Host configuration directory (leading `~` expands to the home directory)
    pub const HOST_CONFIG_DIR: &str = "~/.config/opencode";

    /// Plugin-owned state file (plain JSON, rewritten in full)
    pub const PLUGIN_STATE_FILE: &str = "agent-mode-switcher.json";

    /// Host primary config (JSON with comments)
    pub const OPENCODE_FILE: &str = "opencode.json";

    /// Host secondary config (JSON with comments)
    pub const OH_MY_OPENCODE_FILE: &str = "oh-my-opencode.json";
}

/// Environment variable names
pub mod env {
    /// Overrides the host configuration directory
    pub const CONFIG_DIR: &str = "OPENCODE_CONFIG_DIR";

    /// Log verbosity (trace, debug, info, warn, error)
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Built-in presets created on first run
pub mod presets {
    pub const PERFORMANCE: &str = "performance";
    pub const PERFORMANCE_DESCRIPTION: &str = "High-performance models for complex tasks";

    pub const ECONOMY: &str = "economy";
    pub const ECONOMY_DESCRIPTION: &str = "Cost-efficient free model for routine tasks";

    /// Model written to every leaf of the economy preset
    pub const DEFAULT_ECONOMY_MODEL: &str = "opencode/grok-code";
}

/// Host configuration document keys
pub mod keys {
    /// Leaf discriminator and the field every preset leaf carries
    pub const MODEL: &str = "model";

    /// Optional model variant shown next to the model in status output
    pub const VARIANT: &str = "variant";

    /// Agent tree inside opencode.json
    pub const AGENT: &str = "agent";
}

/// Text layout for tree rendering and document serialization
pub mod format {
    /// One nesting level in `status` trees
    pub const TREE_INDENT: &str = "  ";

    /// Spaces per indent level when writing host documents
    pub const TAB_SIZE: usize = 2;

    /// Line ending used for inserted text
    pub const EOL: &str = "\n";
}

/// Notification display durations
pub mod toast {
    use std::time::Duration;

    /// Restart reminder after a switch or drift correction
    pub const RESTART_DURATION: Duration = Duration::from_millis(5000);

    /// Startup banner naming the active mode
    pub const STARTUP_DURATION: Duration = Duration::from_millis(3000);
}

/// IPC framing limits
pub mod ipc {
    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;
}
