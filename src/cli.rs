// CLI module - command-line argument parsing
//
// Every subcommand runs after the startup sequence (state load, drift
// reconciliation, startup notification):
// - switch <MODE>: apply a preset to the host configs
// - status: show the active preset
// - list: show every preset
// - init: startup sequence only
// - serve: length-prefixed JSON tool loop on stdin/stdout

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Switch opencode and oh-my-opencode agents between model presets
#[derive(Parser, Debug)]
#[command(name = "agent-mode-switcher")]
#[command(version)]
#[command(about = "Switch opencode agent models between presets", long_about = None)]
pub struct Cli {
    /// Host configuration directory [default: $OPENCODE_CONFIG_DIR or ~/.config/opencode]
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Apply a preset to opencode.json and oh-my-opencode.json
    Switch {
        /// Preset name, e.g. "performance" or "economy"
        mode: String,
    },

    /// Show the active mode and its model trees
    Status,

    /// List available modes
    List,

    /// Create or reconcile the plugin state, then print the active mode
    Init,

    /// Answer length-prefixed JSON requests on stdin until shutdown
    Serve,
}
