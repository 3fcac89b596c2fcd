//! Configuration management for the mode switcher
//!
//! - **preset**: preset data model and the plugin state shape
//! - **persistent**: state file I/O, path resolution and first-run presets

pub mod persistent;
pub mod preset;

// Re-export commonly used types
pub use persistent::Paths;
pub use preset::{ModePreset, ModeSwitcherConfig, ModelConfig};
