//! IPC message types for the tool loop

use serde::{Deserialize, Serialize};

/// Requests sent by the host to the tool loop
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    /// Apply a preset and make it current
    Switch { mode: String },

    /// Describe the active mode
    Status,

    /// List every preset
    List,

    /// Health check
    Ping,

    /// Stop serving
    Shutdown,
}

/// Responses sent back to the host
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ToolResponse {
    /// Result text of `Switch`, `Status` or `List`
    Text(String),

    /// Health check response
    Pong,

    /// Request could not be decoded
    Error(String),
}
