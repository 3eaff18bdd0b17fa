//! Tool categories and their trust-update weights.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of a tool, used for rule matching and trust weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    FileRead,
    FileWrite,
    Execute,
    Network,
    Agent,
    System,
}

impl ToolCategory {
    /// Closed lookup from the dispatcher's tool name.
    pub fn from_tool_name(name: &str) -> Self {
        match name {
            "Read" | "Glob" | "Grep" => ToolCategory::FileRead,
            "Write" | "Edit" | "MultiEdit" | "NotebookEdit" => ToolCategory::FileWrite,
            "Bash" => ToolCategory::Execute,
            "WebFetch" | "WebSearch" => ToolCategory::Network,
            "Task" => ToolCategory::Agent,
            _ => ToolCategory::System,
        }
    }

    /// Weight attached to trust updates for this category.
    pub fn trust_weight(self) -> f64 {
        match self {
            ToolCategory::Execute => 0.15,
            ToolCategory::FileWrite => 0.12,
            ToolCategory::Network => 0.10,
            ToolCategory::Agent => 0.10,
            ToolCategory::FileRead => 0.05,
            ToolCategory::System => 0.08,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolCategory::FileRead => "file_read",
            ToolCategory::FileWrite => "file_write",
            ToolCategory::Execute => "execute",
            ToolCategory::Network => "network",
            ToolCategory::Agent => "agent",
            ToolCategory::System => "system",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
