//! ToolSnapshot entity - a discovered tool owned by one server

use serde::{Deserialize, Serialize};

use super::{ServerId, ToolId};

/// A tool exposed by an MCP server
///
/// Owned exclusively by its server; deleting the server deletes its tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSnapshot {
    pub id: ToolId,
    pub server_id: ServerId,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub enabled: bool,
}

impl ToolSnapshot {
    pub fn new(id: ToolId, server_id: ServerId, name: impl Into<String>) -> Self {
        Self {
            id,
            server_id,
            name: name.into(),
            display_name: None,
            description: None,
            enabled: true,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Display name, falling back to the tool name
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Case-insensitive match against name, display name and description
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let contains = |s: &str| s.to_lowercase().contains(&query);
        contains(&self.name)
            || self.display_name.as_deref().is_some_and(contains)
            || self.description.as_deref().is_some_and(contains)
    }
}

/// Sort tools into the canonical order used for comparisons and display
pub fn sort_tools(tools: &mut [ToolSnapshot]) {
    tools.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}
