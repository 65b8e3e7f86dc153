//! Name-keyed tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use messages::ToolDefinition;

use crate::tools::Tool;
use crate::{Error, Result};

/// The tools available to a run, keyed by name.
///
/// Built once when the runner is constructed and read-only afterwards, so
/// concurrent lookups from dispatch need no locking.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry, rejecting duplicate names.
    pub fn new(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self> {
        let mut registry = Self::default();
        for tool in tools {
            let name = tool.name().to_string();
            if registry.by_name.contains_key(&name) {
                return Err(Error::Config(format!("duplicate tool name: {name}")));
            }
            registry.by_name.insert(name, registry.tools.len());
            registry.tools.push(tool);
        }
        Ok(registry)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    /// Definitions of every tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Tool names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
