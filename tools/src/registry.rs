//! Explicit tool registry.
//!
//! The registry is built once at startup and is the dispatch table for
//! every tool call the agent makes. Nothing outside the registry can be
//! invoked.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{Result, ToolError};
use crate::tool::{Tool, ToolCall, ToolDescriptor};

/// Dispatch table from tool name to implementation.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    /// Tools keyed by name; ordered so descriptors are stable.
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }

        debug!("Registered tool: {name}");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Builder-style [`ToolRegistry::register`].
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every registered tool, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    /// Look up, validate and invoke the tool a call names.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<String> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        tool.spec()
            .validate_inputs(&call.arguments)
            .map_err(|reason| ToolError::InvalidArguments {
                tool: call.name.clone(),
                reason,
            })?;

        let start = Instant::now();
        let result = tool.invoke(&call.arguments).await;
        let duration_ms = start.elapsed().as_millis();

        match &result {
            Ok(_) => info!("Tool {} executed in {duration_ms}ms", call.name),
            Err(e) => warn!("Tool {} failed: {e}", call.name),
        }
        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
