//! Core tool types.
//!
//! A [`Tool`] is a named capability the agent can request. The generator only
//! ever sees a tool's [`ToolDescriptor`]; it asks for an invocation by
//! returning a [`ToolCall`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::spec::ToolSpec;

/// A request from the generator to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier chosen by the generator; echoed back on the tool's reply.
    pub id: String,

    /// Name of the tool to invoke.
    pub name: String,

    /// Arguments as a JSON object.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// What the generator is told about a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema for the tool's arguments.
    pub parameters: serde_json::Value,
}

/// A tool the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name used for dispatch. Must be unique within a registry.
    fn name(&self) -> &str;

    /// Description shown to the generator.
    fn description(&self) -> &str;

    /// Input specification.
    fn spec(&self) -> ToolSpec;

    /// Run the tool. Arguments have already been validated against
    /// [`Tool::spec`].
    async fn invoke(&self, arguments: &serde_json::Value) -> Result<String>;

    /// Describe the tool for the generator.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.spec().generate_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_tool_call_deserializes_without_arguments() {
        let call: ToolCall =
            serde_json::from_str(r#"{"id": "call_1", "name": "calculator"}"#).unwrap();
        assert_eq!(call.name, "calculator");
        assert_eq!(call.arguments, serde_json::Value::Null);
    }

    #[test]
    fn test_tool_call_serialization() {
        let call = ToolCall::new("call_1", "calculator", json!({"expression": "2+2"}));
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(
            value,
            json!({"id": "call_1", "name": "calculator", "arguments": {"expression": "2+2"}})
        );
    }
}
