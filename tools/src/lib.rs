//! # Tools
//!
//! The closed set of tools the dialogue agent may call.
//!
//! Tools are registered explicitly, in one place, into a [`ToolRegistry`].
//! The registry is the only way a generator's tool-call request turns into
//! an effect: it looks the tool up by name, validates the arguments against
//! the tool's [`ToolSpec`] and invokes it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Tools                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ToolCall ──► ToolRegistry::dispatch ──► Tool::invoke ──► text  │
//! │                     │                                           │
//! │                     ▼                                           │
//! │             ToolSpec::validate_inputs                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod calculator;
pub mod error;
pub mod registry;
pub mod spec;
pub mod tool;

pub use calculator::{CalcError, CalculatorTool, evaluate};
pub use error::{Result, ToolError};
pub use registry::ToolRegistry;
pub use spec::{DataType, InputConstraints, ToolInput, ToolSpec};
pub use tool::{Tool, ToolCall, ToolDescriptor};
