//! Tools that need the dialogue layer's services.

use std::sync::Arc;

use async_trait::async_trait;
use casebook_retrieval::Retriever;
use casebook_retrieval::config::DEFAULT_CONTEXT_SEPARATOR;
use casebook_tools::{
    CalculatorTool, DataType, InputConstraints, Tool, ToolError, ToolInput, ToolRegistry, ToolSpec,
};
use tracing::debug;

use crate::generator::{Generator, RagPrompt};

/// The agent's tool set: case retrieval and the calculator.
pub fn default_registry(case_retrieval: CaseRetrievalTool) -> casebook_tools::Result<ToolRegistry> {
    ToolRegistry::new()
        .with_tool(Arc::new(case_retrieval))?
        .with_tool(Arc::new(CalculatorTool))
}

/// Upper bound on the `top_k` argument the generator may pass.
const MAX_REQUESTED_CASES: usize = 20;

/// Answers a question about the case corpus: retrieves the closest cases
/// and asks the generator for an answer grounded in them.
pub struct CaseRetrievalTool {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    top_k: usize,
    context_separator: String,
}

impl CaseRetrievalTool {
    /// Create the tool over shared services.
    pub fn new(retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> Self {
        let top_k = retriever.default_k();
        Self {
            retriever,
            generator,
            top_k,
            context_separator: DEFAULT_CONTEXT_SEPARATOR.to_string(),
        }
    }

    /// Set the number of cases retrieved per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the separator placed between retrieved cases.
    pub fn with_context_separator(mut self, separator: impl Into<String>) -> Self {
        self.context_separator = separator.into();
        self
    }
}

#[async_trait]
impl Tool for CaseRetrievalTool {
    fn name(&self) -> &str {
        "case_retrieval"
    }

    fn description(&self) -> &str {
        "Answer questions about documented patient cases, treatments, diagnoses \
         and psychological topics. The input must be a complete question about \
         a condition or a case."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new()
            .with_input(
                ToolInput::required("query", DataType::String, "Question about the cases")
                    .with_constraints(InputConstraints::length(1, 2000)),
            )
            .with_input(
                ToolInput::optional("top_k", DataType::Integer, "Number of cases to consult")
                    .with_constraints(InputConstraints::range(1.0, MAX_REQUESTED_CASES as f64)),
            )
    }

    async fn invoke(&self, arguments: &serde_json::Value) -> casebook_tools::Result<String> {
        let query = arguments
            .get("query")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                reason: "query must be a string".to_string(),
            })?;

        let top_k = arguments
            .get("top_k")
            .and_then(serde_json::Value::as_u64)
            .and_then(|k| usize::try_from(k).ok())
            .map_or(self.top_k, |k| k.clamp(1, MAX_REQUESTED_CASES));

        let cases = self
            .retriever
            .search(query, top_k)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        debug!("Case retrieval found {} cases", cases.len());

        let prompt = RagPrompt {
            history: String::new(),
            context: cases.join(&self.context_separator),
            question: query.to_string(),
        };
        self.generator
            .answer(&prompt)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
