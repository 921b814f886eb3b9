//! OpenAI-compatible chat completions generator.
//!
//! Works against any `/chat/completions` endpoint that follows the OpenAI
//! wire format, including Gemini's OpenAI-compatible endpoint, which is the
//! default.

use async_trait::async_trait;
use casebook_tools::{ToolCall, ToolDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{DialogueError, Result};
use crate::generator::{AgentReply, Generator, RagPrompt};
use crate::message::{Message, Role};

/// Default endpoint: Gemini's OpenAI-compatible API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default grounded-answer template.
pub const DEFAULT_RAG_TEMPLATE: &str = "\
Eres un asistente experto en analizar historiales clínicos. Usa el contexto \
y el historial de la conversación para responder la pregunta de forma clara \
y concisa. Si la información no se encuentra en el contexto, dilo.

Historial de la conversación:
{history}

Contexto relevante:
{context}

Pregunta actual: {question}

Respuesta:
";

/// Generator backed by a chat completions endpoint.
pub struct ChatCompletionsGenerator {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model name.
    model: String,

    /// Sampling temperature; provider default when unset.
    temperature: Option<f32>,

    /// Template used by [`Generator::answer`].
    rag_template: String,
}

impl ChatCompletionsGenerator {
    /// Create a generator with the default endpoint and model.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            rag_template: DEFAULT_RAG_TEMPLATE.to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the grounded-answer template.
    pub fn with_rag_template(mut self, template: impl Into<String>) -> Self {
        self.rag_template = template.into();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Check if an API key is set.
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request(&self, messages: Vec<Value>, tools: &[ToolDescriptor]) -> Result<WireMessage> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(DialogueError::GeneratorNotConfigured)?;

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            body["tools"] = tools.iter().map(tool_to_wire).collect();
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DialogueError::Generator(format!("{status}: {error_text}")));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| DialogueError::Generator("no choices in response".to_string()))
    }
}

impl Default for ChatCompletionsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn answer(&self, prompt: &RagPrompt) -> Result<String> {
        debug!("Requesting grounded answer from model: {}", self.model);

        let content = prompt.render(&self.rag_template);
        let reply = self
            .request(vec![json!({"role": "user", "content": content})], &[])
            .await?;

        match reply.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(DialogueError::Generator("empty response".to_string())),
        }
    }

    async fn chat(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<AgentReply> {
        debug!(
            "Requesting agent step over {} messages with {} tools",
            messages.len(),
            tools.len()
        );

        let reply = self
            .request(messages.iter().map(message_to_wire).collect(), tools)
            .await?;

        let tool_calls: Vec<ToolCall> = reply
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(WireToolCall::into_tool_call)
            .collect();
        let content = reply.content.unwrap_or_default();

        if content.is_empty() && tool_calls.is_empty() {
            return Err(DialogueError::Generator("empty response".to_string()));
        }

        Ok(AgentReply {
            content,
            tool_calls,
        })
    }
}

fn tool_to_wire(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn message_to_wire(message: &Message) -> Value {
    match message.role {
        Role::User => json!({"role": "user", "content": message.content}),
        Role::Assistant if message.has_tool_calls() => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
            json!({"role": "assistant", "content": message.content, "tool_calls": calls})
        }
        Role::Assistant => json!({"role": "assistant", "content": message.content}),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
    }
}

/// `/chat/completions` response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl WireToolCall {
    /// Arguments arrive as a JSON-encoded string. Text that is not valid
    /// JSON is passed through as a string value and rejected at dispatch.
    fn into_tool_call(self) -> ToolCall {
        let raw = self.function.arguments;
        let arguments = if raw.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Tool call {} has malformed arguments: {e}", self.id);
                Value::String(raw)
            })
        };
        ToolCall::new(self.id, self.function.name, arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> ChatCompletionsGenerator {
        ChatCompletionsGenerator::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
            .with_model("tiny")
    }

    fn completion(message: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": message, "finish_reason": "stop"}]
        }))
    }

    #[tokio::test]
    async fn test_requires_key() {
        let generator = ChatCompletionsGenerator::new();
        assert!(!generator.is_available());
        assert!(matches!(
            generator.answer(&RagPrompt::default()).await,
            Err(DialogueError::GeneratorNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_answer_sends_rendered_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "tiny",
                "messages": [{"role": "user", "content": "C=Nombre: B|Q=insomnio"}]
            })))
            .respond_with(completion(json!({"role": "assistant", "content": "Caso B"})))
            .mount(&server)
            .await;

        let generator = generator(&server).with_rag_template("C={context}|Q={question}");
        let prompt = RagPrompt {
            history: String::new(),
            context: "Nombre: B".to_string(),
            question: "insomnio".to_string(),
        };

        assert_eq!(generator.answer(&prompt).await.unwrap(), "Caso B");
    }

    #[tokio::test]
    async fn test_chat_parses_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "tools": [{"type": "function", "function": {"name": "calculator"}}]
            })))
            .respond_with(completion(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "calculator", "arguments": "{\"expression\":\"2*3\"}"}
                }]
            })))
            .mount(&server)
            .await;

        let tools = vec![ToolDescriptor {
            name: "calculator".to_string(),
            description: "math".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let reply = generator(&server)
            .chat(&[Message::user("¿cuánto es 2*3?")], &tools)
            .await
            .unwrap();

        assert_eq!(reply.content, "");
        assert_eq!(
            reply.tool_calls,
            vec![ToolCall::new("call_1", "calculator", json!({"expression": "2*3"}))]
        );
    }

    #[tokio::test]
    async fn test_chat_keeps_malformed_arguments_as_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(completion(json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "calculator", "arguments": "2*3"}
                }]
            })))
            .mount(&server)
            .await;

        let reply = generator(&server).chat(&[Message::user("x")], &[]).await.unwrap();
        assert_eq!(reply.tool_calls[0].arguments, json!("2*3"));
    }

    #[tokio::test]
    async fn test_error_status_is_generator_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = generator(&server).answer(&RagPrompt::default()).await;
        assert!(matches!(result, Err(DialogueError::Generator(msg)) if msg.contains("overloaded")));
    }

    #[test]
    fn test_tool_message_wire_format() {
        let wire = message_to_wire(&Message::tool_result("call_1", "6"));
        assert_eq!(
            wire,
            json!({"role": "tool", "tool_call_id": "call_1", "content": "6"})
        );
    }
}
