use nav_domain::capability::LlmCapabilities;
use nav_domain::chat::{ChatMessage, ToolCall, ToolDefinition};
use nav_domain::error::Result;
use nav_domain::stream::Usage;
use nav_domain::stream::{BoxStream, StreamEvent};
use serde::{Deserialize, Serialize};

/// A provider-agnostic chat completion request — the normalized shape of
/// spec.md §4.5's `process_prompt(system, user, history, image?, tools,
/// model, purpose, site_id)`. `messages` is the full history including the
/// trailing user turn; `system` is never folded into `messages` since not
/// every vendor accepts a system-role message turn (Anthropic takes it as a
/// separate top-level field).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
    pub model: Option<String>,
    /// Base64-encoded bytes with a MIME type, appended to the user turn.
    pub image: Option<ImageInput>,
    /// Accumulates token usage in the process-wide stats map, keyed by this
    /// (spec.md §4.5 "accumulated per purpose").
    pub purpose: String,
    pub site_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    pub mime_type: String,
    pub base64_data: String,
}

impl ChatRequest {
    pub fn image(&self) -> Option<(&str, &str)> {
        self.image
            .as_ref()
            .map(|i| (i.mime_type.as_str(), i.base64_data.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsRequest {
    pub input: Vec<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsResponse {
    pub embeddings: Vec<Vec<f32>>,
}

/// Trait that every LLM adapter (vendor A/B/C of spec.md §4.5) must implement.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;

    async fn chat_stream(
        &self,
        req: ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    async fn embeddings(&self, req: EmbeddingsRequest) -> Result<EmbeddingsResponse>;

    fn capabilities(&self) -> &LlmCapabilities;

    fn provider_id(&self) -> &str;
}
