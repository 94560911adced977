//! # Completion Client Contract
//!
//! The relay never talks to a provider SDK directly. It holds an
//! `Arc<dyn CompletionClient>` built at startup, which keeps the provider
//! swappable and lets tests inject a double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters sent with every completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

/// Who authored a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    /// Map a client-supplied role name. Anything that isn't the assistant is the user.
    pub fn from_client_role(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "model" | "assistant" | "ai" | "bot" => TurnRole::Model,
            _ => TurnRole::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
}

/// One text completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    /// Final user prompt (system instructions already folded in)
    pub prompt: String,
    /// Earlier turns, oldest first
    pub history: Vec<ConversationTurn>,
    pub params: GenerationParams,
}

/// An inline image for the vision path.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    pub mime_type: String,
    /// Base64 payload without any `data:` prefix
    pub data: String,
}

impl ImageInput {
    /// Parse what a browser hands us from a canvas capture.
    ///
    /// Accepts `data:image/jpeg;base64,<payload>` URLs and bare base64 (assumed PNG).
    pub fn from_screen_data(screen_data: &str) -> Self {
        let trimmed = screen_data.trim();
        if let Some(rest) = trimmed.strip_prefix("data:") {
            if let Some((meta, payload)) = rest.split_once(',') {
                let mime_type = meta
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .unwrap_or("image/png")
                    .to_string();
                return Self {
                    mime_type,
                    data: payload.to_string(),
                };
            }
        }

        Self {
            mime_type: "image/png".to_string(),
            data: trimmed.to_string(),
        }
    }
}

/// Instruction plus image, answered as text.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub model: String,
    pub instruction: String,
    pub image: ImageInput,
}

/// A model as the provider describes it, before directory shaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderModel {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub input_token_limit: u32,
    pub output_token_limit: u32,
    pub supported_generation_methods: Vec<String>,
}

/// Everything that can go wrong talking to the completion provider.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion provider is not configured (missing API key)")]
    NotConfigured,

    #[error("Completion request failed: {0}")]
    Transport(String),

    #[error("Completion provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected completion provider response: {0}")]
    InvalidResponse(String),

    #[error("Completion provider returned no text")]
    EmptyResponse,
}

/// Contract for a generative text/vision backend.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate text for a prompt (plus optional history).
    async fn generate(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    /// Answer an instruction about an image.
    async fn describe_image(&self, request: &VisionRequest) -> Result<String, CompletionError>;

    /// Every model the provider exposes, unfiltered.
    async fn list_models(&self) -> Result<Vec<ProviderModel>, CompletionError>;
}
