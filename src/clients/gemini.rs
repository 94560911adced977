//! # Gemini REST Client
//!
//! Talks to the Generative Language API (`v1beta`) directly over HTTPS:
//! - `POST models/{model}:generateContent` for text and vision completions
//! - `GET models` (paginated) for the model directory
//!
//! The API key travels as the `key` query parameter. Every call is bounded
//! by the configured request timeout; a timeout is reported like any other
//! upstream failure and never retried.

use crate::clients::completion::{
    CompletionClient, CompletionError, CompletionRequest, ConversationTurn, GenerationParams,
    ProviderModel, TurnRole, VisionRequest,
};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on pages fetched while listing models.
const MAX_MODEL_PAGES: usize = 20;

/// Completion client backed by the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Build a client from configuration. An empty key is accepted here;
    /// calls then fail with `CompletionError::NotConfigured`.
    pub fn new(config: &GeminiConfig) -> Result<Self, CompletionError> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CompletionError::Transport(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.trim().to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn ensure_configured(&self) -> Result<(), CompletionError> {
        if self.api_key.is_empty() {
            return Err(CompletionError::NotConfigured);
        }
        Ok(())
    }

    /// Model names from the directory come back as `models/<id>`; clients may send either form.
    fn model_url(&self, model: &str) -> String {
        let id = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{}:generateContent", self.base_url, id)
    }

    fn transport_error(&self, err: reqwest::Error) -> CompletionError {
        if err.is_timeout() {
            CompletionError::Transport(format!(
                "Gemini API request timed out after {}s",
                self.timeout.as_secs()
            ))
        } else {
            CompletionError::Transport(format!("Gemini API request failed: {err}"))
        }
    }

    async fn send_generate(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, CompletionError> {
        self.ensure_configured()?;

        let response = self
            .client
            .post(self.model_url(model))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| CompletionError::InvalidResponse(format!("Failed to parse Gemini response: {err}")))?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn generate(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut contents: Vec<Content> = request.history.iter().map(Content::from_turn).collect();
        contents.push(Content {
            role: "user".to_string(),
            parts: vec![Part::Text {
                text: request.prompt.clone(),
            }],
        });

        let body = GenerateContentRequest {
            contents,
            generation_config: Some(GenerationConfig::from(&request.params)),
        };

        debug!(model = %request.model, turns = body.contents.len(), "Sending Gemini generateContent");
        self.send_generate(&request.model, &body).await
    }

    async fn describe_image(&self, request: &VisionRequest) -> Result<String, CompletionError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text {
                        text: request.instruction.clone(),
                    },
                    Part::InlineData {
                        inline_data: InlineDataPayload {
                            mime_type: request.image.mime_type.clone(),
                            data: request.image.data.clone(),
                        },
                    },
                ],
            }],
            generation_config: None,
        };

        debug!(model = %request.model, mime = %request.image.mime_type, "Sending Gemini vision request");
        self.send_generate(&request.model, &body).await
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, CompletionError> {
        self.ensure_configured()?;

        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_MODEL_PAGES {
            let mut query = vec![("key", self.api_key.clone()), ("pageSize", "1000".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|err| self.transport_error(err))?;

            if !response.status().is_success() {
                let status = response.status();
                let body_text = response.text().await.unwrap_or_default();
                return Err(map_http_error(status, &body_text));
            }

            let page: ListModelsResponse = response
                .json()
                .await
                .map_err(|err| CompletionError::InvalidResponse(format!("Failed to parse model list: {err}")))?;

            models.extend(page.models.into_iter().map(ProviderModel::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(models),
            }
        }

        warn!("Model listing stopped after {} pages", MAX_MODEL_PAGES);
        Ok(models)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl From<&GenerationParams> for GenerationConfig {
    fn from(params: &GenerationParams) -> Self {
        Self {
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            max_output_tokens: params.max_output_tokens,
        }
    }
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

impl Content {
    fn from_turn(turn: &ConversationTurn) -> Self {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Model => "model",
        };
        Self {
            role: role.to_string(),
            parts: vec![Part::Text {
                text: turn.text.clone(),
            }],
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelResource>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResource {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    input_token_limit: u32,
    #[serde(default)]
    output_token_limit: u32,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl From<ModelResource> for ProviderModel {
    fn from(model: ModelResource) -> Self {
        Self {
            name: model.name,
            display_name: model.display_name,
            description: model.description,
            input_token_limit: model.input_token_limit,
            output_token_limit: model.output_token_limit,
            supported_generation_methods: model.supported_generation_methods,
        }
    }
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Join the text parts of the first candidate, the way the SDKs' `.text` accessor does.
fn extract_text_response(response: GenerateContentResponse) -> Result<String, CompletionError> {
    let text = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .filter(|text| !text.is_empty());

    match text {
        Some(text) => Ok(text),
        None => match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(CompletionError::InvalidResponse(format!("Prompt blocked: {reason}"))),
            None => Err(CompletionError::EmptyResponse),
        },
    }
}

fn map_http_error(status: StatusCode, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.to_string());

    CompletionError::Api {
        status: status.as_u16(),
        message,
    }
}
