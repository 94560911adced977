//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use gemini_relay::clients::{
    CompletionClient, CompletionError, CompletionRequest, ProviderModel, VisionRequest,
};
use gemini_relay::config::AppConfig;
use gemini_relay::state::AppState;
use std::sync::Mutex;
use std::time::Duration;

/// Completion backend that echoes prompts and records the models it was asked for.
pub struct EchoCompletion {
    models: Vec<ProviderModel>,
    /// Prompts containing this marker take `delay` to answer
    slow_marker: Option<(String, Duration)>,
    pub requested_models: Mutex<Vec<String>>,
}

impl EchoCompletion {
    pub fn new() -> Self {
        Self {
            models: vec![
                model("models/gemini-1.5-flash", &["generateContent"]),
                model("models/gemini-1.5-pro", &["generateContent", "countTokens"]),
                model("models/text-embedding-004", &["embedContent"]),
            ],
            slow_marker: None,
            requested_models: Mutex::new(Vec::new()),
        }
    }

    pub fn with_slow_marker(mut self, marker: &str, delay: Duration) -> Self {
        self.slow_marker = Some((marker.to_string(), delay));
        self
    }
}

#[async_trait]
impl CompletionClient for EchoCompletion {
    async fn generate(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.requested_models.lock().unwrap().push(request.model.clone());
        if let Some((marker, delay)) = &self.slow_marker {
            if request.prompt.contains(marker.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if request.prompt == "fail" {
            return Err(CompletionError::Api {
                status: 429,
                message: "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
            });
        }
        Ok(format!("echo: {}", request.prompt))
    }

    async fn describe_image(&self, request: &VisionRequest) -> Result<String, CompletionError> {
        Ok(format!("saw {} image", request.image.mime_type))
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, CompletionError> {
        Ok(self.models.clone())
    }
}

pub fn model(name: &str, methods: &[&str]) -> ProviderModel {
    ProviderModel {
        name: name.to_string(),
        display_name: name.trim_start_matches("models/").to_string(),
        description: String::new(),
        input_token_limit: 1_048_576,
        output_token_limit: 8_192,
        supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.gemini.api_key = "test-key".to_string();
    config.features.test_endpoint = true;
    config
}

pub fn test_state(completion: EchoCompletion) -> AppState {
    AppState::new(test_config(), std::sync::Arc::new(completion), None)
}
