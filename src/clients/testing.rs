//! Test doubles for the provider contracts.

use crate::clients::completion::{
    CompletionClient, CompletionError, CompletionRequest, ProviderModel, VisionRequest,
};
use crate::clients::speech::{SpeechError, SpeechSynthesizer};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted completion backend that records every call.
pub(crate) struct FakeCompletion {
    reply: Result<String, String>,
    models: Result<Vec<ProviderModel>, String>,
    slow_prompt: Option<(String, Duration)>,
    generate_calls: Mutex<Vec<CompletionRequest>>,
    vision_calls: Mutex<Vec<VisionRequest>>,
}

impl FakeCompletion {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            models: Ok(Vec::new()),
            slow_prompt: None,
            generate_calls: Mutex::new(Vec::new()),
            vision_calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            models: Err(message.to_string()),
            ..Self::replying("")
        }
    }

    pub(crate) fn with_models(mut self, models: Vec<ProviderModel>) -> Self {
        self.models = Ok(models);
        self
    }

    /// Requests whose prompt equals `prompt` sleep for `delay` before answering.
    pub(crate) fn with_slow_prompt(mut self, prompt: &str, delay: Duration) -> Self {
        self.slow_prompt = Some((prompt.to_string(), delay));
        self
    }

    pub(crate) fn generate_calls(&self) -> Vec<CompletionRequest> {
        self.generate_calls.lock().unwrap().clone()
    }

    pub(crate) fn vision_calls(&self) -> Vec<VisionRequest> {
        self.vision_calls.lock().unwrap().clone()
    }

    fn scripted_reply(&self) -> Result<String, CompletionError> {
        self.reply.clone().map_err(|message| CompletionError::Api {
            status: 500,
            message,
        })
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn generate(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.generate_calls.lock().unwrap().push(request.clone());
        if let Some((prompt, delay)) = &self.slow_prompt {
            if *prompt == request.prompt {
                tokio::time::sleep(*delay).await;
            }
        }
        self.scripted_reply()
    }

    async fn describe_image(&self, request: &VisionRequest) -> Result<String, CompletionError> {
        self.vision_calls.lock().unwrap().push(request.clone());
        self.scripted_reply()
    }

    async fn list_models(&self) -> Result<Vec<ProviderModel>, CompletionError> {
        self.models.clone().map_err(CompletionError::Transport)
    }
}

/// Scripted speech backend.
pub(crate) struct FakeSpeech {
    result: Result<Vec<u8>, String>,
}

impl FakeSpeech {
    pub(crate) fn producing(audio: &[u8]) -> Self {
        Self {
            result: Ok(audio.to_vec()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SpeechError> {
        self.result.clone().map_err(SpeechError::Transport)
    }
}

/// A provider model offering the given methods.
pub(crate) fn provider_model(name: &str, methods: &[&str]) -> ProviderModel {
    ProviderModel {
        name: name.to_string(),
        display_name: name.trim_start_matches("models/").to_string(),
        description: format!("{name} description"),
        input_token_limit: 32_000,
        output_token_limit: 8_192,
        supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
    }
}
