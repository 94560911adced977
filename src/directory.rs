//! # Model Directory
//!
//! Shapes the provider's model list for the frontend and resolves
//! model-switch requests. Nothing is cached: every call asks the provider.
//!
//! ## Matching Rule:
//! A switch request matches the FIRST provider name that contains the
//! requested string (case-sensitive substring). Asking for `"pro"` can
//! therefore land on any model with `pro` in its name; the configured
//! default is always accepted as-is.

use crate::clients::{CompletionClient, CompletionError, ProviderModel};
use crate::config::GeminiConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Generation method a model must support to be listed.
pub const CONTENT_GENERATION_METHOD: &str = "generateContent";

/// How many provider names a not-found error quotes.
const NOT_FOUND_SAMPLE: usize = 5;

/// Read-only metadata about a selectable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub input_token_limit: u32,
    pub output_token_limit: u32,
    pub supported_generation_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred: Option<bool>,
}

impl From<ProviderModel> for ModelDescriptor {
    fn from(model: ProviderModel) -> Self {
        Self {
            name: model.name,
            display_name: model.display_name,
            description: model.description,
            input_token_limit: model.input_token_limit,
            output_token_limit: model.output_token_limit,
            supported_generation_methods: model.supported_generation_methods,
            preferred: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Upstream(#[from] CompletionError),

    #[error("Model {requested} not found. Available models: {sample}...")]
    NotFound { requested: String, sample: String },
}

/// Lists and resolves models against the completion provider.
#[derive(Clone)]
pub struct ModelDirectory {
    client: Arc<dyn CompletionClient>,
    default_model: String,
    preferred_display_name: String,
    preferred_description: String,
}

impl ModelDirectory {
    pub fn new(client: Arc<dyn CompletionClient>, config: &GeminiConfig) -> Self {
        Self {
            client,
            default_model: config.default_model.clone(),
            preferred_display_name: config.preferred_display_name.clone(),
            preferred_description: config.preferred_description.clone(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// The entry pinned to the top of every listing, offered or not.
    pub fn preferred_descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            name: self.default_model.clone(),
            display_name: self.preferred_display_name.clone(),
            description: self.preferred_description.clone(),
            input_token_limit: 128_000,
            output_token_limit: 8_192,
            supported_generation_methods: vec![CONTENT_GENERATION_METHOD.to_string()],
            preferred: Some(true),
        }
    }

    /// Content-generation models, preferred descriptor first.
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>, DirectoryError> {
        let provider_models = self.client.list_models().await?;
        let total = provider_models.len();

        let mut descriptors = Vec::with_capacity(total + 1);
        descriptors.push(self.preferred_descriptor());
        descriptors.extend(
            provider_models
                .into_iter()
                .filter(|model| {
                    model
                        .supported_generation_methods
                        .iter()
                        .any(|method| method == CONTENT_GENERATION_METHOD)
                })
                .map(ModelDescriptor::from),
        );

        debug!(provider_total = total, listed = descriptors.len(), "Model directory built");
        Ok(descriptors)
    }

    /// Resolve a requested model name to a usable one.
    pub async fn switch_model(&self, requested: &str) -> Result<String, DirectoryError> {
        let names: Vec<String> = self
            .client
            .list_models()
            .await?
            .into_iter()
            .map(|model| model.name)
            .collect();

        if requested == self.default_model {
            info!(model = %requested, "Switched to default model");
            return Ok(self.default_model.clone());
        }

        match names.iter().find(|name| name.contains(requested)) {
            Some(matched) => {
                info!(requested = %requested, matched = %matched, "Switched model");
                Ok(matched.clone())
            }
            None => Err(DirectoryError::NotFound {
                requested: requested.to_string(),
                sample: names
                    .iter()
                    .take(NOT_FOUND_SAMPLE)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing::{provider_model, FakeCompletion};
    use crate::config::AppConfig;

    fn directory(client: FakeCompletion) -> ModelDirectory {
        ModelDirectory::new(Arc::new(client), &AppConfig::default().gemini)
    }

    #[tokio::test]
    async fn test_preferred_model_always_first() {
        let dir = directory(FakeCompletion::replying("").with_models(vec![
            provider_model("models/gemini-pro", &["generateContent", "countTokens"]),
            provider_model("models/embedding-001", &["embedContent"]),
            provider_model("models/gemini-flash", &["generateContent"]),
        ]));

        let models = dir.list_models().await.unwrap();

        assert_eq!(models.len(), 3);
        assert_eq!(models[0].name, "gemini-2.5-pro-exp-03-25");
        assert_eq!(models[0].preferred, Some(true));
        assert_eq!(models[1].name, "models/gemini-pro");
        assert_eq!(models[1].preferred, None);
        assert_eq!(models[2].name, "models/gemini-flash");
    }

    #[tokio::test]
    async fn test_preferred_model_with_empty_provider() {
        let dir = directory(FakeCompletion::replying(""));
        let models = dir.list_models().await.unwrap();

        assert_eq!(models.len(), 1);
        assert_eq!(models[0].preferred, Some(true));
    }

    #[tokio::test]
    async fn test_list_models_upstream_failure() {
        let dir = directory(FakeCompletion::failing("network down"));
        assert!(matches!(dir.list_models().await, Err(DirectoryError::Upstream(_))));
    }

    #[test]
    fn test_preferred_flag_omitted_when_unset() {
        let descriptor = ModelDescriptor::from(provider_model("models/x", &["generateContent"]));
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("preferred").is_none());
    }

    #[tokio::test]
    async fn test_switch_to_default_with_empty_provider() {
        let dir = directory(FakeCompletion::replying(""));
        let model = dir.switch_model("gemini-2.5-pro-exp-03-25").await.unwrap();
        assert_eq!(model, "gemini-2.5-pro-exp-03-25");
    }

    #[tokio::test]
    async fn test_switch_first_substring_match_wins() {
        let dir = directory(FakeCompletion::replying("").with_models(vec![
            provider_model("models/gemini-1.5-pro", &["generateContent"]),
            provider_model("models/gemini-1.5-pro-latest", &["generateContent"]),
        ]));

        assert_eq!(dir.switch_model("1.5-pro").await.unwrap(), "models/gemini-1.5-pro");
        assert!(dir.switch_model("1.5-PRO").await.is_err());
    }

    #[tokio::test]
    async fn test_switch_not_found_quotes_sample() {
        let names: Vec<_> = (0..7)
            .map(|i| provider_model(&format!("models/m{i}"), &["generateContent"]))
            .collect();
        let dir = directory(FakeCompletion::replying("").with_models(names));

        let err = dir.switch_model("claude").await.unwrap_err();
        let message = err.to_string();

        assert!(matches!(err, DirectoryError::NotFound { .. }));
        assert_eq!(
            message,
            "Model claude not found. Available models: models/m0, models/m1, models/m2, models/m3, models/m4..."
        );
    }

    #[tokio::test]
    async fn test_switch_upstream_failure() {
        let dir = directory(FakeCompletion::failing("auth"));
        assert!(matches!(dir.switch_model("anything").await, Err(DirectoryError::Upstream(_))));
    }
}
