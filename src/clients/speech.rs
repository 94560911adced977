//! # Speech Synthesis Client
//!
//! Optional text-to-speech capability. The relay only sees the
//! `SpeechSynthesizer` trait; `GoogleSpeechClient` implements it against the
//! Cloud Text-to-Speech REST endpoint `text:synthesize`.
//!
//! ## Availability:
//! `build_synthesizer` returns `Ok(None)` when speech is disabled, which the
//! relay reports per request as a `voice_error` instead of failing startup.
//!
//! ## Authentication:
//! - `speech.api_key` is sent as the `?key=` query parameter
//! - `speech.credentials_path` (usually `GOOGLE_APPLICATION_CREDENTIALS`) is a
//!   service-account JSON file; requests carry an OAuth bearer token minted
//!   from it by `gcp_auth`, which also caches and refreshes the token

use crate::config::SpeechConfig;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("Voice synthesis is not available")]
    Unavailable,

    #[error("Speech credentials could not be loaded: {0}")]
    Credentials(String),

    #[error("Speech synthesis request failed: {0}")]
    Transport(String),

    #[error("Speech service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected speech service response: {0}")]
    InvalidResponse(String),
}

/// Contract for a text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`, returning encoded audio bytes (MP3 by default).
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

/// OAuth scope for Cloud Text-to-Speech.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Source of short-lived bearer tokens.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, SpeechError>;
}

/// Tokens minted from a service-account key.
pub struct ServiceAccountTokens {
    account: CustomServiceAccount,
}

impl ServiceAccountTokens {
    pub fn from_file(path: &Path) -> Result<Self, SpeechError> {
        let account = CustomServiceAccount::from_file(path)
            .map_err(|err| SpeechError::Credentials(format!("{}: {err}", path.display())))?;
        Ok(Self { account })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, SpeechError> {
        let token = self
            .account
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|err| SpeechError::Credentials(err.to_string()))?;
        Ok(token.as_str().to_string())
    }
}

/// How requests to the speech service are authenticated.
#[derive(Clone)]
pub enum SpeechAuth {
    ApiKey(String),
    Bearer(Arc<dyn AccessTokenSource>),
}

impl SpeechAuth {
    fn kind(&self) -> &'static str {
        match self {
            SpeechAuth::ApiKey(_) => "api_key",
            SpeechAuth::Bearer(_) => "service_account",
        }
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, SpeechError> {
        match self {
            SpeechAuth::ApiKey(key) => Ok(request.query(&[("key", key.as_str())])),
            SpeechAuth::Bearer(tokens) => Ok(request.bearer_auth(tokens.access_token().await?)),
        }
    }
}

/// Build the configured synthesizer, if any.
///
/// - `enabled = false` → `Ok(None)`
/// - enabled with an inline key or a loadable service-account file → `Ok(Some(..))`
/// - enabled but no usable credentials → `Err`, the caller decides whether that is fatal
///
/// An inline key wins over a credentials file.
pub fn build_synthesizer(config: &SpeechConfig) -> Result<Option<Arc<dyn SpeechSynthesizer>>, SpeechError> {
    if !config.enabled {
        return Ok(None);
    }

    let auth = match (&config.api_key, &config.credentials_path) {
        (Some(key), _) if !key.trim().is_empty() => SpeechAuth::ApiKey(key.trim().to_string()),
        (_, Some(path)) => SpeechAuth::Bearer(Arc::new(ServiceAccountTokens::from_file(path)?)),
        _ => {
            return Err(SpeechError::Credentials(
                "speech is enabled but neither api_key nor credentials_path is set".to_string(),
            ))
        }
    };

    let client = GoogleSpeechClient::new(config, auth)?;
    info!(
        language = %config.language_code,
        encoding = %config.audio_encoding,
        auth = client.auth.kind(),
        "Speech synthesis enabled"
    );
    Ok(Some(Arc::new(client)))
}

/// Cloud Text-to-Speech over REST.
pub struct GoogleSpeechClient {
    client: Client,
    auth: SpeechAuth,
    base_url: String,
    language_code: String,
    voice_name: Option<String>,
    audio_encoding: String,
}

impl GoogleSpeechClient {
    pub fn new(config: &SpeechConfig, auth: SpeechAuth) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| SpeechError::Transport(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            auth,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            language_code: config.language_code.clone(),
            voice_name: config.voice_name.clone(),
            audio_encoding: config.audio_encoding.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language_code,
                name: self.voice_name.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: &self.audio_encoding,
            },
        };

        let request = self
            .client
            .post(format!("{}/text:synthesize", self.base_url))
            .json(&body);

        let response = self
            .auth
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|err| SpeechError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status, "Speech synthesis rejected");
            return Err(SpeechError::Api { status, message });
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|err| SpeechError::InvalidResponse(err.to_string()))?;

        let audio = parsed
            .audio_content
            .ok_or_else(|| SpeechError::InvalidResponse("missing audioContent".to_string()))?;

        BASE64_STANDARD
            .decode(audio)
            .map_err(|err| SpeechError::InvalidResponse(format!("audioContent is not base64: {err}")))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}
