//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix, `__` between nested keys)
//! - Well-known provider variables (GEMINI_API_KEY, GOOGLE_APPLICATION_CREDENTIALS)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Option<T>**: Optional settings (speech credentials) that may simply be absent
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Special environment variables (GEMINI_API_KEY, GOOGLE_APPLICATION_CREDENTIALS, HOST, PORT)
//! 2. Environment variables (APP_SERVER__PORT, APP_GEMINI__DEFAULT_MODEL, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each external collaborator (Gemini, Text-to-Speech) and each outer surface
/// (server, CORS) gets its own group, so the relay can be constructed from
/// exactly the pieces it needs and tests can override a single group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Human-readable service name reported by `/health` and the index page
    pub service_name: String,
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub speech: SpeechConfig,
    pub cors: CorsConfig,
    pub features: FeatureFlags,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to
/// - `port`: TCP port number to listen on
/// - `heartbeat_interval_secs`: how often the server pings idle WebSocket clients
/// - `client_timeout_secs`: silence after which a WebSocket client is dropped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

/// Settings for the generative-AI completion provider.
///
/// ## Generation parameters:
/// `top_p`, `top_k` and `max_output_tokens` are fixed per deployment; only the
/// temperature is chosen per request by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; empty means "not configured" (calls will fail visibly)
    pub api_key: String,
    pub base_url: String,
    /// Model used when a request names none; also the preferred directory entry
    pub default_model: String,
    pub preferred_display_name: String,
    pub preferred_description: String,
    pub default_temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
}

/// Settings for the optional text-to-speech capability.
///
/// The capability is only offered when `enabled` is set AND credentials load:
/// either an inline `api_key` or a service-account JSON file at `credentials_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub base_url: String,
    pub language_code: String,
    pub voice_name: Option<String>,
    /// Cloud TTS audio encoding name (MP3, LINEAR16, OGG_OPUS)
    pub audio_encoding: String,
    pub request_timeout_secs: u64,
}

/// Cross-origin settings applied to both HTTP routes and the WebSocket upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; a single `"*"` entry allows any origin
    pub allowed_origins: Vec<String>,
}

/// Optional surfaces that used to differ between deployments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Expose `GET /api/test-gemini`
    pub test_endpoint: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "Gemini Relay Backend".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                heartbeat_interval_secs: 25,
                client_timeout_secs: 60,
            },
            gemini: GeminiConfig {
                api_key: String::new(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                default_model: "gemini-2.5-pro-exp-03-25".to_string(),
                preferred_display_name: "Gemini 2.5 Pro (Experimental)".to_string(),
                preferred_description: "Google's most powerful and capable generative AI model".to_string(),
                default_temperature: 0.7,
                top_p: 0.95,
                top_k: 64,
                max_output_tokens: 4096,
                request_timeout_secs: 120,
            },
            speech: SpeechConfig {
                enabled: false,
                api_key: None,
                credentials_path: None,
                base_url: "https://texttospeech.googleapis.com/v1".to_string(),
                language_code: "en-US".to_string(),
                voice_name: None,
                audio_encoding: "MP3".to_string(),
                request_timeout_secs: 30,
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
            },
            features: FeatureFlags::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_GEMINI__DEFAULT_MODEL=gemini-1.5-flash`: Override the default model
    /// - `APP_CORS__ALLOWED_ORIGINS=http://localhost:8080,http://127.0.0.1:8080`
    /// - `GEMINI_API_KEY=...`: Provider key, the usual deployment convention
    /// - `GOOGLE_APPLICATION_CREDENTIALS=/path/sa.json`: Speech service-account key file
    /// - `HOST` / `PORT`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            );

        if let Ok(key) = env::var("GEMINI_API_KEY") {
            settings = settings.set_override("gemini.api_key", key)?;
        }

        if let Ok(path) = env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            settings = settings.set_override("speech.credentials_path", path)?;
        }

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - A default model is named (every request without a model relies on it)
    /// - The default temperature is inside the provider's accepted range
    /// - Timeouts are positive and the heartbeat fires before the client timeout
    ///
    /// A missing API key is deliberately NOT an error: the server still starts
    /// and reports `gemini_configured: false` from `/health`.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.gemini.default_model.trim().is_empty() {
            return Err(anyhow::anyhow!("A default model name is required"));
        }

        if !(0.0..=2.0).contains(&self.gemini.default_temperature) {
            return Err(anyhow::anyhow!(
                "Default temperature must be between 0.0 and 2.0, got {}",
                self.gemini.default_temperature
            ));
        }

        if self.gemini.request_timeout_secs == 0 || self.speech.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Upstream request timeouts must be greater than 0"));
        }

        if self.server.heartbeat_interval_secs == 0
            || self.server.heartbeat_interval_secs >= self.server.client_timeout_secs
        {
            return Err(anyhow::anyhow!(
                "Heartbeat interval must be positive and shorter than the client timeout"
            ));
        }

        Ok(())
    }

    /// Whether a completion provider key is present.
    pub fn gemini_configured(&self) -> bool {
        !self.gemini.api_key.trim().is_empty()
    }
}

impl CorsConfig {
    /// Whether any origin is allowed (empty list or the `"*"` wildcard).
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}
