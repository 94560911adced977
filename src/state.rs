//! # Application State
//!
//! Everything request handlers and WebSocket actors share, handed to actix as
//! `web::Data<AppState>`.
//!
//! ## What lives here:
//! - **config**: loaded once at startup and never mutated afterwards
//! - **relay**: the event handlers plus the session registry
//! - **directory**: model listing and switching
//! - **metrics**: HTTP counters updated by `MetricsMiddleware`
//!
//! ## Sharing Pattern:
//! Immutable data sits behind a plain `Arc`. Only the metrics are mutable, so
//! only they get an `RwLock`. Lock guards are dropped before returning and
//! poisoned locks are recovered rather than propagated as panics.

use crate::clients::{build_synthesizer, CompletionClient, CompletionError, GeminiClient, SpeechSynthesizer};
use crate::config::AppConfig;
use crate::directory::ModelDirectory;
use crate::relay::{RelayService, SessionRegistry};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub relay: RelayService,
    pub directory: ModelDirectory,
    pub metrics: Arc<RwLock<AppMetrics>>,
    /// Never changes, so no lock
    pub start_time: Instant,
}

/// HTTP counters since startup.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    /// Keyed by `"METHOD /path"`
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Wire the state around already-built clients.
    ///
    /// `speech` is `None` when voice synthesis is disabled or could not be set up.
    pub fn new(
        config: AppConfig,
        completion: Arc<dyn CompletionClient>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        let registry = SessionRegistry::new();
        let relay = RelayService::new(registry, completion.clone(), speech, &config.gemini);
        let directory = ModelDirectory::new(completion, &config.gemini);

        Self {
            config: Arc::new(config),
            relay,
            directory,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Build the production clients from configuration.
    ///
    /// A speech setup failure is not fatal: the server starts with voice disabled.
    pub fn from_config(config: AppConfig) -> Result<Self, CompletionError> {
        let completion: Arc<dyn CompletionClient> = Arc::new(GeminiClient::new(&config.gemini)?);

        let speech = match build_synthesizer(&config.speech) {
            Ok(Some(speech)) => Some(speech),
            Ok(None) => {
                info!("Voice synthesis disabled");
                None
            }
            Err(err) => {
                warn!(error = %err, "Voice synthesis unavailable, continuing without it");
                None
            }
        };

        Ok(Self::new(config, completion, speech))
    }

    pub fn gemini_configured(&self) -> bool {
        self.config.gemini_configured()
    }

    pub fn voice_enabled(&self) -> bool {
        self.relay.speech_available()
    }

    pub fn active_connections(&self) -> usize {
        self.relay.registry().active_count()
    }

    /// Age of the longest-lived connection, `None` when nobody is connected.
    pub fn oldest_connection_age_seconds(&self) -> Option<i64> {
        self.relay
            .registry()
            .oldest_connected_at()
            .map(|since| (chrono::Utc::now() - since).num_seconds().max(0))
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        metrics.error_count += 1;
    }

    /// Record one finished request against its endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Consistent copy of the counters, taken under one read lock.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed, 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing::{FakeCompletion, FakeSpeech};

    fn state() -> AppState {
        AppState::new(AppConfig::default(), Arc::new(FakeCompletion::replying("ok")), None)
    }

    #[test]
    fn test_endpoint_metrics() {
        let state = state();
        state.record_endpoint_request("GET /health", 10, false);
        state.record_endpoint_request("GET /health", 30, true);
        state.increment_request_count();
        state.increment_error_count();

        let snapshot = state.get_metrics_snapshot();
        let health = &snapshot.endpoint_metrics["GET /health"];

        assert_eq!(snapshot.request_count, 1);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(health.request_count, 2);
        assert_eq!(health.average_duration_ms(), 20.0);
        assert_eq!(health.error_rate(), 0.5);
    }

    #[test]
    fn test_empty_endpoint_metric() {
        let metric = EndpointMetric::default();
        assert_eq!(metric.average_duration_ms(), 0.0);
        assert_eq!(metric.error_rate(), 0.0);
    }

    #[test]
    fn test_capability_flags() {
        let without_voice = state();
        assert!(!without_voice.voice_enabled());
        assert!(!without_voice.gemini_configured());
        assert_eq!(without_voice.active_connections(), 0);

        let mut config = AppConfig::default();
        config.gemini.api_key = "key".to_string();
        let with_voice = AppState::new(
            config,
            Arc::new(FakeCompletion::replying("ok")),
            Some(Arc::new(FakeSpeech::producing(b"a"))),
        );
        assert!(with_voice.voice_enabled());
        assert!(with_voice.gemini_configured());
    }

    #[test]
    fn test_from_config_without_key_still_starts() {
        // missing key is reported per request, not at startup
        let state = AppState::from_config(AppConfig::default()).unwrap();
        assert!(!state.voice_enabled());
    }
}
