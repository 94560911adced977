//! # Relay Service
//!
//! The only component with decision logic: it turns inbound connection
//! events into provider calls and addresses the outcome back to the
//! connection that asked.
//!
//! ## Per-request Flow (`send_message`):
//! 1. Resolve the model (empty/absent → configured default)
//! 2. Fold system instructions into the prompt
//! 3. Await the completion client (only this request's task waits)
//! 4. Optionally synthesize speech; a failure there becomes `voice_error`
//! 5. Emit exactly one `receive_message` or `error` to the sender
//!
//! ## Error Capture:
//! Handlers never return errors to the transport. Every failure is turned
//! into an `error` event for the originating connection.

use crate::clients::{
    CompletionClient, CompletionError, CompletionRequest, ConversationTurn, GenerationParams,
    ImageInput, SpeechError, SpeechSynthesizer, TurnRole, VisionRequest,
};
use crate::config::GeminiConfig;
use crate::relay::events::{
    unix_time_secs, Ack, ConnectionStatus, MessageRequest, MessageResponse, ScreenShareRequest,
    ScreenSharingResponse, ScreenSharingStatus, ServerEvent, ServerReady,
};
use crate::relay::registry::{EventSender, SessionRegistry};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Instruction sent alongside every shared screenshot.
pub const SCREEN_ANALYSIS_INSTRUCTION: &str =
    "Analyze this screenshot and provide helpful insights or answer any questions visible in the content:";

/// Status emitted when screen sharing starts without an image.
pub const SCREEN_WAITING_STATUS: &str = "Screen sharing started, waiting for data";

const PROBE_PROMPT: &str = "Reply with a short greeting to confirm you are reachable.";

/// Generation defaults applied when a request leaves them out.
#[derive(Debug, Clone)]
struct RelayDefaults {
    model: String,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

/// Event handlers shared by every connection.
///
/// Cloning is cheap (a handful of `Arc`s), so each spawned request task gets
/// its own handle.
#[derive(Clone)]
pub struct RelayService {
    registry: SessionRegistry,
    completion: Arc<dyn CompletionClient>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    defaults: RelayDefaults,
}

impl RelayService {
    pub fn new(
        registry: SessionRegistry,
        completion: Arc<dyn CompletionClient>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        config: &GeminiConfig,
    ) -> Self {
        Self {
            registry,
            completion,
            speech,
            defaults: RelayDefaults {
                model: config.default_model.clone(),
                temperature: config.default_temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: config.max_output_tokens,
            },
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn speech_available(&self) -> bool {
        self.speech.is_some()
    }

    /// Register the connection and send both acknowledgments to it.
    pub fn on_connect(&self, connection_id: &str, sender: EventSender) {
        self.registry.register(connection_id, sender);
        info!(connection_id, active = self.registry.active_count(), "Client connected");

        self.registry.emit(
            connection_id,
            ServerEvent::ConnectionStatus(ConnectionStatus {
                status: "connected".to_string(),
                sid: connection_id.to_string(),
            }),
        );
        self.registry.emit(
            connection_id,
            ServerEvent::ServerReady(ServerReady {
                status: "ready".to_string(),
                time: unix_time_secs(),
            }),
        );
    }

    pub fn on_disconnect(&self, connection_id: &str) {
        if self.registry.remove(connection_id) {
            info!(connection_id, active = self.registry.active_count(), "Client disconnected");
        }
    }

    /// Reply to `ping_server` directly.
    pub fn on_ping(&self, connection_id: &str, ack: Option<u64>) {
        debug!(connection_id, "Received ping");
        self.registry.emit(
            connection_id,
            ServerEvent::Ack(Ack {
                id: ack,
                status: "pong".to_string(),
                timestamp: unix_time_secs(),
            }),
        );
    }

    /// Report a frame that could not be interpreted.
    pub fn reject(&self, connection_id: &str, reason: &str) {
        warn!(connection_id, reason, "Rejected client frame");
        self.registry.emit(connection_id, ServerEvent::error(reason));
    }

    pub async fn on_send_message(&self, connection_id: &str, request: MessageRequest) {
        let event = match self.handle_send_message(connection_id, request).await {
            Ok(response) => ServerEvent::ReceiveMessage(response),
            Err(err) => {
                error!(connection_id, error = %err, "Error in send_message");
                ServerEvent::error(err.to_string())
            }
        };
        self.registry.emit(connection_id, event);
    }

    async fn handle_send_message(
        &self,
        connection_id: &str,
        request: MessageRequest,
    ) -> Result<MessageResponse, CompletionError> {
        let model = self.resolve_model(request.model_name.as_deref());
        let text = request.text.unwrap_or_default();
        let prompt = build_prompt(&text, request.system_instructions.as_deref());
        let history = request
            .history
            .unwrap_or_default()
            .into_iter()
            .map(|entry| ConversationTurn {
                role: TurnRole::from_client_role(&entry.role),
                text: entry.content,
            })
            .collect();

        let completion = CompletionRequest {
            model,
            prompt,
            history,
            params: GenerationParams {
                temperature: request.temperature.unwrap_or(self.defaults.temperature),
                top_p: self.defaults.top_p,
                top_k: self.defaults.top_k,
                max_output_tokens: self.defaults.max_output_tokens,
            },
        };

        info!(connection_id, model = %completion.model, "Received message");
        let started = Instant::now();
        let response = self.completion.generate(&completion).await?;
        info!(
            connection_id,
            model = %completion.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Completion received"
        );

        let (audio, voice_error) = if request.enable_voice.unwrap_or(false) {
            match self.synthesize(&response).await {
                Ok(audio) => (Some(audio), None),
                Err(err) => {
                    warn!(connection_id, error = %err, "Voice synthesis failed");
                    (None, Some(err.to_string()))
                }
            }
        } else {
            (None, None)
        };

        Ok(MessageResponse {
            response,
            status: "success".to_string(),
            audio,
            voice_error,
        })
    }

    /// Base64 audio for `text`, or why there is none.
    async fn synthesize(&self, text: &str) -> Result<String, SpeechError> {
        let speech = self.speech.as_ref().ok_or(SpeechError::Unavailable)?;
        let audio = speech.synthesize(text).await?;
        Ok(BASE64_STANDARD.encode(audio))
    }

    pub async fn on_start_screen_share(&self, connection_id: &str, request: ScreenShareRequest) {
        let screen_data = request.screen_data.filter(|data| !data.trim().is_empty());

        let Some(screen_data) = screen_data else {
            self.registry.emit(
                connection_id,
                ServerEvent::ScreenSharingStatus(ScreenSharingStatus {
                    status: SCREEN_WAITING_STATUS.to_string(),
                }),
            );
            return;
        };

        let vision = VisionRequest {
            model: self.resolve_model(request.model.as_deref()),
            instruction: SCREEN_ANALYSIS_INSTRUCTION.to_string(),
            image: ImageInput::from_screen_data(&screen_data),
        };
        info!(connection_id, model = %vision.model, "Received screen data");

        let event = match self.completion.describe_image(&vision).await {
            Ok(response) => ServerEvent::ScreenSharingResponse(ScreenSharingResponse { response }),
            Err(err) => {
                error!(connection_id, error = %err, "Error in screen sharing");
                ServerEvent::error(err.to_string())
            }
        };
        self.registry.emit(connection_id, event);
    }

    /// One round trip with the default model, for smoke-testing the provider.
    pub async fn probe(&self) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            model: self.defaults.model.clone(),
            prompt: PROBE_PROMPT.to_string(),
            history: Vec::new(),
            params: GenerationParams {
                temperature: self.defaults.temperature,
                top_p: self.defaults.top_p,
                top_k: self.defaults.top_k,
                max_output_tokens: self.defaults.max_output_tokens,
            },
        };
        self.completion.generate(&request).await
    }

    /// Absent or blank model names fall back to the default.
    pub fn resolve_model(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.defaults.model.clone(),
        }
    }
}

/// System instructions, when present, go in front of the user's text.
pub fn build_prompt(text: &str, system_instructions: Option<&str>) -> String {
    match system_instructions.map(str::trim) {
        Some(instructions) if !instructions.is_empty() => format!("{}\n\n{}", instructions, text),
        _ => text.to_string(),
    }
}
