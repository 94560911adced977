//! # Wire Events
//!
//! JSON shapes exchanged over the WebSocket.
//!
//! ## Client → Server:
//! ```json
//! {"event": "send_message", "data": {"message": "hi", "model": "", "temperature": 0.7}, "id": 3}
//! ```
//! `id` is only meaningful for events that are acknowledged directly (`ping_server`).
//!
//! ## Server → Client:
//! ```json
//! {"event": "receive_message", "data": {"response": "Hello!", "status": "success"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw inbound frame, before the payload is interpreted.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub id: Option<u64>,
}

/// Inbound events the relay understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    PingServer { ack: Option<u64> },
    SendMessage(MessageRequest),
    StartScreenSharing(ScreenShareRequest),
}

impl ClientFrame {
    /// Interpret the payload according to the event name.
    pub fn into_event(self) -> Result<ClientEvent, String> {
        // `data` may be omitted entirely; treat that as an empty object
        let data = if self.data.is_null() {
            Value::Object(Default::default())
        } else {
            self.data
        };

        match self.event.as_str() {
            "ping_server" => Ok(ClientEvent::PingServer { ack: self.id }),
            "send_message" => serde_json::from_value(data)
                .map(ClientEvent::SendMessage)
                .map_err(|err| format!("Invalid send_message payload: {}", err)),
            "start_screen_sharing" => serde_json::from_value(data)
                .map(ClientEvent::StartScreenSharing)
                .map_err(|err| format!("Invalid start_screen_sharing payload: {}", err)),
            other => Err(format!("Unknown event: {}", other)),
        }
    }
}

/// One prior conversation turn as the frontend sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(alias = "text")]
    pub content: String,
}

/// A `send_message` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    /// Prompt text; absent or null is the empty prompt
    #[serde(default, rename = "message")]
    pub text: Option<String>,
    /// Target model; absent or empty falls back to the default
    #[serde(default, rename = "model")]
    pub model_name: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default, rename = "systemInstructions", alias = "system_instructions")]
    pub system_instructions: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub enable_voice: Option<bool>,
}

/// A `start_screen_sharing` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenShareRequest {
    #[serde(default)]
    pub screen_data: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: String,
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerReady {
    pub status: String,
    /// Unix seconds with sub-second precision
    pub time: f64,
}

/// Direct reply to an acknowledged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub id: Option<u64>,
    pub status: String,
    pub timestamp: f64,
}

/// Successful reply to `send_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
    pub status: String,
    /// Base64 encoded audio of `response`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenSharingResponse {
    pub response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenSharingStatus {
    pub status: String,
}

/// Every event the server can emit to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionStatus(ConnectionStatus),
    ServerReady(ServerReady),
    Ack(Ack),
    ReceiveMessage(MessageResponse),
    Error(ErrorPayload),
    ScreenSharingResponse(ScreenSharingResponse),
    ScreenSharingStatus(ScreenSharingStatus),
}

impl ServerEvent {
    /// Wire name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionStatus(_) => "connection_status",
            ServerEvent::ServerReady(_) => "server_ready",
            ServerEvent::Ack(_) => "ack",
            ServerEvent::ReceiveMessage(_) => "receive_message",
            ServerEvent::Error(_) => "error",
            ServerEvent::ScreenSharingResponse(_) => "screen_sharing_response",
            ServerEvent::ScreenSharingStatus(_) => "screen_sharing_status",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            error: message.into(),
            status: "error".to_string(),
        })
    }
}

/// Current time as fractional Unix seconds.
pub fn unix_time_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
