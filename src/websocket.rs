//! # WebSocket Relay Endpoint
//!
//! Clients connect to `/ws` (also mounted at `/socket.io/`) and exchange JSON
//! event envelopes with the relay.
//!
//! ## Connection Lifecycle:
//! 1. **Upgrade**: `relay_websocket` starts a `RelaySocket` actor
//! 2. **Started**: the actor gets a fresh connection ID and an event channel,
//!    registers with the relay and receives `connection_status` + `server_ready`
//! 3. **Frames**: text frames are parsed into `ClientEvent`s and dispatched
//! 4. **Stopped**: the connection is removed from the registry
//!
//! ## Concurrency:
//! Provider calls run on spawned tasks. The actor keeps reading frames while
//! they are in flight and relays their results from its event channel, so a
//! slow completion never blocks this or any other connection.

use crate::relay::events::ClientFrame;
use crate::relay::{ClientEvent, ConnectionId, RelayService, ServerEvent};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

/// One WebSocket connection.
pub struct RelaySocket {
    id: ConnectionId,
    relay: RelayService,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    /// Last time the client showed signs of life
    last_heartbeat: Instant,
}

impl RelaySocket {
    pub fn new(relay: RelayService, heartbeat_interval: Duration, client_timeout: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            relay,
            heartbeat_interval,
            client_timeout,
            last_heartbeat: Instant::now(),
        }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                warn!(connection_id = %act.id, "Heartbeat timeout, closing connection");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn dispatch(&self, event: ClientEvent) {
        match event {
            ClientEvent::PingServer { ack } => self.relay.on_ping(&self.id, ack),
            ClientEvent::SendMessage(request) => {
                let relay = self.relay.clone();
                let id = self.id.clone();
                tokio::spawn(async move {
                    relay.on_send_message(&id, request).await;
                });
            }
            ClientEvent::StartScreenSharing(request) => {
                let relay = self.relay.clone();
                let id = self.id.clone();
                tokio::spawn(async move {
                    relay.on_start_screen_share(&id, request).await;
                });
            }
        }
    }
}

/// Parse a text frame into an event, with a client-facing error on failure.
pub fn parse_frame(text: &str) -> Result<ClientEvent, String> {
    serde_json::from_str::<ClientFrame>(text)
        .map_err(|err| format!("Invalid frame: {}", err))?
        .into_event()
}

impl Actor for RelaySocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();
        ctx.add_stream(UnboundedReceiverStream::new(rx));
        self.relay.on_connect(&self.id, tx);
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.relay.on_disconnect(&self.id);
    }
}

/// Frames from the client.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                match parse_frame(&text) {
                    Ok(event) => self.dispatch(event),
                    Err(reason) => self.relay.reject(&self.id, &reason),
                }
            }
            Ok(ws::Message::Binary(_)) => {
                self.relay.reject(&self.id, "Binary frames are not supported");
            }
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(connection_id = %self.id, ?reason, "Client closed connection");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(connection_id = %self.id, "Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(connection_id = %self.id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// Events addressed to this connection by the relay.
impl StreamHandler<ServerEvent> for RelaySocket {
    fn handle(&mut self, event: ServerEvent, ctx: &mut Self::Context) {
        match serde_json::to_string(&event) {
            Ok(json) => ctx.text(json),
            Err(err) => error!(connection_id = %self.id, event = event.name(), error = %err, "Failed to encode event"),
        }
    }

    // the channel only closes once the registry forgot us
    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

/// Upgrade an HTTP request to a relay connection.
pub async fn relay_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(peer = ?req.connection_info().peer_addr(), "New WebSocket connection request");

    let server = &app_state.config.server;
    let socket = RelaySocket::new(
        app_state.relay.clone(),
        Duration::from_secs(server.heartbeat_interval_secs),
        Duration::from_secs(server.client_timeout_secs),
    );

    ws::start(socket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::events::MessageRequest;

    #[test]
    fn test_parse_valid_frame() {
        let event = parse_frame(r#"{"event":"send_message","data":{"message":"hi"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage(MessageRequest {
                text: Some("hi".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_frame("hello").unwrap_err();
        assert!(err.starts_with("Invalid frame:"));
    }

    #[test]
    fn test_parse_rejects_unknown_event() {
        assert_eq!(parse_frame(r#"{"event":"reboot"}"#).unwrap_err(), "Unknown event: reboot");
    }

    #[test]
    fn test_new_sockets_get_distinct_ids() {
        let state = crate::state::AppState::new(
            crate::config::AppConfig::default(),
            std::sync::Arc::new(crate::clients::testing::FakeCompletion::replying("")),
            None,
        );
        let a = RelaySocket::new(state.relay.clone(), Duration::from_secs(1), Duration::from_secs(2));
        let b = RelaySocket::new(state.relay, Duration::from_secs(1), Duration::from_secs(2));
        assert_ne!(a.id, b.id);
    }
}
