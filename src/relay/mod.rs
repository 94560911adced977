//! # Relay
//!
//! Everything between a WebSocket frame and a provider call:
//! - **events**: inbound/outbound JSON shapes
//! - **registry**: live connections and per-connection delivery
//! - **service**: the event handlers

pub mod events;
pub mod registry;
pub mod service;

pub use events::{ClientEvent, ClientFrame, ServerEvent};
pub use registry::{ConnectionId, EventSender, SessionRegistry};
pub use service::RelayService;
