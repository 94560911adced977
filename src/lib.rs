//! # Gemini Relay
//!
//! A real-time relay between browser clients and Google's Gemini models.
//! Clients hold a WebSocket open, send chat messages or screenshots, and get
//! the model's answer back on the same connection, optionally with
//! synthesized speech attached.
//!
//! ## Module Map:
//! - **config**: layered configuration (defaults, `config.toml`, environment)
//! - **error**: HTTP error type and response bodies
//! - **clients**: upstream provider contracts and their REST implementations
//! - **directory**: model listing and switching
//! - **relay**: wire events, session registry, event handlers
//! - **websocket**: one actix actor per connection
//! - **state**: shared application state and request metrics
//! - **health / handlers / middleware**: the HTTP surface

pub mod clients;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod relay;
pub mod state;
pub mod websocket;

use actix_cors::Cors;
use actix_web::web;
use config::CorsConfig;

/// Register every route on an app.
///
/// `/api/test-gemini` is only mounted when `test_endpoint` is set.
pub fn configure_routes(cfg: &mut web::ServiceConfig, test_endpoint: bool) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/health", web::get().to(health::health_check))
        .route("/ws", web::get().to(websocket::relay_websocket))
        .route("/socket.io/", web::get().to(websocket::relay_websocket))
        .service(
            web::scope("/api")
                .route("/models", web::get().to(handlers::list_models))
                .route("/switch_model", web::post().to(handlers::switch_model))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .configure(|api| {
                    if test_endpoint {
                        api.route("/test-gemini", web::get().to(handlers::test_gemini));
                    }
                }),
        );
}

/// CORS policy for the configured origin list.
pub fn build_cors(config: &CorsConfig) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if config.allows_any_origin() {
        cors.allow_any_origin()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing::FakeCompletion;
    use crate::config::AppConfig;
    use crate::state::AppState;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState::new(
            AppConfig::default(),
            Arc::new(FakeCompletion::replying("pong")),
            None,
        ))
    }

    #[actix_web::test]
    async fn test_probe_route_hidden_by_default() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .configure(|cfg| configure_routes(cfg, false)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/test-gemini").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_probe_route_when_enabled() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .configure(|cfg| configure_routes(cfg, true)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/test-gemini").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_cors_restricts_origins() {
        let config = CorsConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        };
        let app = test::init_service(
            App::new()
                .app_data(state())
                .wrap(build_cors(&config))
                .configure(|cfg| configure_routes(cfg, false)),
        )
        .await;

        let allowed = test::TestRequest::get()
            .uri("/health")
            .insert_header(("Origin", "http://localhost:3000"))
            .to_request();
        let resp = test::call_service(&app, allowed).await;
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );

        let denied = test::TestRequest::get()
            .uri("/health")
            .insert_header(("Origin", "http://evil.example"))
            .to_request();
        let resp = test::call_service(&app, denied).await;
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }
}
