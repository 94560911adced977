//! Provider smoke test, mounted at `GET /api/test-gemini` only when
//! `features.test_endpoint` is on.
//!
//! Useful for checking credentials and connectivity without opening a
//! WebSocket.

use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::time::Instant;

/// Send one fixed prompt to the default model.
///
/// GET /api/test-gemini
pub async fn test_gemini(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let start_time = Instant::now();
    let response = state.relay.probe().await?;

    tracing::info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Provider smoke test succeeded"
    );

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "response": response
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing::FakeCompletion;
    use crate::config::AppConfig;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_probe_success() {
        let state = web::Data::new(AppState::new(
            AppConfig::default(),
            Arc::new(FakeCompletion::replying("Hi there")),
            None,
        ));
        let app = test::init_service(
            App::new()
                .app_data(state)
                .route("/api/test-gemini", web::get().to(test_gemini)),
        )
        .await;

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/test-gemini").to_request())
                .await;
        assert_eq!(body, json!({"status": "success", "response": "Hi there"}));
    }

    #[actix_web::test]
    async fn test_probe_failure_is_500() {
        let state = web::Data::new(AppState::new(
            AppConfig::default(),
            Arc::new(FakeCompletion::failing("API key not valid")),
            None,
        ));
        let app = test::init_service(
            App::new()
                .app_data(state)
                .route("/api/test-gemini", web::get().to(test_gemini)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/test-gemini").to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("API key not valid"));
    }
}
