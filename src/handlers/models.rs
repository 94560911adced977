//! # Model REST API Handlers
//!
//! ## Available Endpoints:
//! - `GET /api/models` - Content-generation models, preferred model first
//! - `POST /api/switch_model` - Resolve a requested model name
//!
//! Switching is stateless: the resolved name is returned to the caller, who
//! sends it back with each later `send_message`.

use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Request body for `POST /api/switch_model`.
#[derive(Debug, Default, Deserialize)]
pub struct SwitchModelRequest {
    /// Absent or blank selects the default model
    #[serde(default)]
    pub model: Option<String>,
}

/// List selectable models.
///
/// ## Endpoint: `GET /api/models`
///
/// ## Response:
/// ```json
/// {
///   "status": "success",
///   "models": [
///     {"name": "gemini-2.5-pro-exp-03-25", "display_name": "...", "preferred": true, ...},
///     {"name": "models/gemini-1.5-flash", "display_name": "Gemini 1.5 Flash", ...}
///   ]
/// }
/// ```
pub async fn list_models(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let models = state.directory.list_models().await?;
    debug!(count = models.len(), "Listing models");

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "models": models
    })))
}

/// Resolve a model switch.
///
/// ## Endpoint: `POST /api/switch_model`
/// Body: `{"model": "1.5-flash"}`
///
/// ## Responses:
/// - `200 {"status": "success", "model": "models/gemini-1.5-flash"}`
/// - `400 {"status": "error", "error": "Model x not found. Available models: ..."}`
/// - `500` when the provider cannot be reached
pub async fn switch_model(
    state: web::Data<AppState>,
    body: Option<web::Json<SwitchModelRequest>>,
) -> AppResult<HttpResponse> {
    let requested = body
        .and_then(|json| json.into_inner().model)
        .map(|model| model.trim().to_string())
        .filter(|model| !model.is_empty())
        .unwrap_or_else(|| state.directory.default_model().to_string());

    let model = state.directory.switch_model(&requested).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "model": model
    })))
}
