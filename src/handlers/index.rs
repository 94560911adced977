use crate::state::AppState;
use actix_web::{web, HttpResponse};

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>{service}</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }
        h1 { color: #4285f4; }
        code { background: #f4f4f4; padding: 2px 5px; }
    </style>
</head>
<body>
    <h1>{service}</h1>
    <p>The relay is running. Connect a WebSocket client to <code>/ws</code> to chat.</p>
    <h2>Endpoints</h2>
    <ul>
        <li><a href="/health"><code>GET /health</code></a> - service health</li>
        <li><a href="/api/models"><code>GET /api/models</code></a> - available models</li>
        <li><code>POST /api/switch_model</code> - resolve a model name</li>
    </ul>
</body>
</html>"#;

/// Static informational page.
pub async fn index(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_TEMPLATE.replace("{service}", &state.config.service_name))
}
