use axum::{extract::Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
    timestamp: String,
    providers: ProviderHealth,
}

/// Which credentials are configured (shape only, no outbound calls).
#[derive(Serialize)]
pub struct ProviderHealth {
    openai_configured: bool,
    anthropic_configured: bool,
    google_search_configured: bool,
}

/// Static heartbeat.
pub async fn health_handler(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "geopress".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        providers: ProviderHealth {
            openai_configured: state.config.openai_api_key.is_some(),
            anthropic_configured: state.config.anthropic_api_key.is_some(),
            google_search_configured: state.config.has_google_search(),
        },
    })
}
