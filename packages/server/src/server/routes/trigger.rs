use axum::extract::{Extension, Query};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerParams {
    pub website_id: Option<String>,
}

/// Run one website end-to-end, or every due website.
pub async fn trigger_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<TriggerParams>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();

    if let Some(website_id) = params.website_id {
        let website = state
            .store
            .get_website(&website_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Website not found: {}", website_id))?;

        let outcome = state.orchestrator.run_website(&website, now).await;
        let success = matches!(
            outcome,
            crate::domains::schedule::RunOutcome::Published { .. }
        );
        let mut body = serde_json::to_value(&outcome).map_err(anyhow::Error::from)?;
        if let Some(map) = body.as_object_mut() {
            map.insert("success".to_string(), json!(success));
            map.insert("website_id".to_string(), json!(website_id));
        }
        return Ok(Json(body));
    }

    let processed = state.orchestrator.tick(now).await?;
    Ok(Json(json!({
        "processed": processed,
        "message": format!("Processed {} website(s)", processed),
    })))
}
