use axum::extract::{Extension, Query};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::kernel::providers::{choose_provider, AiPurpose, BaseAi, RotationMode};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanParams {
    pub website_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanPreviewParams {
    pub domain: String,
}

/// Scan one website now, or refresh every auto-scan website that is stale.
pub async fn scan_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<ScanParams>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let ai = analysis_ai(&state);

    if let Some(website_id) = params.website_id {
        let website = state
            .store
            .get_website(&website_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Website not found: {}", website_id))?;

        let scan = state
            .scanner
            .run_scan(&website, state.store.as_ref(), ai.as_deref(), now)
            .await?;
        return Ok(Json(json!({
            "success": true,
            "website_id": website_id,
            "pages_scanned": scan.pages_scanned,
            "keywords": scan.main_keywords.len(),
            "themes": scan.content_themes,
        })));
    }

    let websites = state.store.list_active_websites().await?;
    let mut scanned = 0usize;
    for website in websites.iter().filter(|w| w.auto_scan_enabled) {
        match state
            .scanner
            .ensure_scan(website, state.store.as_ref(), ai.as_deref(), now)
            .await
        {
            Ok(Some(_)) => scanned += 1,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(website = %website.id, error = %format!("{:#}", e), "Scan failed");
            }
        }
    }
    Ok(Json(json!({
        "processed": scanned,
        "message": format!("Scanned {} website(s)", scanned),
    })))
}

/// Stateless preview of what a scan would see; nothing is persisted.
pub async fn scan_preview_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<ScanPreviewParams>,
) -> Result<Json<Value>, ApiError> {
    let ai = analysis_ai(&state);
    let profile = state.scanner.preview(&params.domain, ai.as_deref()).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile,
    })))
}

fn analysis_ai(state: &AppState) -> Option<Box<dyn BaseAi>> {
    let provider = choose_provider(
        RotationMode::Rotate,
        None,
        state.config.openai_api_key.as_deref(),
        state.config.anthropic_api_key.as_deref(),
    )?;
    let key = match provider {
        crate::kernel::providers::Provider::Openai => state.config.openai_api_key.clone(),
        crate::kernel::providers::Provider::Anthropic => state.config.anthropic_api_key.clone(),
    }?;
    Some(state.ai_factory.create(provider, &key, AiPurpose::Analysis))
}
