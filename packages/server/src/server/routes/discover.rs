use axum::extract::{Extension, Query};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::domains::store::types::Website;
use crate::domains::topics::{self, DEFAULT_DISCOVERY_COUNT};
use crate::kernel::providers::{choose_provider, AiPurpose, BaseAi, RotationMode};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct DiscoverParams {
    pub website_id: Option<String>,
    pub count: Option<usize>,
}

/// Discover topics for one website, or every active website.
pub async fn discover_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<DiscoverParams>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let count = params.count.unwrap_or(DEFAULT_DISCOVERY_COUNT).clamp(1, 20);
    let ai = platform_ai(&state);

    if let Some(website_id) = params.website_id {
        let website = state
            .store
            .get_website(&website_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Website not found: {}", website_id))?;

        let discovered = discover_for(&state, &website, ai.as_deref(), count, now).await?;
        return Ok(Json(json!({
            "success": true,
            "website_id": website_id,
            "discovered": discovered.len(),
            "topics": discovered,
        })));
    }

    let websites = state.store.list_active_websites().await?;
    let mut total = 0usize;
    for website in &websites {
        match discover_for(&state, website, ai.as_deref(), count, now).await {
            Ok(topics) => total += topics.len(),
            Err(e) => {
                tracing::error!(website = %website.id, error = %format!("{:#}", e.0), "Discovery failed");
            }
        }
    }
    Ok(Json(json!({
        "processed": websites.len(),
        "discovered": total,
        "message": format!("Discovered {} topic(s) across {} website(s)", total, websites.len()),
    })))
}

async fn discover_for(
    state: &AppState,
    website: &Website,
    ai: Option<&dyn BaseAi>,
    count: usize,
    now: chrono::DateTime<Utc>,
) -> Result<Vec<String>, ApiError> {
    let topics = topics::discover_topics(
        state.store.as_ref(),
        &state.scanner,
        state.search.as_ref(),
        website,
        ai,
        count,
        now,
    )
    .await?;
    Ok(topics.into_iter().map(|t| t.title).collect())
}

/// Platform-key AI for the discovery surface (per-website keys are only
/// decrypted inside generation runs).
fn platform_ai(state: &AppState) -> Option<Box<dyn BaseAi>> {
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
    Some(state.ai_factory.create(provider, &key, AiPurpose::Topics))
}
