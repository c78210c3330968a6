//! Application setup and server configuration.

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::common::config::Config;
use crate::domains::publish::{Publisher, RestArticleSink};
use crate::domains::scan::WebsiteScanner;
use crate::domains::schedule::Orchestrator;
use crate::domains::store::gateway::BaseCentralStore;
use crate::domains::store::RestStore;
use crate::kernel::providers::{BaseAiFactory, ProviderAiFactory};
use crate::kernel::search::{BaseSearchService, GoogleSearchClient, NoopSearchService};
use crate::kernel::HttpFetcher;
use crate::server::routes::{
    discover_handler, health_handler, scan_handler, scan_preview_handler, trigger_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn BaseCentralStore>,
    pub scanner: Arc<WebsiteScanner>,
    pub search: Arc<dyn BaseSearchService>,
    pub ai_factory: Arc<dyn BaseAiFactory>,
    pub config: Arc<Config>,
}

/// Wire up every component from configuration.
pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    let fetcher = HttpFetcher::new()?;

    let store: Arc<dyn BaseCentralStore> = Arc::new(RestStore::new(
        config.central_db_url.clone(),
        config.central_db_service_key.clone(),
        fetcher.clone(),
    ));

    let scanner = Arc::new(WebsiteScanner::new(fetcher.clone()));

    let search: Arc<dyn BaseSearchService> = match (
        config.google_search_api_key.clone(),
        config.google_search_engine_id.clone(),
    ) {
        (Some(api_key), Some(engine_id)) => Arc::new(GoogleSearchClient::new(
            api_key,
            engine_id,
            fetcher.clone(),
        )),
        _ => Arc::new(NoopSearchService),
    };

    let publisher = Publisher::new(Arc::new(RestArticleSink::new(fetcher)));
    let ai_factory: Arc<dyn BaseAiFactory> = Arc::new(ProviderAiFactory);

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        scanner.clone(),
        search.clone(),
        publisher,
        ai_factory.clone(),
        config.encryption_key.clone(),
        config.openai_api_key.clone(),
        config.anthropic_api_key.clone(),
    ));

    Ok(AppState {
        orchestrator,
        store,
        scanner,
        search,
        ai_factory,
        config: Arc::new(config),
    })
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // Permissive CORS: the trigger surface is called from dashboards on
    // arbitrary origins; OPTIONS preflight is answered by the layer.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(health_handler))
        .route("/trigger", get(trigger_handler))
        .route("/generate", get(trigger_handler))
        .route("/discover-topics", get(discover_handler))
        .route("/discover", get(discover_handler))
        .route("/scan", get(scan_handler))
        .route("/scan-preview", get(scan_preview_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
