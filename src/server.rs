use crate::config::AppConfig;
use crate::data::BoundaryStore;
use crate::datasets::{Catalog, SearchHit};
use crate::filter::{FilterPanel, OptionLists};
use crate::map::{MapService, Popup};
use crate::page::{self, Page};
use crate::params::ParamSync;
use crate::types::{Level, LngLat, MapFilter};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<Catalog>,
    pub store: BoundaryStore,
}

impl AppState {
    pub fn new(config: AppConfig, catalog: Arc<Catalog>) -> Self {
        let store = BoundaryStore::new(&config.assets.boundary_dir);
        AppState {
            config,
            catalog,
            store,
        }
    }

    /// Rebuilds URL state and filter panel for one request.
    fn resolve(&self, query: Option<&str>) -> (ParamSync, FilterPanel) {
        let sync = ParamSync::from_query(query.unwrap_or_default());
        let panel = FilterPanel::from_selection(self.catalog.clone(), &sync.selection());
        (sync, panel)
    }

    async fn map_for(&self, filter: &MapFilter) -> MapService {
        let mut service = MapService::new(self.config.map.clone(), self.catalog.clone());
        service.map();
        service.follow(filter, &self.store).await;
        service
    }
}

#[derive(Deserialize)]
pub struct FeatureParams {
    lng: f64,
    lat: f64,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
pub struct FilterResponse {
    filter: MapFilter,
    options: OptionLists,
}

pub fn build_app(state: Arc<AppState>) -> Router {
    let boundaries = ServeDir::new(&state.config.assets.boundary_dir);
    let static_files = ServeDir::new(&state.config.assets.static_dir);

    Router::new()
        .route("/", get(page_handler))
        .route("/select/{level}", get(select_handler))
        .route("/api/filter", get(filter_handler))
        .route("/api/map", get(map_handler))
        .route("/api/feature", get(feature_handler))
        .route("/api/search", get(search_handler))
        .route("/api/health", get(health))
        .nest_service("/boundaries", boundaries)
        .nest_service("/static", static_files)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, catalog: Arc<Catalog>) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, catalog));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting server on http://{}", addr);

    axum::serve(listener, build_app(state)).await?;
    Ok(())
}

async fn page_handler(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Html<String> {
    let (sync, panel) = state.resolve(query.as_deref());
    let search = sync.param("q").unwrap_or_default();
    let hits = state.catalog.search(search);
    Html(page::render(&Page {
        panel: &panel,
        search,
        hits: &hits,
    }))
}

/// Setter: pushes `value` for `level` into the URL and redirects there.
async fn select_handler(
    State(state): State<Arc<AppState>>,
    Path(level): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(level) = Level::from_param(&level) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let (mut sync, _) = state.resolve(query.as_deref());
    let value = sync.take("value").unwrap_or_default();

    match sync.set(level, &value) {
        Ok(next) if next.is_empty() => Redirect::to("/").into_response(),
        Ok(next) => Redirect::to(&format!("/?{}", next)).into_response(),
        Err(e) => {
            warn!("failed to build query for {}: {:#}", level, e);
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

async fn filter_handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Json<FilterResponse> {
    let (_, panel) = state.resolve(query.as_deref());
    Json(FilterResponse {
        filter: panel.snapshot(),
        options: panel.options().clone(),
    })
}

async fn map_handler(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let (_, panel) = state.resolve(query.as_deref());
    let service = state.map_for(&panel.snapshot()).await;
    Json(service.view()).into_response()
}

async fn feature_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeatureParams>,
    RawQuery(query): RawQuery,
) -> Json<Option<Popup>> {
    let (_, panel) = state.resolve(query.as_deref());
    let service = state.map_for(&panel.snapshot()).await;
    Json(service.click(LngLat::new(params.lng, params.lat)))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<SearchHit>> {
    Json(state.catalog.search(&params.q))
}

async fn health() -> &'static str {
    "ok"
}
