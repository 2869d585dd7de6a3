//! Stats route

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use super::AppState;
use crate::error::CatalogResult;
use crate::services::stats_service::CatalogStats;
use crate::services::StatsService;

pub fn stats_routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_stats))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> CatalogResult<Json<CatalogStats>> {
    let service = StatsService::new((*state.db).clone());
    Ok(Json(service.overview().await?))
}
