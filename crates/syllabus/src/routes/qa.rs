//! Q&A routes - filtered listing and aggregate statistics

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::extract::ApiQuery;
use super::AppState;
use crate::error::CatalogResult;
use crate::services::qa_service::{QaPage, QaQuery, QaStats};
use crate::services::QaService;

pub fn qa_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/qa/{lesson_id}", get(list_qa))
        .route("/qa/{lesson_id}/stats", get(qa_stats))
}

async fn list_qa(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
    ApiQuery(q): ApiQuery<QaQuery>,
) -> CatalogResult<Json<QaPage>> {
    let service = QaService::new((*state.db).clone());
    let page = service
        .list(&lesson_id, &q, state.config.qa_page_limit)
        .await?;
    Ok(Json(page))
}

async fn qa_stats(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> CatalogResult<Json<QaStats>> {
    let service = QaService::new((*state.db).clone());
    Ok(Json(service.stats(&lesson_id).await?))
}
