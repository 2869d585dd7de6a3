//! Content routes - grouped reads, CRUD, views, flashcards and bulk import

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::{ApiJson, ApiQuery};
use super::files::serve_file;
use super::AppState;
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{ContentGroup, ContentInfo, ContentType};
use crate::services::content_service::{BulkImport, ContentPatch, LessonFlashcards, NewContent};
use crate::services::ContentService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    pub lesson_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteContentResponse {
    pub message: String,
    pub id: String,
    pub file_removed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewResponse {
    pub id: String,
    pub view_count: i64,
}

pub fn content_routes(config: &CatalogConfig) -> Router<Arc<AppState>> {
    Router::new()
        .route("/content", get(list_content).post(create_content))
        .route("/content/bulk", post(bulk_import))
        .route(
            "/content/{id}",
            get(get_content).put(update_content).delete(delete_content),
        )
        .route("/content/{id}/view", post(record_view))
        .route("/content/{id}/file", get(get_content_file))
        .route("/flashcards/{lesson_id}", get(get_flashcards))
        .layer(DefaultBodyLimit::max(config.max_json_body_bytes))
}

fn service(state: &AppState) -> ContentService {
    ContentService::new((*state.db).clone(), (*state.config).clone())
}

async fn list_content(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<ContentQuery>,
) -> CatalogResult<Json<Vec<ContentGroup>>> {
    let lesson_id = q
        .lesson_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CatalogError::Validation("lessonId is required".to_string()))?;
    let kind = match q.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<ContentType>()?),
    };

    let groups = service(&state).list_grouped(&lesson_id, kind).await?;
    Ok(Json(groups))
}

async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<ContentInfo>> {
    Ok(Json(service(&state).get(&id).await?.into()))
}

async fn create_content(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<NewContent>,
) -> CatalogResult<(StatusCode, Json<ContentInfo>)> {
    let content = service(&state).create(req).await?;
    Ok((StatusCode::CREATED, Json(content.into())))
}

async fn update_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ContentPatch>,
) -> CatalogResult<Json<ContentInfo>> {
    Ok(Json(service(&state).update(&id, req).await?.into()))
}

async fn delete_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<DeleteContentResponse>> {
    let (_, file_removed) = service(&state).delete(&id).await?;
    Ok(Json(DeleteContentResponse {
        message: "Content deleted".to_string(),
        id,
        file_removed,
    }))
}

async fn record_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> CatalogResult<Json<ViewResponse>> {
    let view_count = service(&state).record_view(&id).await?;
    Ok(Json(ViewResponse { id, view_count }))
}

async fn get_content_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> CatalogResult<Response> {
    let content = service(&state).get(&id).await?;
    let path = content
        .file_path
        .ok_or_else(|| CatalogError::FileNotFound(format!("content {} has no file", id)))?;
    serve_file(std::path::Path::new(&path), &headers).await
}

async fn get_flashcards(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> CatalogResult<Json<LessonFlashcards>> {
    Ok(Json(service(&state).flashcards(&lesson_id).await?))
}

async fn bulk_import(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<BulkImport>,
) -> CatalogResult<(StatusCode, Json<ContentInfo>)> {
    let content = service(&state).bulk_import(req).await?;
    Ok((StatusCode::CREATED, Json(content.into())))
}
