//! Collections routes - admin export, import and clear

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::{ApiJson, ApiQuery};
use super::AppState;
use crate::config::CatalogConfig;
use crate::error::CatalogResult;
use crate::services::collection_service::CollectionSummary;
use crate::services::CollectionService;

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub collection: String,
    pub inserted: u64,
    pub replaced: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub collection: String,
    pub deleted: u64,
}

pub fn collection_routes(config: &CatalogConfig) -> Router<Arc<AppState>> {
    Router::new()
        .route("/collections/list", get(list_collections))
        .route("/collections/export/{name}", get(export_collection))
        .route(
            "/collections/import/{name}",
            get(import_collection).post(import_collection),
        )
        .route(
            "/collections/clear/{name}",
            get(clear_collection).delete(clear_collection),
        )
        .layer(DefaultBodyLimit::max(config.max_json_body_bytes))
}

fn service(state: &AppState) -> CollectionService {
    CollectionService::new((*state.db).clone())
}

async fn list_collections(
    State(state): State<Arc<AppState>>,
) -> CatalogResult<Json<Vec<CollectionSummary>>> {
    Ok(Json(service(&state).list().await?))
}

async fn export_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> CatalogResult<Json<Vec<serde_json::Value>>> {
    Ok(Json(service(&state).export(&name).await?))
}

async fn import_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    ApiQuery(q): ApiQuery<ImportQuery>,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> CatalogResult<Json<ImportResponse>> {
    let replace = q.mode.as_deref() == Some("replace");
    let inserted = service(&state).import(&name, body, replace).await?;
    Ok(Json(ImportResponse {
        collection: name,
        inserted,
        replaced: replace,
    }))
}

async fn clear_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> CatalogResult<Json<ClearResponse>> {
    let deleted = service(&state).clear(&name).await?;
    Ok(Json(ClearResponse {
        collection: name,
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MongoDb;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use mongodb::{options::ClientOptions, Client};
    use tower::ServiceExt;

    async fn app() -> Router {
        // Never dialled: unknown collections are rejected before any query
        let options = ClientOptions::parse("mongodb://127.0.0.1:1").await.unwrap();
        let db = MongoDb::with_client(Client::with_options(options).unwrap(), "syllabus_test");
        let config = CatalogConfig::default();
        collection_routes(&config).with_state(Arc::new(AppState::new(db, config)))
    }

    async fn status_of(method: Method, uri: &str, body: &'static str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        app().await.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_import_and_clear_accept_get_and_verb_forms() {
        for (method, uri, body) in [
            (Method::GET, "/collections/import/sessions", "[]"),
            (Method::POST, "/collections/import/sessions", "[]"),
            (Method::GET, "/collections/clear/sessions", ""),
            (Method::DELETE, "/collections/clear/sessions", ""),
            (Method::GET, "/collections/export/nope", ""),
        ] {
            assert_eq!(status_of(method.clone(), uri, body).await, StatusCode::NOT_FOUND, "{} {}", method, uri);
        }
        assert_eq!(
            status_of(Method::PUT, "/collections/clear/sessions", "").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
