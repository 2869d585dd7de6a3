//! Hierarchy routes - classes, subjects, units, subUnits and lessons
//!
//! Every level exposes the same five operations; the level travels to the
//! handlers as a request extension.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::{ApiJson, ApiQuery};
use super::AppState;
use crate::error::CatalogResult;
use crate::models::{parse_oid, Level, NodeInfo};
use crate::services::{DeleteReport, HierarchyService};

/// Body of create/update, and the ancestor filters of list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRequest {
    pub name: Option<String>,
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub unit_id: Option<String>,
    pub sub_unit_id: Option<String>,
}

impl NodeRequest {
    fn ancestor(&self, level: Level) -> Option<&str> {
        match level {
            Level::Class => self.class_id.as_deref(),
            Level::Subject => self.subject_id.as_deref(),
            Level::Unit => self.unit_id.as_deref(),
            Level::SubUnit => self.sub_unit_id.as_deref(),
            Level::Lesson => None,
        }
    }

    /// Parent reference for a node living at `level`
    fn parent_for(&self, level: Level) -> Option<&str> {
        level.parent().and_then(|p| self.ancestor(p))
    }

    /// Ancestor filters that apply to `level`, ignoring empty values
    fn filters_for(&self, level: Level) -> CatalogResult<Vec<(Level, ObjectId)>> {
        level
            .ancestors()
            .iter()
            .filter_map(|a| {
                self.ancestor(*a)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (*a, v))
            })
            .map(|(a, v)| Ok((a, parse_oid(a.id_key(), v)?)))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted: DeleteReport,
}

pub fn hierarchy_routes() -> Router<Arc<AppState>> {
    Level::ALL
        .into_iter()
        .fold(Router::new(), |router, level| router.merge(level_routes(level)))
}

fn level_routes(level: Level) -> Router<Arc<AppState>> {
    let segment = level.route_segment();
    Router::new()
        .route(&format!("/{}", segment), get(list_nodes).post(create_node))
        .route(
            &format!("/{}/{{id}}", segment),
            get(get_node).put(update_node).delete(delete_node),
        )
        .layer(Extension(level))
}

async fn list_nodes(
    State(state): State<Arc<AppState>>,
    Extension(level): Extension<Level>,
    ApiQuery(q): ApiQuery<NodeRequest>,
) -> CatalogResult<Json<Vec<NodeInfo>>> {
    let filters = q.filters_for(level)?;
    let service = HierarchyService::new((*state.db).clone());
    let nodes = service.list(level, &filters).await?;
    Ok(Json(nodes.into_iter().map(NodeInfo::from).collect()))
}

async fn get_node(
    State(state): State<Arc<AppState>>,
    Extension(level): Extension<Level>,
    Path(id): Path<String>,
) -> CatalogResult<Json<NodeInfo>> {
    let service = HierarchyService::new((*state.db).clone());
    Ok(Json(service.get(level, &id).await?.into()))
}

async fn create_node(
    State(state): State<Arc<AppState>>,
    Extension(level): Extension<Level>,
    ApiJson(req): ApiJson<NodeRequest>,
) -> CatalogResult<(StatusCode, Json<NodeInfo>)> {
    let service = HierarchyService::new((*state.db).clone());
    let node = service
        .create(level, req.name.as_deref().unwrap_or_default(), req.parent_for(level))
        .await?;
    Ok((StatusCode::CREATED, Json(node.into())))
}

async fn update_node(
    State(state): State<Arc<AppState>>,
    Extension(level): Extension<Level>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<NodeRequest>,
) -> CatalogResult<Json<NodeInfo>> {
    let service = HierarchyService::new((*state.db).clone());
    let node = service
        .update(level, &id, req.name.as_deref(), req.parent_for(level))
        .await?;
    Ok(Json(node.into()))
}

async fn delete_node(
    State(state): State<Arc<AppState>>,
    Extension(level): Extension<Level>,
    Path(id): Path<String>,
    ApiQuery(q): ApiQuery<DeleteQuery>,
) -> CatalogResult<Json<DeleteResponse>> {
    let service = HierarchyService::new((*state.db).clone());
    let deleted = service.delete(level, &id, q.cascade).await?;
    Ok(Json(DeleteResponse {
        message: format!("{} deleted", level),
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_for_uses_level_parent_key() {
        let req: NodeRequest = serde_json::from_value(serde_json::json!({
            "name": "Algebra",
            "classId": "65a1f0c2e4b0a1b2c3d4e5f6",
            "subjectId": "65a1f0c2e4b0a1b2c3d4e5f7",
        }))
        .unwrap();
        assert_eq!(req.parent_for(Level::Unit), Some("65a1f0c2e4b0a1b2c3d4e5f7"));
        assert_eq!(req.parent_for(Level::Subject), Some("65a1f0c2e4b0a1b2c3d4e5f6"));
        assert_eq!(req.parent_for(Level::Class), None);
        assert_eq!(req.parent_for(Level::Lesson), None);
    }

    #[test]
    fn test_filters_only_apply_to_ancestors() {
        let req = NodeRequest {
            class_id: Some("65a1f0c2e4b0a1b2c3d4e5f6".into()),
            unit_id: Some(String::new()),
            ..Default::default()
        };
        let filters = req.filters_for(Level::Lesson).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].0, Level::Class);
        assert!(req.filters_for(Level::Class).unwrap().is_empty());

        let bad = NodeRequest {
            unit_id: Some("nope".into()),
            ..Default::default()
        };
        assert_eq!(bad.filters_for(Level::Lesson).unwrap_err().code(), "INVALID_ID");
    }
}
