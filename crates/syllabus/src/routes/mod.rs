//! HTTP routes for the catalogue

pub mod collections;
pub mod content;
pub mod extract;
pub mod files;
pub mod hierarchy;
pub mod qa;
pub mod stats;
pub mod upload;
pub mod users;

use axum::Router;
use std::sync::Arc;

use crate::config::CatalogConfig;
use crate::db::MongoDb;

pub use extract::ApiJson;

/// App state shared by all catalogue routes
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<MongoDb>,
    pub config: Arc<CatalogConfig>,
}

impl AppState {
    pub fn new(db: MongoDb, config: CatalogConfig) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
        }
    }
}

/// Configure all catalogue routes (mounted under `/api` by the server)
pub fn configure(state: Arc<AppState>) -> Router {
    let config = state.config.clone();
    Router::new()
        .merge(hierarchy::hierarchy_routes())
        .merge(content::content_routes(&config))
        .merge(qa::qa_routes())
        .merge(upload::upload_routes())
        .merge(files::file_routes())
        .merge(users::user_routes())
        .merge(collections::collection_routes(&config))
        .merge(stats::stats_routes())
        .with_state(state)
}
