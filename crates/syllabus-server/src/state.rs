//! Application state

use std::sync::Arc;
use syllabus::MongoDb;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// MongoDB connection shared with the catalogue routes
    pub db: Arc<MongoDb>,

    /// Server configuration
    pub config: Config,
}

impl AppState {
    pub fn new(db: Arc<MongoDb>, config: Config) -> Self {
        Self { db, config }
    }
}
