//! Syllabus catalogue module
//!
//! Hierarchical learning-content catalogue: Class → Subject → Unit →
//! SubUnit → Lesson, with typed `Content` documents attached to lessons.
//!
//! # Features
//! - Generic hierarchy CRUD with a materialized ancestor path per node
//! - Grouped content reads, Q&A and flashcard derivative views
//! - Multipart upload pipeline filing uploads into a hierarchy-derived tree
//! - Range-aware file serving
//! - User management and admin collection import/export

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;

pub use config::CatalogConfig;
pub use db::MongoDb;
pub use error::{CatalogError, CatalogResult};

/// Kind of account behind an authenticated request
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Webmaster,
}

/// Authenticated principal from auth middleware
#[derive(Clone, Debug)]
pub struct AuthenticatedPrincipal {
    pub kind: PrincipalKind,
    pub id: String,
    pub role: String,
}

impl AuthenticatedPrincipal {
    /// Webmasters and admin users may manage accounts and raw collections.
    pub fn is_administrator(&self) -> bool {
        self.kind == PrincipalKind::Webmaster || self.role == "admin"
    }
}
