//! Service layer for the catalogue

pub mod collection_service;
pub mod content_service;
pub mod hierarchy_service;
pub mod qa_service;
pub mod stats_service;
pub mod storage;
pub mod upload_service;
pub mod user_service;

pub use collection_service::CollectionService;
pub use content_service::ContentService;
pub use hierarchy_service::{DeleteReport, HierarchyService};
pub use qa_service::QaService;
pub use stats_service::StatsService;
pub use upload_service::{StagedFile, UploadRequest, UploadService};
pub use user_service::UserService;
