//! Data models for the catalogue

pub mod common;
pub mod content;
pub mod hierarchy;
pub mod payload;
pub mod user;

pub use common::parse_oid;
pub use content::{
    group_by_type, Content, ContentDetails, ContentGroup, ContentInfo, ContentType,
    QaMetadata, QuestionPaperMetadata, ResourceMetadata, UploadMetadata,
};
pub use hierarchy::{DocumentCheck, HierarchyPath, Level, Node, NodeInfo, ResolvedVia};
pub use payload::{Flashcard, QuizQuestion};
pub use user::{User, UserInfo, Webmaster, WebmasterInfo};
