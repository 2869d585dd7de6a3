//! Upload pipeline
//!
//! A staged upload is attached to a lesson (resolving sub-unit and unit ids
//! to their first lesson), moved into the hierarchy-derived directory tree
//! and recorded as a `Content` document.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::content_service::ContentService;
use super::hierarchy_service::HierarchyService;
use super::storage::{mime_type_for, move_into_place, remove_file_best_effort, resource_dir, unique_file_name};
use crate::config::CatalogConfig;
use crate::db::MongoDb;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{Content, ContentDetails, ContentInfo, ContentType, ResolvedVia, UploadMetadata};

/// A file already streamed to the staging directory
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub temp_path: PathBuf,
    pub original_name: String,
    pub size: u64,
    pub content_type: Option<String>,
}

/// Form fields accompanying an upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub lesson_id: String,
    pub kind: ContentType,
    pub title: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub content: ContentInfo,
    pub resolved_via: ResolvedVia,
}

pub struct UploadService {
    db: MongoDb,
    config: CatalogConfig,
}

impl UploadService {
    pub fn new(db: MongoDb, config: CatalogConfig) -> Self {
        Self { db, config }
    }

    /// Store a staged file. The staged copy never outlives this call: on
    /// failure it is deleted, on success it has been moved into place.
    pub async fn store(&self, staged: StagedFile, request: UploadRequest) -> CatalogResult<UploadOutcome> {
        let result = self.store_staged(&staged, request).await;
        if let Err(e) = &result {
            tracing::warn!("Upload of {:?} failed: {}", staged.original_name, e);
            remove_file_best_effort(&staged.temp_path).await;
        }
        result
    }

    async fn store_staged(&self, staged: &StagedFile, request: UploadRequest) -> CatalogResult<UploadOutcome> {
        if staged.size > self.config.max_upload_bytes {
            return Err(CatalogError::PayloadTooLarge {
                size: staged.size,
                limit: self.config.max_upload_bytes,
            });
        }
        let mut details = ContentDetails::from_parts(request.kind, request.metadata)?;

        let hierarchy = HierarchyService::new(self.db.clone());
        let (lesson, resolved_via) = hierarchy.resolve_lesson(&request.lesson_id).await?;
        let lesson_id = lesson
            .id
            .ok_or_else(|| CatalogError::Internal("lesson without id".to_string()))?;
        if resolved_via != ResolvedVia::Lesson {
            tracing::info!(
                "Upload target {} resolved via {:?} to lesson {}",
                request.lesson_id,
                resolved_via,
                lesson_id
            );
        }
        let path = hierarchy.hierarchy_path(&lesson).await?;

        let stored_file_name = unique_file_name(&staged.original_name);
        let destination = resource_dir(&self.config.upload_root, &path, request.kind).join(&stored_file_name);
        move_into_place(&staged.temp_path, &destination).await?;
        let destination = absolute(&destination).await;

        let mime_type = staged
            .content_type
            .clone()
            .filter(|m| !m.is_empty() && m != "application/octet-stream")
            .unwrap_or_else(|| mime_type_for(&destination));
        details.set_upload(Some(UploadMetadata {
            virtual_path: path.virtual_path(),
            original_lesson_id: request.lesson_id.clone(),
            resolved_lesson_id: lesson_id.to_hex(),
            mime_type,
            stored_file_name,
        }));

        let title = match request.title.trim() {
            "" => staged.original_name.clone(),
            title => title.to_string(),
        };
        let mut content = Content::new(lesson_id, details, title, String::new());
        content.file_path = Some(destination.to_string_lossy().into_owned());
        content.original_file_name = Some(staged.original_name.clone());
        content.file_size = Some(staged.size as i64);

        let contents = ContentService::new(self.db.clone(), self.config.clone());
        let content = match contents.insert(content).await {
            Ok(content) => content,
            Err(e) => {
                remove_file_best_effort(&destination).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Stored upload {:?} ({} bytes) at {:?}",
            staged.original_name,
            staged.size,
            destination
        );
        Ok(UploadOutcome {
            content: content.into(),
            resolved_via,
        })
    }
}

async fn absolute(path: &Path) -> PathBuf {
    match tokio::fs::canonicalize(path).await {
        Ok(path) => path,
        Err(_) => path.to_path_buf(),
    }
}
