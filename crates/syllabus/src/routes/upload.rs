//! Upload route
//!
//! `POST /upload` takes one multipart `file` plus `lessonId`, `type`,
//! `title` and optional JSON `metadata`. The file is streamed to the staging
//! directory with its size counted as it arrives.

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::AppState;
use crate::error::{CatalogError, CatalogResult};
use crate::models::ContentType;
use crate::services::storage::remove_file_best_effort;
use crate::services::upload_service::UploadOutcome;
use crate::services::{StagedFile, UploadRequest, UploadService};

pub fn upload_routes() -> Router<Arc<AppState>> {
    // The handler enforces the upload ceiling while streaming
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::disable())
}

#[derive(Default)]
struct UploadForm {
    staged: Option<StagedFile>,
    lesson_id: Option<String>,
    kind: Option<String>,
    title: Option<String>,
    metadata: Option<String>,
}

impl UploadForm {
    async fn discard(&mut self) {
        if let Some(staged) = self.staged.take() {
            remove_file_best_effort(&staged.temp_path).await;
        }
    }

    fn into_request(self) -> CatalogResult<(StagedFile, UploadRequest)> {
        let staged = self
            .staged
            .ok_or_else(|| CatalogError::Validation("file is required".to_string()))?;
        let lesson_id = self
            .lesson_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CatalogError::Validation("lessonId is required".to_string()))?;
        let kind = self
            .kind
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CatalogError::Validation("type is required".to_string()))?
            .parse::<ContentType>()?;
        let metadata = self
            .metadata
            .filter(|s| !s.trim().is_empty())
            .map(serde_json::Value::String);

        Ok((
            staged,
            UploadRequest {
                lesson_id: lesson_id.trim().to_string(),
                kind,
                title: self.title.unwrap_or_default(),
                metadata,
            },
        ))
    }
}

fn bad_form(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Validation(format!("Failed to read form data: {}", e))
}

/// Stream one multipart field into `dir`, failing once it passes `limit`
async fn stage_field(mut field: Field<'_>, dir: &Path, limit: u64) -> CatalogResult<StagedFile> {
    let original_name = field
        .file_name()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "upload".to_string());
    let content_type = field.content_type().map(|s| s.to_string());

    fs::create_dir_all(dir).await?;
    let temp_path: PathBuf = dir.join(format!("{}.part", Uuid::new_v4()));
    let mut file = fs::File::create(&temp_path).await?;
    let mut size: u64 = 0;

    let written: CatalogResult<()> = async {
        while let Some(chunk) = field.chunk().await.map_err(bad_form)? {
            size += chunk.len() as u64;
            if size > limit {
                return Err(CatalogError::PayloadTooLarge { size, limit });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = written {
        drop(file);
        remove_file_best_effort(&temp_path).await;
        return Err(e);
    }

    Ok(StagedFile {
        temp_path,
        original_name,
        size,
        content_type,
    })
}

async fn read_form(multipart: &mut Multipart, form: &mut UploadForm, temp_dir: &Path, limit: u64) -> CatalogResult<()> {
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if form.staged.is_some() {
                    return Err(CatalogError::Validation(
                        "only one file may be uploaded per request".to_string(),
                    ));
                }
                form.staged = Some(stage_field(field, temp_dir, limit).await?);
            }
            "lessonId" => form.lesson_id = Some(field.text().await.map_err(bad_form)?),
            "type" => form.kind = Some(field.text().await.map_err(bad_form)?),
            "title" => form.title = Some(field.text().await.map_err(bad_form)?),
            "metadata" => form.metadata = Some(field.text().await.map_err(bad_form)?),
            other => tracing::debug!("Ignoring upload form field {:?}", other),
        }
    }
    Ok(())
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> CatalogResult<(StatusCode, Json<UploadOutcome>)> {
    let config = &state.config;
    let mut form = UploadForm::default();

    if let Err(e) = read_form(&mut multipart, &mut form, &config.temp_dir(), config.max_upload_bytes).await {
        form.discard().await;
        return Err(e);
    }

    let staged_path = form.staged.as_ref().map(|s| s.temp_path.clone());
    let (staged, request) = match form.into_request() {
        Ok(parts) => parts,
        Err(e) => {
            if let Some(path) = staged_path {
                remove_file_best_effort(&path).await;
            }
            return Err(e);
        }
    };

    let service = UploadService::new((*state.db).clone(), (**config).clone());
    let outcome = service.store(staged, request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged() -> StagedFile {
        StagedFile {
            temp_path: PathBuf::from("/tmp/x.part"),
            original_name: "x.pdf".into(),
            size: 3,
            content_type: None,
        }
    }

    #[test]
    fn test_form_requires_fields() {
        let form = UploadForm {
            staged: Some(staged()),
            kind: Some("book".into()),
            ..Default::default()
        };
        let err = form.into_request().unwrap_err();
        assert!(err.to_string().contains("lessonId"));

        let form = UploadForm {
            lesson_id: Some("65a1f0c2e4b0a1b2c3d4e5f6".into()),
            kind: Some("book".into()),
            ..Default::default()
        };
        assert!(form.into_request().unwrap_err().to_string().contains("file"));
    }

    #[test]
    fn test_form_parses_type_and_metadata() {
        let form = UploadForm {
            staged: Some(staged()),
            lesson_id: Some(" 65a1f0c2e4b0a1b2c3d4e5f6 ".into()),
            kind: Some("questionPaper".into()),
            title: None,
            metadata: Some(r#"{"category":"Board"}"#.into()),
        };
        let (_, request) = form.into_request().unwrap();
        assert_eq!(request.kind, ContentType::QuestionPaper);
        assert_eq!(request.lesson_id, "65a1f0c2e4b0a1b2c3d4e5f6");
        assert!(request.metadata.is_some());

        let bad_type = UploadForm {
            staged: Some(staged()),
            lesson_id: Some("65a1f0c2e4b0a1b2c3d4e5f6".into()),
            kind: Some("hologram".into()),
            ..Default::default()
        };
        assert_eq!(bad_type.into_request().unwrap_err().code(), "VALIDATION_ERROR");
    }
}
