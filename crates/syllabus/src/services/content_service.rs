//! Content service for MongoDB

use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document as BsonDoc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::storage::remove_file_best_effort;
use crate::config::CatalogConfig;
use crate::db::{collections, MongoDb};
use crate::error::{CatalogError, CatalogResult};
use crate::models::payload::{parse_flashcards, parse_quiz, sanitize_json};
use crate::models::{
    group_by_type, parse_oid, Content, ContentDetails, ContentGroup, ContentType, Flashcard,
    Level, Node,
};

/// Request to create inline content
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContent {
    pub lesson_id: String,
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Partial content update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    pub lesson_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ContentType>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Raw JSON pasted into the bulk import dialog
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImport {
    pub lesson_id: String,
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub title: String,
    pub json: String,
}

/// Parsed cards of one flashcard document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardDeck {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub cards: Vec<Flashcard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonFlashcards {
    pub lesson_id: String,
    pub decks: Vec<FlashcardDeck>,
    pub total_cards: usize,
}

/// Check an inline body against the size ceilings and, for structured
/// types, its JSON shape.
///
/// File-like types are capped at `inline_file_limit_bytes` (400); every
/// type is capped at `inline_body_limit_bytes` (413).
pub fn check_inline_body(kind: ContentType, body: &str, config: &CatalogConfig) -> CatalogResult<()> {
    let size = body.len();
    if kind.is_file_like() && size > config.inline_file_limit_bytes {
        return Err(CatalogError::FileTooLarge {
            size,
            limit: config.inline_file_limit_bytes,
        });
    }
    if size > config.inline_body_limit_bytes {
        return Err(CatalogError::PayloadTooLarge {
            size: size as u64,
            limit: config.inline_body_limit_bytes as u64,
        });
    }

    if !body.trim().is_empty() {
        match kind {
            ContentType::Quiz => {
                parse_quiz(body)?;
            }
            ContentType::Flashcard => {
                parse_flashcards(body)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Store structured bodies in canonical form
fn normalize_body(kind: ContentType, body: String) -> CatalogResult<String> {
    if body.trim().is_empty() {
        return Ok(body);
    }
    match kind {
        ContentType::Quiz => Ok(serde_json::to_string(&parse_quiz(&body)?)?),
        ContentType::Flashcard => Ok(serde_json::to_string(&parse_flashcards(&body)?)?),
        _ => Ok(body),
    }
}

pub struct ContentService {
    db: MongoDb,
    config: CatalogConfig,
}

impl ContentService {
    pub fn new(db: MongoDb, config: CatalogConfig) -> Self {
        Self { db, config }
    }

    fn contents(&self) -> mongodb::Collection<Content> {
        self.db.collection(collections::CONTENTS)
    }

    async fn require_lesson(&self, lesson_id: &str) -> CatalogResult<ObjectId> {
        let oid = parse_oid("lessonId", lesson_id)?;
        let exists = self
            .db
            .collection::<Node>(Level::Lesson.collection())
            .count_documents(doc! { "_id": oid }, None)
            .await?;
        if exists == 0 {
            return Err(CatalogError::ParentNotFound {
                level: Level::Lesson.label(),
                id: lesson_id.to_string(),
            });
        }
        Ok(oid)
    }

    /// Content of a lesson in creation order
    pub async fn list(&self, lesson: ObjectId, kind: Option<ContentType>) -> CatalogResult<Vec<Content>> {
        let mut filter = doc! { "lessonId": lesson };
        if let Some(kind) = kind {
            filter.insert("type", kind.as_str());
        }
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1, "_id": 1 })
            .build();
        let cursor = self.contents().find(filter, options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Content of a lesson grouped by type
    pub async fn list_grouped(&self, lesson_id: &str, kind: Option<ContentType>) -> CatalogResult<Vec<ContentGroup>> {
        let lesson = parse_oid("lessonId", lesson_id)?;
        Ok(group_by_type(self.list(lesson, kind).await?))
    }

    pub async fn get(&self, id: &str) -> CatalogResult<Content> {
        let oid = parse_oid("id", id)?;
        self.contents()
            .find_one(doc! { "_id": oid }, None)
            .await?
            .ok_or_else(|| CatalogError::ContentNotFound(id.to_string()))
    }

    /// Content whose upload was stored under `file_name`
    pub async fn find_by_stored_file_name(&self, file_name: &str) -> CatalogResult<Option<Content>> {
        Ok(self
            .contents()
            .find_one(doc! { "metadata.upload.storedFileName": file_name }, None)
            .await?)
    }

    pub async fn create(&self, request: NewContent) -> CatalogResult<Content> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::Validation("title is required".to_string()));
        }
        check_inline_body(request.kind, &request.body, &self.config)?;
        let lesson = self.require_lesson(&request.lesson_id).await?;

        let details = ContentDetails::from_parts(request.kind, request.metadata)?;
        let body = normalize_body(request.kind, request.body)?;
        let content = Content::new(lesson, details, title, body);
        self.insert(content).await
    }

    /// Insert a fully built document (used by the upload pipeline too)
    pub async fn insert(&self, mut content: Content) -> CatalogResult<Content> {
        let result = self.contents().insert_one(&content, None).await?;
        content.id = result.inserted_id.as_object_id();
        tracing::info!(
            "Created {} content {:?} in lesson {}",
            content.kind(),
            content.id,
            content.lesson_id
        );
        Ok(content)
    }

    pub async fn update(&self, id: &str, patch: ContentPatch) -> CatalogResult<Content> {
        let mut content = self.get(id).await?;
        let oid = content
            .id
            .ok_or_else(|| CatalogError::Internal("content without id".to_string()))?;

        if let Some(lesson_id) = &patch.lesson_id {
            content.lesson_id = self.require_lesson(lesson_id).await?;
        }
        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(CatalogError::Validation("title is required".to_string()));
            }
            content.title = title;
        }

        let kind = patch.kind.unwrap_or_else(|| content.kind());
        if patch.kind.is_some() || patch.metadata.is_some() {
            let metadata = match patch.metadata {
                Some(metadata) => Some(metadata),
                None => Some(content.details.metadata_json()),
            };
            let upload = content.details.upload().cloned();
            let mut details = ContentDetails::from_parts(kind, metadata)?;
            if details.upload().is_none() {
                details.set_upload(upload);
            }
            content.details = details;
        }

        if let Some(body) = patch.body {
            check_inline_body(kind, &body, &self.config)?;
            content.body = normalize_body(kind, body)?;
        } else if patch.kind.is_some() {
            check_inline_body(kind, &content.body, &self.config)?;
        }

        content.updated_at = Utc::now();
        self.contents()
            .replace_one(doc! { "_id": oid }, &content, None)
            .await?;
        Ok(content)
    }

    /// Delete a document and, best-effort, its backing file.
    /// Returns the removed document and whether a file was deleted.
    pub async fn delete(&self, id: &str) -> CatalogResult<(Content, bool)> {
        let content = self.get(id).await?;
        self.contents()
            .delete_one(doc! { "_id": content.id }, None)
            .await?;

        let file_removed = match &content.file_path {
            Some(path) => remove_file_best_effort(Path::new(path)).await,
            None => false,
        };
        tracing::info!("Deleted content {} (file removed: {})", id, file_removed);
        Ok((content, file_removed))
    }

    /// Detach a deleted file from its record
    pub async fn clear_file_path(&self, id: ObjectId) -> CatalogResult<()> {
        self.contents()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$unset": { "filePath": "" },
                    "$set": { "updatedAt": bson::DateTime::from_chrono(Utc::now()) },
                },
                None,
            )
            .await?;
        Ok(())
    }

    /// Atomically bump the view counter, returning the new value
    pub async fn record_view(&self, id: &str) -> CatalogResult<i64> {
        let oid = parse_oid("id", id)?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .db
            .collection::<BsonDoc>(collections::CONTENTS)
            .find_one_and_update(doc! { "_id": oid }, doc! { "$inc": { "viewCount": 1 } }, options)
            .await?
            .ok_or_else(|| CatalogError::ContentNotFound(id.to_string()))?;

        Ok(match updated.get("viewCount") {
            Some(bson::Bson::Int32(n)) => i64::from(*n),
            Some(bson::Bson::Int64(n)) => *n,
            Some(bson::Bson::Double(n)) => *n as i64,
            _ => 0,
        })
    }

    /// Parsed flashcards of every flashcard document in a lesson
    pub async fn flashcards(&self, lesson_id: &str) -> CatalogResult<LessonFlashcards> {
        let lesson = parse_oid("lessonId", lesson_id)?;
        let docs = self.list(lesson, Some(ContentType::Flashcard)).await?;

        let decks: Vec<FlashcardDeck> = docs
            .into_iter()
            .map(|doc| {
                let id = doc.id.map(|id| id.to_hex()).unwrap_or_default();
                let (cards, error) = if doc.body.trim().is_empty() {
                    (Vec::new(), None)
                } else {
                    match parse_flashcards(&doc.body) {
                        Ok(cards) => (cards, None),
                        Err(e) => {
                            tracing::warn!("Flashcard content {} has an unreadable body: {}", id, e);
                            (Vec::new(), Some(e.to_string()))
                        }
                    }
                };
                FlashcardDeck {
                    id,
                    title: doc.title,
                    cards,
                    error,
                }
            })
            .collect();

        Ok(LessonFlashcards {
            lesson_id: lesson.to_hex(),
            total_cards: decks.iter().map(|d| d.cards.len()).sum(),
            decks,
        })
    }

    /// Store a pasted quiz or flashcard JSON payload as one document
    pub async fn bulk_import(&self, request: BulkImport) -> CatalogResult<Content> {
        if !matches!(request.kind, ContentType::Quiz | ContentType::Flashcard) {
            return Err(CatalogError::Validation(format!(
                "bulk import supports quiz and flashcard content, not {}",
                request.kind
            )));
        }
        let body = sanitize_json(&request.json);
        if body.is_empty() {
            return Err(CatalogError::Validation("json is required".to_string()));
        }
        self.create(NewContent {
            lesson_id: request.lesson_id,
            kind: request.kind,
            title: request.title,
            body,
            metadata: None,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CatalogConfig {
        CatalogConfig {
            inline_file_limit_bytes: 12,
            inline_body_limit_bytes: 15,
            ..CatalogConfig::default()
        }
    }

    #[test]
    fn test_file_like_body_over_limit_is_bad_request() {
        let err = check_inline_body(ContentType::Book, &"x".repeat(13), &config()).unwrap_err();
        assert_eq!(err.code(), "FILE_TOO_LARGE");
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        // File-like types report FILE_TOO_LARGE even past the absolute ceiling
        let err = check_inline_body(ContentType::Video, &"x".repeat(20), &config()).unwrap_err();
        assert_eq!(err.code(), "FILE_TOO_LARGE");
    }

    #[test]
    fn test_any_body_over_ceiling_is_payload_too_large() {
        assert!(check_inline_body(ContentType::Notes, &"x".repeat(13), &config()).is_ok());
        let err = check_inline_body(ContentType::Notes, &"x".repeat(16), &config()).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_structured_bodies_are_validated() {
        let config = CatalogConfig::default();
        assert!(check_inline_body(ContentType::Quiz, r#"[{"question":"?"}]"#, &config).is_ok());
        assert!(check_inline_body(ContentType::Quiz, "", &config).is_ok());
        let err = check_inline_body(ContentType::Flashcard, "{oops", &config).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONTENT");
        assert!(check_inline_body(ContentType::Notes, "{oops", &config).is_ok());
    }

    #[test]
    fn test_normalize_body_canonicalizes_cards() {
        let body = normalize_body(
            ContentType::Flashcard,
            "[{\u{201c}question\u{201d}: \"a\", \"answer\": \"b\",}]".to_string(),
        )
        .unwrap();
        assert_eq!(body, r#"[{"front":"a","back":"b"}]"#);
        assert_eq!(normalize_body(ContentType::Notes, "<p>x</p>".into()).unwrap(), "<p>x</p>");
    }
}
