//! Content model for MongoDB
//!
//! `type` and `metadata` form a tagged union: the resource type decides
//! which metadata shape is stored next to it.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::common::{bson_datetime_or_now, lenient_u32};
use crate::error::{CatalogError, CatalogResult};

/// Resource type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    Book,
    Slide,
    Flashcard,
    Notes,
    Qa,
    Quiz,
    Activity,
    Extra,
    Video,
    Audio,
    Worksheet,
    QuestionPaper,
}

impl ContentType {
    pub const ALL: [ContentType; 12] = [
        ContentType::Book,
        ContentType::Slide,
        ContentType::Flashcard,
        ContentType::Notes,
        ContentType::Qa,
        ContentType::Quiz,
        ContentType::Activity,
        ContentType::Extra,
        ContentType::Video,
        ContentType::Audio,
        ContentType::Worksheet,
        ContentType::QuestionPaper,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Book => "book",
            ContentType::Slide => "slide",
            ContentType::Flashcard => "flashcard",
            ContentType::Notes => "notes",
            ContentType::Qa => "qa",
            ContentType::Quiz => "quiz",
            ContentType::Activity => "activity",
            ContentType::Extra => "extra",
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Worksheet => "worksheet",
            ContentType::QuestionPaper => "questionPaper",
        }
    }

    /// Folder under a unit directory where uploads of this type are filed
    pub fn folder_name(self) -> &'static str {
        match self {
            ContentType::Book => "Books",
            ContentType::Slide => "Slides",
            ContentType::Flashcard => "Flashcards",
            ContentType::Notes => "Notes",
            ContentType::Qa => "QA",
            ContentType::Quiz => "Quizzes",
            ContentType::Activity => "Activities",
            ContentType::Extra => "Extras",
            ContentType::Video => "Videos",
            ContentType::Audio => "Audios",
            ContentType::Worksheet => "Worksheets",
            ContentType::QuestionPaper => "QuestionPapers",
        }
    }

    /// Types whose inline body is usually an embedded file (base64 data URL)
    pub fn is_file_like(self) -> bool {
        matches!(
            self,
            ContentType::Book
                | ContentType::Slide
                | ContentType::Worksheet
                | ContentType::QuestionPaper
                | ContentType::Audio
                | ContentType::Video
        )
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ContentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CatalogError::Validation(format!("Unknown content type: {}", s)))
    }
}

/// Where an uploaded file came from and where it was filed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub virtual_path: String,
    pub original_lesson_id: String,
    pub resolved_lesson_id: String,
    pub mime_type: String,
    pub stored_file_name: String,
}

/// Metadata for resource types without type-specific fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadMetadata>,
}

/// Q&A metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QaMetadata {
    #[serde(deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub marks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognitive_process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadMetadata>,
}

/// Question paper metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuestionPaperMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadMetadata>,
}

/// Resource type together with its metadata payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "metadata", rename_all = "camelCase")]
pub enum ContentDetails {
    Book(ResourceMetadata),
    Slide(ResourceMetadata),
    Flashcard(ResourceMetadata),
    Notes(ResourceMetadata),
    Qa(QaMetadata),
    Quiz(ResourceMetadata),
    Activity(ResourceMetadata),
    Extra(ResourceMetadata),
    Video(ResourceMetadata),
    Audio(ResourceMetadata),
    Worksheet(ResourceMetadata),
    QuestionPaper(QuestionPaperMetadata),
}

impl ContentDetails {
    /// Build the variant for `kind` from client-supplied metadata JSON.
    pub fn from_parts(kind: ContentType, metadata: Option<serde_json::Value>) -> CatalogResult<Self> {
        let value = match metadata {
            None | Some(serde_json::Value::Null) => serde_json::Value::Object(Default::default()),
            Some(v @ serde_json::Value::Object(_)) => v,
            // Multipart clients send metadata as a JSON string
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
                serde_json::Value::Object(Default::default())
            }
            Some(serde_json::Value::String(s)) => serde_json::from_str(&s).map_err(|e| {
                CatalogError::Validation(format!("metadata is not valid JSON: {}", e))
            })?,
            Some(other) => {
                return Err(CatalogError::Validation(format!(
                    "metadata must be an object, got {}",
                    other
                )))
            }
        };

        let invalid = |e: serde_json::Error| {
            CatalogError::Validation(format!("invalid {} metadata: {}", kind, e))
        };
        let resource = |v: serde_json::Value| -> CatalogResult<ResourceMetadata> {
            serde_json::from_value(v).map_err(invalid)
        };

        Ok(match kind {
            ContentType::Book => ContentDetails::Book(resource(value)?),
            ContentType::Slide => ContentDetails::Slide(resource(value)?),
            ContentType::Flashcard => ContentDetails::Flashcard(resource(value)?),
            ContentType::Notes => ContentDetails::Notes(resource(value)?),
            ContentType::Qa => ContentDetails::Qa(serde_json::from_value(value).map_err(invalid)?),
            ContentType::Quiz => ContentDetails::Quiz(resource(value)?),
            ContentType::Activity => ContentDetails::Activity(resource(value)?),
            ContentType::Extra => ContentDetails::Extra(resource(value)?),
            ContentType::Video => ContentDetails::Video(resource(value)?),
            ContentType::Audio => ContentDetails::Audio(resource(value)?),
            ContentType::Worksheet => ContentDetails::Worksheet(resource(value)?),
            ContentType::QuestionPaper => {
                ContentDetails::QuestionPaper(serde_json::from_value(value).map_err(invalid)?)
            }
        })
    }

    pub fn kind(&self) -> ContentType {
        match self {
            ContentDetails::Book(_) => ContentType::Book,
            ContentDetails::Slide(_) => ContentType::Slide,
            ContentDetails::Flashcard(_) => ContentType::Flashcard,
            ContentDetails::Notes(_) => ContentType::Notes,
            ContentDetails::Qa(_) => ContentType::Qa,
            ContentDetails::Quiz(_) => ContentType::Quiz,
            ContentDetails::Activity(_) => ContentType::Activity,
            ContentDetails::Extra(_) => ContentType::Extra,
            ContentDetails::Video(_) => ContentType::Video,
            ContentDetails::Audio(_) => ContentType::Audio,
            ContentDetails::Worksheet(_) => ContentType::Worksheet,
            ContentDetails::QuestionPaper(_) => ContentType::QuestionPaper,
        }
    }

    pub fn upload(&self) -> Option<&UploadMetadata> {
        match self {
            ContentDetails::Qa(m) => m.upload.as_ref(),
            ContentDetails::QuestionPaper(m) => m.upload.as_ref(),
            ContentDetails::Book(m)
            | ContentDetails::Slide(m)
            | ContentDetails::Flashcard(m)
            | ContentDetails::Notes(m)
            | ContentDetails::Quiz(m)
            | ContentDetails::Activity(m)
            | ContentDetails::Extra(m)
            | ContentDetails::Video(m)
            | ContentDetails::Audio(m)
            | ContentDetails::Worksheet(m) => m.upload.as_ref(),
        }
    }

    pub fn set_upload(&mut self, upload: Option<UploadMetadata>) {
        match self {
            ContentDetails::Qa(m) => m.upload = upload,
            ContentDetails::QuestionPaper(m) => m.upload = upload,
            ContentDetails::Book(m)
            | ContentDetails::Slide(m)
            | ContentDetails::Flashcard(m)
            | ContentDetails::Notes(m)
            | ContentDetails::Quiz(m)
            | ContentDetails::Activity(m)
            | ContentDetails::Extra(m)
            | ContentDetails::Video(m)
            | ContentDetails::Audio(m)
            | ContentDetails::Worksheet(m) => m.upload = upload,
        }
    }

    /// Metadata payload as JSON, for API responses
    pub fn metadata_json(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("metadata").map(serde_json::Value::take))
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()))
    }
}

/// Content document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub lesson_id: ObjectId,
    #[serde(flatten)]
    pub details: ContentDetails,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default = "Utc::now", with = "bson_datetime_or_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "bson_datetime_or_now")]
    pub updated_at: DateTime<Utc>,
}

impl Content {
    pub fn new(lesson_id: ObjectId, details: ContentDetails, title: String, body: String) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            lesson_id,
            details,
            title,
            body,
            file_path: None,
            original_file_name: None,
            file_size: None,
            view_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> ContentType {
        self.details.kind()
    }
}

/// Content response for the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub lesson_id: String,
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    pub view_count: i64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Content> for ContentInfo {
    fn from(c: Content) -> Self {
        Self {
            id: c.id.map(|id| id.to_hex()).unwrap_or_default(),
            lesson_id: c.lesson_id.to_hex(),
            kind: c.details.kind(),
            metadata: c.details.metadata_json(),
            title: c.title,
            body: c.body,
            file_path: c.file_path,
            original_file_name: c.original_file_name,
            file_size: c.file_size,
            view_count: c.view_count,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Content grouped by resource type
#[derive(Debug, Clone, Serialize)]
pub struct ContentGroup {
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub count: usize,
    pub docs: Vec<ContentInfo>,
}

/// Group documents by type, in enumeration order, skipping empty types.
/// Document order within a group is preserved.
pub fn group_by_type(docs: Vec<Content>) -> Vec<ContentGroup> {
    let mut buckets: std::collections::BTreeMap<ContentType, Vec<ContentInfo>> =
        std::collections::BTreeMap::new();
    for doc in docs {
        buckets.entry(doc.kind()).or_default().push(doc.into());
    }
    buckets
        .into_iter()
        .map(|(kind, docs)| ContentGroup {
            kind,
            count: docs.len(),
            docs,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(kind: ContentType, title: &str) -> Content {
        Content::new(
            ObjectId::new(),
            ContentDetails::from_parts(kind, None).unwrap(),
            title.to_string(),
            String::new(),
        )
    }

    #[test]
    fn test_parse_content_type() {
        assert_eq!("questionPaper".parse::<ContentType>().unwrap(), ContentType::QuestionPaper);
        assert_eq!("QA".parse::<ContentType>().unwrap(), ContentType::Qa);
        assert!("podcast".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_folder_names() {
        assert_eq!(ContentType::Book.folder_name(), "Books");
        assert_eq!(ContentType::Audio.folder_name(), "Audios");
        assert_eq!(ContentType::QuestionPaper.folder_name(), "QuestionPapers");
    }

    #[test]
    fn test_group_by_type_counts_match() {
        let groups = group_by_type(vec![
            content(ContentType::Video, "v1"),
            content(ContentType::Book, "b1"),
            content(ContentType::Video, "v2"),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, ContentType::Book);
        assert_eq!(groups[1].kind, ContentType::Video);
        for group in &groups {
            assert_eq!(group.count, group.docs.len());
        }
        assert_eq!(groups[1].docs[0].title, "v1");
        assert_eq!(groups[1].docs[1].title, "v2");
    }

    #[test]
    fn test_single_type_still_grouped() {
        let groups = group_by_type(vec![content(ContentType::Notes, "n")]);
        let json = serde_json::to_value(&groups).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["type"], "notes");
        assert_eq!(json[0]["count"], 1);
    }

    #[test]
    fn test_metadata_shape_follows_type() {
        let details = ContentDetails::from_parts(
            ContentType::Qa,
            Some(serde_json::json!({
                "marks": "3",
                "questionType": "short",
                "cognitiveProcess": "understand"
            })),
        )
        .unwrap();
        match &details {
            ContentDetails::Qa(meta) => {
                assert_eq!(meta.marks, Some(3));
                assert_eq!(meta.question_type.as_deref(), Some("short"));
            }
            other => panic!("unexpected variant {:?}", other),
        }

        let paper = ContentDetails::from_parts(
            ContentType::QuestionPaper,
            Some(serde_json::Value::String(r#"{"category":"Board","subCategory":"2023"}"#.into())),
        )
        .unwrap();
        assert_eq!(paper.metadata_json()["subCategory"], "2023");

        assert!(ContentDetails::from_parts(ContentType::Book, Some(serde_json::json!([1]))).is_err());
    }

    #[test]
    fn test_stored_document_keeps_type_beside_metadata() {
        let mut doc = content(ContentType::Audio, "Lecture");
        doc.details.set_upload(Some(UploadMetadata {
            virtual_path: "A/B/C/D".into(),
            stored_file_name: "x.mp3".into(),
            ..Default::default()
        }));

        let stored = bson::to_document(&doc).unwrap();
        assert_eq!(stored.get_str("type").unwrap(), "audio");
        let metadata = stored.get_document("metadata").unwrap();
        assert_eq!(
            metadata.get_document("upload").unwrap().get_str("storedFileName").unwrap(),
            "x.mp3"
        );

        let back: Content = bson::from_document(stored).unwrap();
        assert_eq!(back.kind(), ContentType::Audio);
        assert_eq!(back.details.upload().unwrap().virtual_path, "A/B/C/D");
    }
}
