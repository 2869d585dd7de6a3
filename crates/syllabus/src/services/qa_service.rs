//! Q&A listing and statistics for MongoDB

use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document as BsonDoc};
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::QA_MAX_PAGE_LIMIT;
use crate::db::{collections, MongoDb};
use crate::error::CatalogResult;
use crate::models::{parse_oid, Content, ContentInfo, ContentType};

/// Q&A list filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaQuery {
    pub question_type: Option<String>,
    pub cognitive_process: Option<String>,
    pub marks: Option<u32>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaPage {
    pub total: u64,
    pub limit: u64,
    pub skip: u64,
    pub items: Vec<ContentInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QaStats {
    pub total: u64,
    pub total_marks: i64,
    pub by_question_type: BTreeMap<String, u64>,
    pub by_cognitive_process: BTreeMap<String, u64>,
    pub by_marks: BTreeMap<String, u64>,
}

/// Build the find filter for a lesson's Q&A items
pub fn qa_filter(lesson: ObjectId, query: &QaQuery) -> BsonDoc {
    let mut filter = doc! { "lessonId": lesson, "type": ContentType::Qa.as_str() };
    if let Some(question_type) = query.question_type.as_deref().filter(|s| !s.is_empty()) {
        filter.insert("metadata.questionType", question_type);
    }
    if let Some(process) = query.cognitive_process.as_deref().filter(|s| !s.is_empty()) {
        filter.insert("metadata.cognitiveProcess", process);
    }
    if let Some(marks) = query.marks {
        // Older documents store marks as text such as "2" or "2 marks"
        let text = Bson::RegularExpression(bson::Regex {
            pattern: marks_text_pattern(marks),
            options: String::new(),
        });
        filter.insert("metadata.marks", doc! { "$in": [i64::from(marks), text] });
    }
    filter
}

/// Matches text whose first word reads as `marks`, the same way stored
/// marks are parsed for display
fn marks_text_pattern(marks: u32) -> String {
    format!(r"^\s*0*{}(\s|$)", marks)
}

/// Clamp page parameters to sane bounds
pub fn page_bounds(query: &QaQuery, default_limit: u64) -> (u64, u64) {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(default_limit)
        .min(QA_MAX_PAGE_LIMIT);
    (limit, query.skip.unwrap_or(0))
}

fn bucket_map(doc: &BsonDoc, field: &str) -> BTreeMap<String, u64> {
    doc.get_array(field)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(Bson::as_document)
                .map(|bucket| {
                    let key = match bucket.get("_id") {
                        Some(Bson::String(s)) if !s.is_empty() => s.clone(),
                        Some(Bson::Null) | None => "unspecified".to_string(),
                        Some(Bson::String(_)) => "unspecified".to_string(),
                        Some(other) => other.to_string(),
                    };
                    (key, count_of(bucket, "count"))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn count_of(doc: &BsonDoc, field: &str) -> u64 {
    match doc.get(field) {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) => n.max(0.0) as u64,
        _ => 0,
    }
}

/// Reduce the `$facet` result into stats
fn stats_from_facets(doc: &BsonDoc) -> QaStats {
    let first = |field: &str| {
        doc.get_array(field)
            .ok()
            .and_then(|arr| arr.first())
            .and_then(Bson::as_document)
            .cloned()
    };
    let total = first("total").map(|d| count_of(&d, "count")).unwrap_or(0);
    let total_marks = first("marks")
        .map(|d| match d.get("sum") {
            Some(Bson::Int32(n)) => i64::from(*n),
            Some(Bson::Int64(n)) => *n,
            Some(Bson::Double(n)) => *n as i64,
            _ => 0,
        })
        .unwrap_or(0);

    QaStats {
        total,
        total_marks,
        by_question_type: bucket_map(doc, "byQuestionType"),
        by_cognitive_process: bucket_map(doc, "byCognitiveProcess"),
        by_marks: bucket_map(doc, "byMarks"),
    }
}

pub struct QaService {
    db: MongoDb,
}

impl QaService {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    pub async fn list(&self, lesson_id: &str, query: &QaQuery, default_limit: u64) -> CatalogResult<QaPage> {
        let lesson = parse_oid("lessonId", lesson_id)?;
        let filter = qa_filter(lesson, query);
        let (limit, skip) = page_bounds(query, default_limit);

        let coll = self.db.collection::<Content>(collections::CONTENTS);
        let total = coll.count_documents(filter.clone(), None).await?;
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1, "_id": 1 })
            .skip(skip)
            .limit(limit as i64)
            .build();
        let docs: Vec<Content> = coll.find(filter, options).await?.try_collect().await?;

        Ok(QaPage {
            total,
            limit,
            skip,
            items: docs.into_iter().map(ContentInfo::from).collect(),
        })
    }

    /// Counts and distributions computed in a single `$facet` aggregation
    pub async fn stats(&self, lesson_id: &str) -> CatalogResult<QaStats> {
        let lesson = parse_oid("lessonId", lesson_id)?;
        let marks_as_int = doc! {
            "$convert": { "input": "$metadata.marks", "to": "int", "onError": 0, "onNull": 0 }
        };
        let pipeline = vec![
            doc! { "$match": { "lessonId": lesson, "type": ContentType::Qa.as_str() } },
            doc! { "$facet": {
                "total": [{ "$count": "count" }],
                "marks": [{ "$group": { "_id": Bson::Null, "sum": { "$sum": marks_as_int.clone() } } }],
                "byQuestionType": [
                    { "$group": { "_id": "$metadata.questionType", "count": { "$sum": 1 } } },
                    { "$sort": { "_id": 1 } },
                ],
                "byCognitiveProcess": [
                    { "$group": { "_id": "$metadata.cognitiveProcess", "count": { "$sum": 1 } } },
                    { "$sort": { "_id": 1 } },
                ],
                "byMarks": [
                    { "$group": { "_id": marks_as_int, "count": { "$sum": 1 } } },
                    { "$sort": { "_id": 1 } },
                ],
            }},
        ];

        let mut cursor = self
            .db
            .collection::<BsonDoc>(collections::CONTENTS)
            .aggregate(pipeline, None)
            .await?;
        Ok(match cursor.try_next().await? {
            Some(doc) => stats_from_facets(&doc),
            None => QaStats::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qa_filter_includes_requested_fields() {
        let lesson = ObjectId::new();
        let filter = qa_filter(
            lesson,
            &QaQuery {
                question_type: Some("short".into()),
                marks: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(filter.get_object_id("lessonId").unwrap(), lesson);
        assert_eq!(filter.get_str("type").unwrap(), "qa");
        assert_eq!(filter.get_str("metadata.questionType").unwrap(), "short");
        assert!(filter.get("metadata.cognitiveProcess").is_none());
        let marks = filter.get_document("metadata.marks").unwrap().get_array("$in").unwrap();
        assert!(marks.contains(&Bson::Int64(2)));
        assert!(matches!(&marks[1], Bson::RegularExpression(re) if re.pattern == marks_text_pattern(2)));
    }

    #[test]
    fn test_marks_text_pattern() {
        let re = regex::Regex::new(&marks_text_pattern(2)).unwrap();
        for text in ["2", "2 marks", " 2 Marks", "02"] {
            assert!(re.is_match(text), "{}", text);
        }
        for text in ["20 marks", "12", "2.5", "two"] {
            assert!(!re.is_match(text), "{}", text);
        }
    }

    #[test]
    fn test_page_bounds() {
        let q = |limit, skip| QaQuery { limit, skip, ..Default::default() };
        assert_eq!(page_bounds(&q(None, None), 50), (50, 0));
        assert_eq!(page_bounds(&q(Some(1000), Some(10)), 50), (QA_MAX_PAGE_LIMIT, 10));
        assert_eq!(page_bounds(&q(Some(0), None), 50), (50, 0));
    }

    #[test]
    fn test_stats_from_facets() {
        let facets = doc! {
            "total": [{ "count": 3 }],
            "marks": [{ "_id": Bson::Null, "sum": 7 }],
            "byQuestionType": [{ "_id": "short", "count": 2 }, { "_id": Bson::Null, "count": 1 }],
            "byCognitiveProcess": [],
            "byMarks": [{ "_id": 2, "count": 2 }, { "_id": 3, "count": 1 }],
        };
        let stats = stats_from_facets(&facets);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_marks, 7);
        assert_eq!(stats.by_question_type.get("short"), Some(&2));
        assert_eq!(stats.by_question_type.get("unspecified"), Some(&1));
        assert!(stats.by_cognitive_process.is_empty());
        assert_eq!(stats.by_marks.get("2"), Some(&2));

        assert_eq!(stats_from_facets(&doc! {}).total, 0);
    }
}
