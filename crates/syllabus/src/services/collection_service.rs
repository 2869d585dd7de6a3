//! Raw collection export/import for administrators
//!
//! Documents travel as relaxed extended JSON so ids and dates survive a
//! round trip through the browser.

use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document as BsonDoc};
use serde::Serialize;

use crate::db::{collections, MongoDb};
use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    pub count: u64,
}

/// Name of a managed collection, or 404
pub fn managed_collection(name: &str) -> CatalogResult<&'static str> {
    collections::MANAGED
        .iter()
        .find(|managed| managed.eq_ignore_ascii_case(name.trim()))
        .copied()
        .ok_or_else(|| CatalogError::CollectionNotFound(name.to_string()))
}

/// Convert an imported JSON array into BSON documents
pub fn documents_from_json(collection: &str, value: serde_json::Value) -> CatalogResult<Vec<BsonDoc>> {
    let serde_json::Value::Array(items) = value else {
        return Err(CatalogError::Validation(
            "import body must be a JSON array".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let bson = Bson::try_from(item).map_err(|e| {
                CatalogError::Validation(format!("document {} is not valid extended JSON: {}", index, e))
            })?;
            let Bson::Document(mut document) = bson else {
                return Err(CatalogError::Validation(format!(
                    "document {} is not an object",
                    index
                )));
            };
            if collection == collections::CONTENTS && !document.contains_key("metadata") {
                document.insert("metadata", BsonDoc::new());
            }
            Ok(document)
        })
        .collect()
}

pub struct CollectionService {
    db: MongoDb,
}

impl CollectionService {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    fn raw(&self, name: &str) -> mongodb::Collection<BsonDoc> {
        self.db.collection(name)
    }

    pub async fn list(&self) -> CatalogResult<Vec<CollectionSummary>> {
        let mut summaries = Vec::with_capacity(collections::MANAGED.len());
        for name in collections::MANAGED {
            let count = self.raw(name).count_documents(doc! {}, None).await?;
            summaries.push(CollectionSummary {
                name: name.to_string(),
                count,
            });
        }
        Ok(summaries)
    }

    pub async fn export(&self, name: &str) -> CatalogResult<Vec<serde_json::Value>> {
        let name = managed_collection(name)?;
        let docs: Vec<BsonDoc> = self.raw(name).find(doc! {}, None).await?.try_collect().await?;
        Ok(docs
            .into_iter()
            .map(|d| Bson::Document(d).into_relaxed_extjson())
            .collect())
    }

    /// Insert documents, clearing the collection first when `replace` is set
    pub async fn import(&self, name: &str, body: serde_json::Value, replace: bool) -> CatalogResult<u64> {
        let name = managed_collection(name)?;
        let documents = documents_from_json(name, body)?;

        if replace {
            let cleared = self.raw(name).delete_many(doc! {}, None).await?;
            tracing::info!("Cleared {} documents from {} before import", cleared.deleted_count, name);
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let result = self.raw(name).insert_many(documents, None).await?;
        let inserted = result.inserted_ids.len() as u64;
        tracing::info!("Imported {} documents into {}", inserted, name);
        Ok(inserted)
    }

    pub async fn clear(&self, name: &str) -> CatalogResult<u64> {
        let name = managed_collection(name)?;
        let result = self.raw(name).delete_many(doc! {}, None).await?;
        tracing::info!("Cleared {} documents from {}", result.deleted_count, name);
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_collection_whitelist() {
        assert_eq!(managed_collection("contents").unwrap(), "contents");
        assert_eq!(managed_collection("SubUnits").unwrap(), "subunits");
        assert_eq!(managed_collection("sessions").unwrap_err().code(), "COLLECTION_NOT_FOUND");
        assert!(managed_collection("system.users").is_err());
    }

    #[test]
    fn test_documents_from_extended_json() {
        let docs = documents_from_json(
            "contents",
            serde_json::json!([{
                "_id": { "$oid": "65a1f0c2e4b0a1b2c3d4e5f6" },
                "lessonId": { "$oid": "65a1f0c2e4b0a1b2c3d4e5f7" },
                "type": "notes",
                "title": "Intro",
                "createdAt": { "$date": "2024-01-12T10:00:00Z" }
            }]),
        )
        .unwrap();

        assert_eq!(docs.len(), 1);
        assert!(docs[0].get_object_id("_id").is_ok());
        assert!(docs[0].get_datetime("createdAt").is_ok());
        assert!(docs[0].get_document("metadata").unwrap().is_empty());
    }

    #[test]
    fn test_documents_from_json_rejects_non_arrays() {
        assert!(documents_from_json("users", serde_json::json!({"a": 1})).is_err());
        assert!(documents_from_json("users", serde_json::json!([1])).is_err());
    }
}
