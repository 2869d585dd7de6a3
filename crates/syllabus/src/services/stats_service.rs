//! Catalogue statistics for MongoDB

use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document as BsonDoc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::{collections, MongoDb};
use crate::error::CatalogResult;
use crate::models::Level;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub classes: u64,
    pub subjects: u64,
    pub units: u64,
    pub sub_units: u64,
    pub lessons: u64,
    pub contents: u64,
    pub users: u64,
    pub content_by_type: BTreeMap<String, u64>,
    pub total_views: i64,
}

pub struct StatsService {
    db: MongoDb,
}

impl StatsService {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    async fn count(&self, collection: &str) -> CatalogResult<u64> {
        Ok(self
            .db
            .collection::<BsonDoc>(collection)
            .estimated_document_count(None)
            .await?)
    }

    pub async fn overview(&self) -> CatalogResult<CatalogStats> {
        let mut stats = CatalogStats {
            classes: self.count(Level::Class.collection()).await?,
            subjects: self.count(Level::Subject.collection()).await?,
            units: self.count(Level::Unit.collection()).await?,
            sub_units: self.count(Level::SubUnit.collection()).await?,
            lessons: self.count(Level::Lesson.collection()).await?,
            contents: self.count(collections::CONTENTS).await?,
            users: self.count(collections::USERS).await?,
            ..Default::default()
        };

        let pipeline = vec![doc! { "$group": {
            "_id": "$type",
            "count": { "$sum": 1 },
            "views": { "$sum": { "$ifNull": ["$viewCount", 0] } },
        }}];
        let groups: Vec<BsonDoc> = self
            .db
            .collection::<BsonDoc>(collections::CONTENTS)
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        for group in groups {
            let kind = match group.get("_id") {
                Some(Bson::String(s)) => s.clone(),
                _ => "unknown".to_string(),
            };
            stats.content_by_type.insert(kind, as_i64(group.get("count")).max(0) as u64);
            stats.total_views += as_i64(group.get("views"));
        }

        Ok(stats)
    }
}

fn as_i64(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Double(n)) => *n as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_i64() {
        assert_eq!(as_i64(Some(&Bson::Int32(4))), 4);
        assert_eq!(as_i64(Some(&Bson::Double(2.0))), 2);
        assert_eq!(as_i64(Some(&Bson::String("3".into()))), 0);
        assert_eq!(as_i64(None), 0);
    }

    #[test]
    fn test_stats_shape() {
        let json = serde_json::to_value(CatalogStats::default()).unwrap();
        assert!(json.get("subUnits").is_some());
        assert!(json.get("contentByType").unwrap().is_object());
        assert_eq!(json["totalViews"], 0);
    }
}
