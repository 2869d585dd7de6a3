//! Common types and shared serde helpers for MongoDB models

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Deserializer};

use crate::error::{CatalogError, CatalogResult};

/// Parse a hex object id supplied by a client, naming the offending field on failure
pub fn parse_oid(field: &str, value: &str) -> CatalogResult<ObjectId> {
    ObjectId::parse_str(value.trim()).map_err(|_| CatalogError::InvalidId {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Serde helper for `DateTime<Utc>` stored as BSON datetime, tolerating
/// documents written before timestamps existed.
pub mod bson_datetime_or_now {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bson::serde_helpers::chrono_datetime_as_bson_datetime::serialize(date, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()).unwrap_or_else(Utc::now))
    }
}

/// Accept a count that may have been stored as an integer, a double, or a
/// numeric string ("2", "2 marks").
pub fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let raw: Option<Raw> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(Raw::Int(n)) if n >= 0 => u32::try_from(n).ok(),
        Some(Raw::Float(f)) if f >= 0.0 && f.fract() == 0.0 => Some(f as u32),
        Some(Raw::Text(s)) => s
            .split_whitespace()
            .next()
            .and_then(|first| first.parse::<u32>().ok()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Marks {
        #[serde(default, deserialize_with = "lenient_u32")]
        marks: Option<u32>,
    }

    #[test]
    fn test_lenient_marks() {
        let parse = |s: &str| serde_json::from_str::<Marks>(s).unwrap().marks;
        assert_eq!(parse(r#"{"marks": 3}"#), Some(3));
        assert_eq!(parse(r#"{"marks": 5.0}"#), Some(5));
        assert_eq!(parse(r#"{"marks": "2 marks"}"#), Some(2));
        assert_eq!(parse(r#"{"marks": "many"}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }

    #[test]
    fn test_parse_oid_names_field() {
        let err = parse_oid("lessonId", "not-an-id").unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
        assert!(err.to_string().contains("lessonId"));
        assert!(parse_oid("lessonId", "65a1f0c2e4b0a1b2c3d4e5f6").is_ok());
    }
}
