//! Session management service
//!
//! A session binds the digest of a bearer token to a principal. The token
//! itself is only ever held by the client.

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use syllabus::db::collections;
use syllabus::security::{generate_token, hash_token, token_kind};
use syllabus::{AuthenticatedPrincipal, CatalogResult, MongoDb, PrincipalKind};

/// Session document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token_hash: String,
    pub principal_kind: PrincipalKind,
    pub principal_id: String,
    pub role: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl SessionDoc {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether the remaining lifetime has dropped below `window`
    pub fn needs_renewal(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at - now < window
    }

    pub fn principal(&self) -> AuthenticatedPrincipal {
        AuthenticatedPrincipal {
            kind: self.principal_kind,
            id: self.principal_id.clone(),
            role: self.role.clone(),
        }
    }
}

/// Session service (MongoDB)
#[derive(Clone)]
pub struct SessionService {
    db: Arc<MongoDb>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(db: Arc<MongoDb>, ttl_hours: u32) -> Self {
        Self {
            db,
            ttl: Duration::hours(i64::from(ttl_hours.max(1))),
        }
    }

    fn sessions(&self) -> mongodb::Collection<SessionDoc> {
        self.db.collection(collections::SESSIONS)
    }

    /// Open a session and return the bearer token for it
    pub async fn create(&self, principal: &AuthenticatedPrincipal) -> CatalogResult<String> {
        let token = generate_token(principal.kind);
        let now = Utc::now();
        let session = SessionDoc {
            id: None,
            token_hash: hash_token(&token),
            principal_kind: principal.kind,
            principal_id: principal.id.clone(),
            role: principal.role.clone(),
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions().insert_one(&session, None).await?;
        Ok(token)
    }

    /// Look up the live session for a token. Expired sessions are removed.
    pub async fn validate(&self, token: &str) -> CatalogResult<Option<SessionDoc>> {
        let Some(kind) = token_kind(token) else {
            return Ok(None);
        };
        let token_hash = hash_token(token);
        let session = self
            .sessions()
            .find_one(doc! { "tokenHash": &token_hash }, None)
            .await?;

        match session {
            Some(s) if s.principal_kind != kind => Ok(None),
            Some(s) if s.is_expired(Utc::now()) => {
                self.sessions()
                    .delete_one(doc! { "tokenHash": &token_hash }, None)
                    .await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Delete a session (logout). Returns whether one existed.
    pub async fn delete(&self, token: &str) -> CatalogResult<bool> {
        let result = self
            .sessions()
            .delete_one(doc! { "tokenHash": hash_token(token) }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    /// Push the expiry out by a full lifetime if it is inside the sliding window
    pub async fn try_extend(&self, session: &SessionDoc, window_hours: u32) -> CatalogResult<()> {
        let now = Utc::now();
        if !session.needs_renewal(now, Duration::hours(i64::from(window_hours))) {
            return Ok(());
        }
        self.sessions()
            .update_one(
                doc! { "tokenHash": &session.token_hash },
                doc! { "$set": { "expiresAt": bson::DateTime::from_chrono(now + self.ttl) } },
                None,
            )
            .await?;
        tracing::debug!("Renewed session for {}", session.principal_id);
        Ok(())
    }

    /// Delete all sessions for a principal
    pub async fn delete_for_principal(&self, principal_id: &str) -> CatalogResult<u64> {
        let result = self
            .sessions()
            .delete_many(doc! { "principalId": principal_id }, None)
            .await?;
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_in: Duration) -> SessionDoc {
        let now = Utc::now();
        SessionDoc {
            id: None,
            token_hash: hash_token("mock-token-abc"),
            principal_kind: PrincipalKind::User,
            principal_id: "65a1f0c2e4b0a1b2c3d4e5f6".into(),
            role: "teacher".into(),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn test_expiry_and_renewal_window() {
        let now = Utc::now();
        let fresh = session(Duration::hours(100));
        assert!(!fresh.is_expired(now));
        assert!(!fresh.needs_renewal(now, Duration::hours(24)));

        let ageing = session(Duration::hours(3));
        assert!(ageing.needs_renewal(now, Duration::hours(24)));

        let stale = session(Duration::hours(-1));
        assert!(stale.is_expired(now));
    }

    #[test]
    fn test_session_doc_uses_camel_case_fields() {
        let doc = bson::to_document(&session(Duration::hours(1))).unwrap();
        assert!(doc.contains_key("tokenHash"));
        assert_eq!(doc.get_str("principalKind").unwrap(), "user");
        assert!(doc.get_datetime("expiresAt").is_ok());
        assert!(!doc.contains_key("_id"));

        let principal = session(Duration::hours(1)).principal();
        assert_eq!(principal.role, "teacher");
        assert!(!principal.is_administrator());
    }
}
