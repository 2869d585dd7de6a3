//! Authentication service: user and webmaster logins, token resolution

use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use syllabus::db::collections;
use syllabus::models::{parse_oid, UserInfo, Webmaster, WebmasterInfo};
use syllabus::security::{hash_password, is_hashed, verify_password};
use syllabus::services::UserService;
use syllabus::{AuthenticatedPrincipal, CatalogError, CatalogResult, MongoDb, PrincipalKind};
use tracing::{info, warn};

use super::session::{SessionDoc, SessionService};

/// Login request shared by both login paths
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Trimmed username and raw password; both must be present
    pub fn credentials(&self) -> CatalogResult<(&str, &str)> {
        let username = self.username.as_deref().map(str::trim).unwrap_or_default();
        let password = self.password.as_deref().unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            return Err(CatalogError::Validation(
                "username and password are required".to_string(),
            ));
        }
        Ok((username, password))
    }
}

#[derive(Debug, Serialize)]
pub struct UserLoginResponse {
    pub user: UserInfo,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct WebmasterLoginResponse {
    pub webmaster: WebmasterInfo,
    pub token: String,
}

/// Current principal with its account record
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub kind: PrincipalKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webmaster: Option<WebmasterInfo>,
}

pub struct AuthService {
    db: Arc<MongoDb>,
    sessions: SessionService,
}

impl AuthService {
    pub fn new(db: Arc<MongoDb>, session_ttl_hours: u32) -> Self {
        let sessions = SessionService::new(db.clone(), session_ttl_hours);
        Self { db, sessions }
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    fn users(&self) -> UserService {
        UserService::new((*self.db).clone())
    }

    fn webmasters(&self) -> mongodb::Collection<Webmaster> {
        self.db.collection(collections::WEBMASTERS)
    }

    pub async fn login(&self, request: &LoginRequest) -> CatalogResult<UserLoginResponse> {
        let (username, password) = request.credentials()?;
        let user = self.users().authenticate(username, password).await?;
        let principal = AuthenticatedPrincipal {
            kind: PrincipalKind::User,
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            role: user.role.clone(),
        };
        let token = self.sessions.create(&principal).await?;
        info!("User {} logged in", user.username);

        Ok(UserLoginResponse {
            user: user.into(),
            token,
        })
    }

    pub async fn webmaster_login(
        &self,
        request: &LoginRequest,
    ) -> CatalogResult<WebmasterLoginResponse> {
        let (username, password) = request.credentials()?;
        let webmaster = self
            .webmasters()
            .find_one(doc! { "username": username }, None)
            .await?
            .ok_or(CatalogError::InvalidCredentials)?;
        if !verify_password(password, &webmaster.password) {
            return Err(CatalogError::InvalidCredentials);
        }
        if !is_hashed(&webmaster.password) {
            self.upgrade_webmaster_password(&webmaster, password).await;
        }

        let principal = AuthenticatedPrincipal {
            kind: PrincipalKind::Webmaster,
            id: webmaster.id.map(|id| id.to_hex()).unwrap_or_default(),
            role: "webmaster".to_string(),
        };
        let token = self.sessions.create(&principal).await?;
        info!("Webmaster {} logged in", webmaster.username);

        Ok(WebmasterLoginResponse {
            webmaster: webmaster.into(),
            token,
        })
    }

    async fn upgrade_webmaster_password(&self, webmaster: &Webmaster, password: &str) {
        let hash = match hash_password(password) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Failed to hash legacy webmaster password: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .webmasters()
            .update_one(
                doc! { "_id": webmaster.id },
                doc! { "$set": { "password": hash } },
                None,
            )
            .await
        {
            warn!("Failed to upgrade webmaster password hash: {}", e);
        }
    }

    /// Resolve a bearer token into its session. User sessions are dropped
    /// once the account is deleted or deactivated, and pick up role changes.
    pub async fn resolve(&self, token: &str) -> CatalogResult<Option<(SessionDoc, AuthenticatedPrincipal)>> {
        let Some(session) = self.sessions.validate(token).await? else {
            return Ok(None);
        };
        let mut principal = session.principal();

        if principal.kind == PrincipalKind::User {
            match self.users().get(&principal.id).await {
                Ok(user) if user.is_active() => principal.role = user.role,
                Ok(_) | Err(CatalogError::UserNotFound(_)) | Err(CatalogError::InvalidId { .. }) => {
                    self.sessions.delete(token).await?;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Some((session, principal)))
    }

    pub async fn me(&self, principal: &AuthenticatedPrincipal) -> CatalogResult<MeResponse> {
        match principal.kind {
            PrincipalKind::User => {
                let user = self.users().get(&principal.id).await?;
                Ok(MeResponse {
                    kind: PrincipalKind::User,
                    user: Some(user.into()),
                    webmaster: None,
                })
            }
            PrincipalKind::Webmaster => {
                let oid = parse_oid("webmasterId", &principal.id)?;
                let webmaster = self
                    .webmasters()
                    .find_one(doc! { "_id": oid }, None)
                    .await?
                    .ok_or(CatalogError::Unauthorized)?;
                Ok(MeResponse {
                    kind: PrincipalKind::Webmaster,
                    user: None,
                    webmaster: Some(webmaster.into()),
                })
            }
        }
    }

    /// Create the configured webmaster, or reset its password if it changed
    pub async fn seed_webmaster(&self, username: &str, password: &str) -> CatalogResult<()> {
        let existing = self
            .webmasters()
            .find_one(doc! { "username": username }, None)
            .await?;

        match existing {
            Some(w) if is_hashed(&w.password) && verify_password(password, &w.password) => {
                info!("Webmaster {} already configured", username);
            }
            Some(w) => {
                self.webmasters()
                    .update_one(
                        doc! { "_id": w.id },
                        doc! { "$set": { "password": hash_password(password)? } },
                        None,
                    )
                    .await?;
                if let Some(id) = w.id {
                    self.sessions.delete_for_principal(&id.to_hex()).await?;
                }
                info!("Webmaster {} password updated", username);
            }
            None => {
                let webmaster = Webmaster {
                    id: None,
                    username: username.to_string(),
                    password: hash_password(password)?,
                    created_at: chrono::Utc::now(),
                };
                self.webmasters().insert_one(&webmaster, None).await?;
                info!("Webmaster {} created", username);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_both_fields() {
        let req = LoginRequest {
            username: Some("  asha ".into()),
            password: Some("secret1".into()),
        };
        assert_eq!(req.credentials().unwrap(), ("asha", "secret1"));

        let missing = LoginRequest {
            username: Some("asha".into()),
            password: None,
        };
        let err = missing.credentials().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let blank = LoginRequest {
            username: Some("   ".into()),
            password: Some("x".into()),
        };
        assert!(blank.credentials().is_err());
    }

    #[test]
    fn test_me_response_shape() {
        let me = MeResponse {
            kind: PrincipalKind::Webmaster,
            user: None,
            webmaster: Some(WebmasterInfo {
                id: "65a1f0c2e4b0a1b2c3d4e5f6".into(),
                username: "root".into(),
                role: "webmaster",
            }),
        };
        let json = serde_json::to_value(me).unwrap();
        assert_eq!(json["kind"], "webmaster");
        assert!(json.get("user").is_none());
        assert_eq!(json["webmaster"]["role"], "webmaster");
    }
}
