//! User management service for MongoDB

use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document as BsonDoc};
use mongodb::options::FindOptions;
use serde::Deserialize;

use crate::db::{collections, MongoDb};
use crate::error::{CatalogError, CatalogResult};
use crate::models::user::{ROLES, STATUSES};
use crate::models::{parse_oid, User};
use crate::security::{hash_password, is_hashed, validate_new_password, verify_password};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub can_edit: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub mobile_number: Option<String>,
    pub can_edit: Option<bool>,
    /// Administrative reset; hashed before storage
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
}

fn check_choice(field: &str, value: &str, allowed: &[&str]) -> CatalogResult<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(CatalogError::Validation(format!(
            "{} must be one of {}",
            field,
            allowed.join(", ")
        )))
    }
}

/// A supplied current password must match; only administrators may skip it.
fn check_current_password(current: Option<&str>, stored: &str, caller_is_admin: bool) -> CatalogResult<()> {
    match current {
        Some(current) if !verify_password(current, stored) => Err(CatalogError::Validation(
            "Current password is incorrect".to_string(),
        )),
        Some(_) => Ok(()),
        None if caller_is_admin => Ok(()),
        None => Err(CatalogError::Validation(
            "currentPassword is required".to_string(),
        )),
    }
}

pub struct UserService {
    db: MongoDb,
}

impl UserService {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    fn users(&self) -> mongodb::Collection<User> {
        self.db.collection(collections::USERS)
    }

    pub async fn list(&self, role: Option<&str>) -> CatalogResult<Vec<User>> {
        let mut filter = BsonDoc::new();
        if let Some(role) = role.filter(|r| !r.is_empty()) {
            filter.insert("role", role);
        }
        let options = FindOptions::builder().sort(doc! { "username": 1 }).build();
        Ok(self.users().find(filter, options).await?.try_collect().await?)
    }

    pub async fn get(&self, id: &str) -> CatalogResult<User> {
        let oid = parse_oid("id", id)?;
        self.users()
            .find_one(doc! { "_id": oid }, None)
            .await?
            .ok_or_else(|| CatalogError::UserNotFound(id.to_string()))
    }

    pub async fn find_by_username(&self, username: &str) -> CatalogResult<Option<User>> {
        Ok(self
            .users()
            .find_one(doc! { "username": username.trim() }, None)
            .await?)
    }

    pub async fn create(&self, request: CreateUserRequest) -> CatalogResult<User> {
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(CatalogError::Validation("username is required".to_string()));
        }
        validate_new_password(&request.password)?;
        let role = request.role.unwrap_or_else(|| "student".to_string());
        check_choice("role", &role, ROLES)?;
        let status = request.status.unwrap_or_else(|| "active".to_string());
        check_choice("status", &status, STATUSES)?;

        if self.find_by_username(&username).await?.is_some() {
            return Err(CatalogError::UsernameTaken(username));
        }

        let now = Utc::now();
        let mut user = User {
            id: None,
            username,
            password: hash_password(&request.password)?,
            name: request.name,
            email: request.email,
            role,
            status,
            is_first_login: true,
            mobile_number: request.mobile_number,
            can_edit: request.can_edit,
            created_at: now,
            updated_at: now,
        };
        let result = self.users().insert_one(&user, None).await.map_err(|e| {
            // The unique index catches races between the lookup and the insert
            if e.to_string().contains("E11000") {
                CatalogError::UsernameTaken(user.username.clone())
            } else {
                e.into()
            }
        })?;
        user.id = result.inserted_id.as_object_id();
        tracing::info!("Created user {} ({})", user.username, user.role);
        Ok(user)
    }

    pub async fn update(&self, id: &str, request: UpdateUserRequest) -> CatalogResult<User> {
        let oid = parse_oid("id", id)?;
        let mut set_doc = doc! { "updatedAt": bson::DateTime::from_chrono(Utc::now()) };
        if let Some(name) = request.name {
            set_doc.insert("name", name);
        }
        if let Some(email) = request.email {
            set_doc.insert("email", email);
        }
        if let Some(role) = request.role {
            check_choice("role", &role, ROLES)?;
            set_doc.insert("role", role);
        }
        if let Some(status) = request.status {
            check_choice("status", &status, STATUSES)?;
            set_doc.insert("status", status);
        }
        if let Some(mobile) = request.mobile_number {
            set_doc.insert("mobileNumber", mobile);
        }
        if let Some(can_edit) = request.can_edit {
            set_doc.insert("canEdit", can_edit);
        }
        if let Some(password) = request.password {
            validate_new_password(&password)?;
            set_doc.insert("password", hash_password(&password)?);
            set_doc.insert("isFirstLogin", true);
        }

        let result = self
            .users()
            .update_one(doc! { "_id": oid }, doc! { "$set": set_doc }, None)
            .await?;
        if result.matched_count == 0 {
            return Err(CatalogError::UserNotFound(id.to_string()));
        }
        self.get(id).await
    }

    pub async fn update_profile(&self, id: &str, request: UpdateProfileRequest) -> CatalogResult<User> {
        self.update(
            id,
            UpdateUserRequest {
                name: request.name,
                email: request.email,
                mobile_number: request.mobile_number,
                ..Default::default()
            },
        )
        .await
    }

    /// Change a user's password. Administrators resetting someone's
    /// password may omit `current_password`; everyone else must supply it.
    pub async fn change_password(
        &self,
        id: &str,
        request: ChangePasswordRequest,
        caller_is_admin: bool,
    ) -> CatalogResult<()> {
        let user = self.get(id).await?;
        check_current_password(
            request.current_password.as_deref(),
            &user.password,
            caller_is_admin,
        )?;
        validate_new_password(&request.new_password)?;

        self.users()
            .update_one(
                doc! { "_id": user.id },
                doc! { "$set": {
                    "password": hash_password(&request.new_password)?,
                    "isFirstLogin": false,
                    "updatedAt": bson::DateTime::from_chrono(Utc::now()),
                }},
                None,
            )
            .await?;
        tracing::info!("Password changed for user {}", user.username);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let oid = parse_oid("id", id)?;
        let result = self.users().delete_one(doc! { "_id": oid }, None).await?;
        if result.deleted_count == 0 {
            return Err(CatalogError::UserNotFound(id.to_string()));
        }
        self.db
            .collection::<BsonDoc>(collections::SESSIONS)
            .delete_many(doc! { "principalId": oid.to_hex() }, None)
            .await?;
        Ok(())
    }

    /// Check credentials. Plaintext passwords left over from imported data
    /// are replaced by a hash on the first successful login.
    pub async fn authenticate(&self, username: &str, password: &str) -> CatalogResult<User> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or(CatalogError::InvalidCredentials)?;
        if !verify_password(password, &user.password) {
            return Err(CatalogError::InvalidCredentials);
        }
        if !user.is_active() {
            return Err(CatalogError::AccountInactive);
        }

        if !is_hashed(&user.password) {
            match hash_password(password) {
                Ok(hash) => {
                    if let Err(e) = self
                        .users()
                        .update_one(doc! { "_id": user.id }, doc! { "$set": { "password": hash } }, None)
                        .await
                    {
                        tracing::warn!("Failed to upgrade password hash for {}: {}", user.username, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to hash legacy password: {}", e),
            }
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_choice() {
        assert!(check_choice("role", "teacher", ROLES).is_ok());
        let err = check_choice("role", "owner", ROLES).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("admin, teacher, student"));
    }

    #[test]
    fn test_current_password_rules() {
        let stored = hash_password("old-secret").unwrap();

        assert!(check_current_password(Some("old-secret"), &stored, false).is_ok());
        let err = check_current_password(Some("guess"), &stored, false).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        let err = check_current_password(None, &stored, false).unwrap_err();
        assert!(err.to_string().contains("currentPassword"));

        assert!(check_current_password(None, &stored, true).is_ok());
        assert!(check_current_password(Some("guess"), &stored, true).is_err());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"username": "ravi", "password": "secret1"}"#).unwrap();
        assert!(req.role.is_none());
        assert!(!req.can_edit);
        assert!(req.name.is_empty());
    }
}
