//! User and webmaster models for MongoDB

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::common::bson_datetime_or_now;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    /// Argon2 PHC string; accounts imported from older data may hold plaintext
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub is_first_login: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default = "Utc::now", with = "bson_datetime_or_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "bson_datetime_or_now")]
    pub updated_at: DateTime<Utc>,
}

fn default_role() -> String {
    "student".to_string()
}

fn default_status() -> String {
    "active".to_string()
}

pub const ROLES: &[&str] = &["admin", "teacher", "student"];
pub const STATUSES: &[&str] = &["active", "inactive"];

impl User {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// User response (for API), never carries the password
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub status: String,
    pub is_first_login: bool,
    pub mobile_number: Option<String>,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(u: User) -> Self {
        Self {
            id: u.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: u.username,
            name: u.name,
            email: u.email,
            role: u.role,
            status: u.status,
            is_first_login: u.is_first_login,
            mobile_number: u.mobile_number,
            can_edit: u.can_edit,
            created_at: u.created_at,
        }
    }
}

/// Webmaster entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webmaster {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub password: String,
    #[serde(default = "Utc::now", with = "bson_datetime_or_now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebmasterInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub role: &'static str,
}

impl From<Webmaster> for WebmasterInfo {
    fn from(w: Webmaster) -> Self {
        Self {
            id: w.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: w.username,
            role: "webmaster",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_strips_password() {
        let user: User = serde_json::from_value(serde_json::json!({
            "username": "asha",
            "password": "secret",
            "name": "Asha",
            "role": "teacher",
        }))
        .unwrap();
        assert!(user.is_active());

        let json = serde_json::to_value(UserInfo::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "teacher");
        assert_eq!(json["isFirstLogin"], false);
    }
}
