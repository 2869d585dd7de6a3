//! Configuration management for the catalogue server

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use syllabus::CatalogConfig;

const MIB: u64 = 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// MongoDB connection string (default: mongodb://localhost:27017)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Database name (default: syllabus)
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Root of the uploads tree
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,

    /// Maximum multipart upload size in MiB (default: 500)
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,

    /// Session lifetime in hours (default: 168)
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,

    /// Session sliding window in hours - renew if remaining < this (default: 24)
    #[serde(default = "default_session_sliding_window_hours")]
    pub session_sliding_window_hours: u32,

    /// Reject anonymous mutations and non-admin account management
    #[serde(default)]
    pub enforce_auth: bool,

    /// CORS allowed origins (comma-separated). If empty, any origin is allowed.
    pub cors_allowed_origins: Option<String>,

    /// Webmaster account seeded at startup when both are set
    pub webmaster_username: Option<String>,
    pub webmaster_password: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "syllabus".to_string()
}

fn default_upload_root() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_upload_mb() -> u64 {
    500
}

fn default_session_ttl_hours() -> u32 {
    168
}

fn default_session_sliding_window_hours() -> u32 {
    24
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SYLLABUS_HOST").unwrap_or_else(|_| default_host());
        let port = env_parse("SYLLABUS_PORT").unwrap_or_else(default_port);
        let database_url = std::env::var("MONGODB_URI")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| default_database_url());
        let database_name =
            std::env::var("MONGODB_DATABASE").unwrap_or_else(|_| default_database_name());
        let upload_root = std::env::var("UPLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_upload_root());
        let max_upload_mb = env_parse("MAX_UPLOAD_MB").unwrap_or_else(default_max_upload_mb);
        if max_upload_mb == 0 {
            anyhow::bail!("MAX_UPLOAD_MB must be greater than zero");
        }
        let session_ttl_hours =
            env_parse("SESSION_TTL_HOURS").unwrap_or_else(default_session_ttl_hours);
        let session_sliding_window_hours = env_parse("SESSION_SLIDING_WINDOW_HOURS")
            .unwrap_or_else(default_session_sliding_window_hours);

        Ok(Self {
            host,
            port,
            database_url,
            database_name,
            upload_root,
            max_upload_mb,
            session_ttl_hours,
            session_sliding_window_hours,
            enforce_auth: env_flag("ENFORCE_AUTH"),
            cors_allowed_origins: env_non_empty("CORS_ALLOWED_ORIGINS"),
            webmaster_username: env_non_empty("WEBMASTER_USERNAME"),
            webmaster_password: env_non_empty("WEBMASTER_PASSWORD"),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Catalogue settings derived from the server configuration
    pub fn catalog(&self) -> CatalogConfig {
        CatalogConfig::new()
            .with_upload_root(self.upload_root.clone())
            .with_max_upload_bytes(self.max_upload_mb.saturating_mul(MIB))
    }

    /// Origins for the CORS layer; `None` means any origin
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_allowed_origins
            .as_deref()?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        (!origins.is_empty()).then_some(origins)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            database_name: default_database_name(),
            upload_root: default_upload_root(),
            max_upload_mb: default_max_upload_mb(),
            session_ttl_hours: default_session_ttl_hours(),
            session_sliding_window_hours: default_session_sliding_window_hours(),
            enforce_auth: false,
            cors_allowed_origins: None,
            webmaster_username: None,
            webmaster_password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8088\nenforce_auth = true\nmax_upload_mb = 10").unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port, 8088);
        assert!(config.enforce_auth);
        assert_eq!(config.database_name, "syllabus");
        assert_eq!(config.catalog().max_upload_bytes, 10 * MIB);
        assert_eq!(config.catalog().upload_root, PathBuf::from("./uploads"));
    }

    #[test]
    fn test_cors_origins() {
        let mut config = Config::default();
        assert!(config.cors_origins().is_none());

        config.cors_allowed_origins = Some("http://a.test, ,http://b.test".into());
        assert_eq!(
            config.cors_origins().unwrap(),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );

        config.cors_allowed_origins = Some(" , ".into());
        assert!(config.cors_origins().is_none());
    }
}
