//! Catalogue configuration module

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const MIB: u64 = 1024 * 1024;

/// Catalogue feature configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Root directory of the uploads tree
    #[serde(default = "default_upload_root")]
    pub upload_root: PathBuf,

    /// Maximum size of a single multipart upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Inline body ceiling for file-like content types (base64 data URLs)
    #[serde(default = "default_inline_file_limit")]
    pub inline_file_limit_bytes: usize,

    /// Inline body ceiling for any content, kept under the 16 MiB BSON document cap
    #[serde(default = "default_inline_body_limit")]
    pub inline_body_limit_bytes: usize,

    /// Request body limit for JSON content routes
    #[serde(default = "default_max_json_body")]
    pub max_json_body_bytes: usize,

    /// Default page size for Q&A listings
    #[serde(default = "default_qa_page_limit")]
    pub qa_page_limit: u64,
}

fn default_upload_root() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_upload_bytes() -> u64 {
    500 * MIB
}

fn default_inline_file_limit() -> usize {
    (12 * MIB) as usize
}

fn default_inline_body_limit() -> usize {
    (15 * MIB) as usize
}

fn default_max_json_body() -> usize {
    (20 * MIB) as usize
}

fn default_qa_page_limit() -> u64 {
    50
}

/// Hard ceiling for Q&A page sizes
pub const QA_MAX_PAGE_LIMIT: u64 = 200;

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            max_upload_bytes: default_max_upload_bytes(),
            inline_file_limit_bytes: default_inline_file_limit(),
            inline_body_limit_bytes: default_inline_body_limit(),
            max_json_body_bytes: default_max_json_body(),
            qa_page_limit: default_qa_page_limit(),
        }
    }
}

impl CatalogConfig {
    /// Create a new catalogue config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.upload_root = root.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Staging directory for in-flight uploads
    pub fn temp_dir(&self) -> PathBuf {
        self.upload_root.join(".tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: CatalogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.inline_file_limit_bytes, 12 * 1024 * 1024);
        assert!(config.inline_body_limit_bytes < 16 * 1024 * 1024);
        assert!(config.max_json_body_bytes > config.inline_body_limit_bytes);
        assert_eq!(config.temp_dir(), PathBuf::from("./uploads/.tmp"));
    }
}
