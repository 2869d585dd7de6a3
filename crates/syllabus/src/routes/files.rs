//! File routes - flat uploads directory and range-aware streaming

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::error::{CatalogError, CatalogResult};
use crate::models::Content;
use crate::services::storage::{is_safe_file_name, mime_type_for, remove_file_best_effort};
use crate::services::ContentService;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResponse {
    pub message: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

pub fn file_routes() -> Router<Arc<AppState>> {
    Router::new().route("/files/{filename}", get(get_file).delete(delete_file))
}

/// Parse a `Range` header into an inclusive byte range
///
/// Supports:
/// - bytes=0-1023 (explicit range, end clamped to the file)
/// - bytes=1024- (to the end)
/// - bytes=-1024 (last 1024 bytes)
pub fn parse_range_header(range: &str, file_size: u64) -> Option<(u64, u64)> {
    let ranges = range.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        (false, false) => {
            let start: u64 = start.parse().ok()?;
            let end: u64 = end.parse().ok()?;
            if start > end || start >= file_size {
                return None;
            }
            Some((start, end.min(file_size - 1)))
        }
        (false, true) => {
            let start: u64 = start.parse().ok()?;
            if start >= file_size {
                return None;
            }
            Some((start, file_size - 1))
        }
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if file_size == 0 || suffix == 0 {
                return None;
            }
            Some((file_size.saturating_sub(suffix), file_size - 1))
        }
        (true, true) => None,
    }
}

/// Stream a file, honouring a single `Range` request
pub async fn serve_file(path: &FsPath, headers: &HeaderMap) -> CatalogResult<Response> {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CatalogError::FileNotFound(file_label(path)));
        }
        Err(e) => return Err(e.into()),
    };
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(CatalogError::FileNotFound(file_label(path)));
    }
    let file_size = metadata.len();
    let content_type = mime_type_for(path);

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(|r| parse_range_header(r, file_size));

    let response = match range {
        None => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, file_size)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(ReaderStream::new(file))),
        Some(Some((start, end))) => {
            let length = end - start + 1;
            file.seek(SeekFrom::Start(start)).await?;
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, file_size),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::from_stream(ReaderStream::new(file.take(length))))
        }
        Some(None) => Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{}", file_size))
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::empty()),
    };

    response.map_err(|e| CatalogError::Internal(e.to_string()))
}

fn file_label(path: &FsPath) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Where a requested file lives: the flat uploads root first, then the
/// hierarchical location recorded on the content that stored it.
async fn locate(state: &AppState, filename: &str) -> CatalogResult<(PathBuf, Option<Content>)> {
    if !is_safe_file_name(filename) {
        return Err(CatalogError::Validation(format!("Invalid file name: {}", filename)));
    }

    let service = ContentService::new((*state.db).clone(), (*state.config).clone());
    let content = service.find_by_stored_file_name(filename).await?;

    let flat = state.config.upload_root.join(filename);
    if tokio::fs::metadata(&flat).await.map(|m| m.is_file()).unwrap_or(false) {
        return Ok((flat, content));
    }
    match content.as_ref().and_then(|c| c.file_path.clone()) {
        Some(path) => Ok((PathBuf::from(path), content)),
        None => Err(CatalogError::FileNotFound(filename.to_string())),
    }
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> CatalogResult<Response> {
    let (path, _) = locate(&state, &filename).await?;
    let mut response = serve_file(&path, &headers).await?;
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    Ok(response)
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> CatalogResult<impl IntoResponse> {
    let (path, content) = locate(&state, &filename).await?;
    if !remove_file_best_effort(&path).await {
        return Err(CatalogError::FileNotFound(filename));
    }

    let content_id = content.and_then(|c| c.id);
    if let Some(id) = content_id {
        ContentService::new((*state.db).clone(), (*state.config).clone())
            .clear_file_path(id)
            .await?;
    }
    tracing::info!("Deleted file {:?}", path);

    Ok(Json(DeleteFileResponse {
        message: "File deleted".to_string(),
        filename,
        content_id: content_id.map(|id| id.to_hex()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header() {
        assert_eq!(parse_range_header("bytes=0-1023", 10000), Some((0, 1023)));
        assert_eq!(parse_range_header("bytes=1024-", 10000), Some((1024, 9999)));
        assert_eq!(parse_range_header("bytes=-1024", 10000), Some((8976, 9999)));
        assert_eq!(parse_range_header("bytes=0-20000", 10000), Some((0, 9999)));
        assert_eq!(parse_range_header("bytes=20000-30000", 10000), None);
        assert_eq!(parse_range_header("bytes=abc-def", 10000), None);
        assert_eq!(parse_range_header("bytes=-0", 10000), None);
        assert_eq!(parse_range_header("items=0-1", 10000), None);
        assert_eq!(parse_range_header("bytes=0-", 0), None);
    }

    async fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lecture.mp3");
        let bytes: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &bytes).await.unwrap();
        (dir, path)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_serve_partial_content() {
        let (_dir, path) = fixture().await;
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-99"));

        let response = serve_file(&path, &headers).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
        let body = body_bytes(response).await;
        assert_eq!(body.len(), 100);
        assert_eq!(body[99], 99);
    }

    #[tokio::test]
    async fn test_serve_suffix_range() {
        let (_dir, path) = fixture().await;
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=-10"));

        let response = serve_file(&path, &headers).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 990-999/1000");
        assert_eq!(body_bytes(response).await.len(), 10);
    }

    #[tokio::test]
    async fn test_serve_whole_file_and_unsatisfiable() {
        let (_dir, path) = fixture().await;

        let response = serve_file(&path, &HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(body_bytes(response).await.len(), 1000);

        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=5000-"));
        let response = serve_file(&path, &headers).await.unwrap();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = serve_file(&dir.path().join("gone.pdf"), &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
