//! Dropbox HTTP backend.
//!
//! Talks to the Dropbox v2 API: RPC endpoints on `api.dropboxapi.com` take a JSON body,
//! content endpoints on `content.dropboxapi.com` take their arguments in the
//! `Dropbox-API-Arg` header and the payload as the raw body.
//!
//! Status mapping:
//!
//! - `409` carries an `error_summary` such as `path/not_found/..` or `path/conflict/folder/..`;
//!   summaries mentioning `not_found` become `NotFound`, `malformed_path` becomes
//!   `InvalidPath`, everything else `Conflict`
//! - `401` becomes `Auth`
//! - any other non-success status becomes `Transport`
//! - client-side timeouts become `Timeout`

use crate::object_store::{
    EntryKind, EntryMetadata, ObjectStore, SharedLink, TokenProvider, Visibility, WriteMode,
};
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Endpoints and limits for the Dropbox backend
#[derive(Debug, Clone)]
pub struct DropboxConfig {
    pub api_base: String,
    pub content_base: String,
    /// Deadline applied by the HTTP client to every request
    pub request_timeout: Duration,
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.dropboxapi.com".into(),
            content_base: "https://content.dropboxapi.com".into(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Object store backed by a Dropbox account
pub struct DropboxStore {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    config: DropboxConfig,
}

impl std::fmt::Debug for DropboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(rename = ".tag")]
    tag: Option<String>,
    path_display: Option<String>,
    path_lower: Option<String>,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct WrappedMetadata {
    metadata: RawMetadata,
}

#[derive(Debug, Deserialize)]
struct RawSharedLink {
    url: String,
    path_lower: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListSharedLinksResponse {
    links: Vec<RawSharedLink>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_summary: String,
}

impl RawMetadata {
    fn into_metadata(self, requested: &str, default_kind: EntryKind) -> EntryMetadata {
        let kind = match self.tag.as_deref() {
            Some("folder") => EntryKind::Folder,
            Some("file") => EntryKind::File,
            _ => default_kind,
        };
        EntryMetadata {
            path: self
                .path_display
                .or(self.path_lower)
                .unwrap_or_else(|| requested.to_string()),
            kind,
            size: self.size,
        }
    }
}

impl DropboxStore {
    /// Creates a Dropbox store that authenticates through `tokens`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the HTTP client cannot be built.
    pub fn new(config: DropboxConfig, tokens: Arc<dyn TokenProvider>) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            tokens,
            config,
        })
    }

    async fn bearer(&self) -> StoreResult<HeaderValue> {
        let token = self.tokens.access_token().await?;
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| StoreError::Auth(format!("invalid access token: {e}")))
    }

    fn transport_error(&self, error: reqwest::Error) -> StoreError {
        if error.is_timeout() {
            StoreError::Timeout(self.config.request_timeout)
        } else {
            StoreError::Transport(error.to_string())
        }
    }

    async fn check(&self, response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }

    /// Calls an RPC endpoint with a JSON body and decodes the JSON response.
    async fn rpc<R: DeserializeOwned>(&self, endpoint: &str, body: &Value) -> StoreResult<R> {
        let url = format!("{}/2/{}", self.config.api_base, endpoint);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer().await?)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = self.check(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| StoreError::Decode(format!("{endpoint}: {e}")))
    }

    /// Calls a content endpoint with arguments in the `Dropbox-API-Arg` header.
    async fn content(
        &self,
        endpoint: &str,
        arg: &Value,
        body: Option<Vec<u8>>,
    ) -> StoreResult<reqwest::Response> {
        let url = format!("{}/2/{}", self.config.content_base, endpoint);
        let arg = HeaderValue::from_str(&header_safe_json(arg))
            .map_err(|e| StoreError::InvalidPath(format!("unencodable argument: {e}")))?;
        let mut request = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer().await?)
            .header(API_ARG_HEADER, arg);
        if let Some(bytes) = body {
            request = request
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(bytes);
        }
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        self.check(response).await
    }
}

#[async_trait]
impl ObjectStore for DropboxStore {
    #[instrument(skip(self), fields(store = "dropbox"))]
    async fn download(&self, path: &str) -> StoreResult<Vec<u8>> {
        let response = self
            .content("files/download", &json!({ "path": path }), None)
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        debug!(size = bytes.len(), "downloaded");
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self, bytes), fields(store = "dropbox", size = bytes.len()))]
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mode: WriteMode,
    ) -> StoreResult<EntryMetadata> {
        let arg = json!({
            "path": path,
            "mode": mode.as_str(),
            "autorename": false,
            "mute": false,
        });
        let response = self.content("files/upload", &arg, Some(bytes)).await?;
        let raw: RawMetadata = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("files/upload: {e}")))?;
        Ok(raw.into_metadata(path, EntryKind::File))
    }

    #[instrument(skip(self), fields(store = "dropbox"))]
    async fn get_metadata(&self, path: &str) -> StoreResult<EntryMetadata> {
        let raw: RawMetadata = self
            .rpc("files/get_metadata", &json!({ "path": path }))
            .await?;
        Ok(raw.into_metadata(path, EntryKind::File))
    }

    #[instrument(skip(self), fields(store = "dropbox"))]
    async fn create_folder(&self, path: &str) -> StoreResult<EntryMetadata> {
        let wrapped: WrappedMetadata = self
            .rpc(
                "files/create_folder_v2",
                &json!({ "path": path, "autorename": false }),
            )
            .await?;
        Ok(wrapped.metadata.into_metadata(path, EntryKind::Folder))
    }

    #[instrument(skip(self), fields(store = "dropbox"))]
    async fn move_entry(&self, from: &str, to: &str) -> StoreResult<EntryMetadata> {
        let wrapped: WrappedMetadata = self
            .rpc(
                "files/move_v2",
                &json!({ "from_path": from, "to_path": to, "autorename": false }),
            )
            .await?;
        Ok(wrapped.metadata.into_metadata(to, EntryKind::Folder))
    }

    #[instrument(skip(self), fields(store = "dropbox"))]
    async fn create_shared_link(
        &self,
        path: &str,
        visibility: Visibility,
    ) -> StoreResult<SharedLink> {
        let raw: RawSharedLink = self
            .rpc(
                "sharing/create_shared_link_with_settings",
                &json!({
                    "path": path,
                    "settings": { "requested_visibility": visibility.as_str() },
                }),
            )
            .await?;
        Ok(SharedLink {
            path: raw.path_lower.unwrap_or_else(|| path.to_string()),
            url: raw.url,
        })
    }

    #[instrument(skip(self), fields(store = "dropbox"))]
    async fn list_shared_links(&self, path: &str) -> StoreResult<Vec<SharedLink>> {
        let listed: ListSharedLinksResponse = self
            .rpc(
                "sharing/list_shared_links",
                &json!({ "path": path, "direct_only": true }),
            )
            .await?;
        Ok(listed
            .links
            .into_iter()
            .map(|link| SharedLink {
                path: link.path_lower.unwrap_or_else(|| path.to_string()),
                url: link.url,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "dropbox"
    }
}

/// Maps a non-success response onto the store error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED => StoreError::Auth(body.to_string()),
        StatusCode::CONFLICT => {
            let summary = serde_json::from_str::<ErrorBody>(body)
                .map(|e| e.error_summary)
                .unwrap_or_else(|_| body.to_string());
            if summary.contains("not_found") {
                StoreError::NotFound(summary)
            } else if summary.contains("malformed_path") {
                StoreError::InvalidPath(summary)
            } else {
                StoreError::Conflict(summary)
            }
        }
        _ => StoreError::Transport(format!("status {status}: {body}")),
    }
}

/// Serialises `value` as JSON that is safe to send in an HTTP header.
///
/// Non-ASCII characters and DEL are written as `\uXXXX` escapes (UTF-16 code units).
fn header_safe_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    let mut units = [0u16; 2];
    for c in raw.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found_summary() {
        let body = r#"{"error_summary": "path/not_found/..", "error": {}}"#;
        assert!(matches!(
            classify_failure(StatusCode::CONFLICT, body),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_classify_conflict_summary() {
        let body = r#"{"error_summary": "path/conflict/folder/...", "error": {}}"#;
        assert_eq!(
            classify_failure(StatusCode::CONFLICT, body),
            StoreError::Conflict("path/conflict/folder/...".into())
        );
    }

    #[test]
    fn test_classify_existing_shared_link_is_conflict() {
        let body = r#"{"error_summary": "shared_link_already_exists/metadata/..", "error": {}}"#;
        assert!(classify_failure(StatusCode::CONFLICT, body).is_conflict());
    }

    #[test]
    fn test_classify_malformed_path() {
        let body = r#"{"error_summary": "path/malformed_path/.", "error": {}}"#;
        assert!(matches!(
            classify_failure(StatusCode::CONFLICT, body),
            StoreError::InvalidPath(_)
        ));
    }

    #[test]
    fn test_classify_unauthorized_and_server_errors() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "expired_access_token"),
            StoreError::Auth(_)
        ));
        assert!(classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom").is_transient());
    }

    #[test]
    fn test_header_safe_json_escapes_non_ascii() {
        let encoded = header_safe_json(&json!({ "path": "/forms/סניף" }));
        assert!(encoded.is_ascii());
        assert!(encoded.contains("\\u05e1"));
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["path"], "/forms/סניף");
    }

    #[test]
    fn test_header_safe_json_uses_surrogate_pairs() {
        let encoded = header_safe_json(&json!({ "path": "/forms/📷" }));
        assert!(encoded.contains("\\ud83d\\udcf7"));
    }

    #[test]
    fn test_raw_metadata_defaults_kind_and_path() {
        let raw: RawMetadata = serde_json::from_str(r#"{"name": "a.jpg", "size": 12}"#).unwrap();
        let metadata = raw.into_metadata("/forms/a.jpg", EntryKind::File);
        assert_eq!(metadata.path, "/forms/a.jpg");
        assert_eq!(metadata.kind, EntryKind::File);
        assert_eq!(metadata.size, Some(12));
    }
}
