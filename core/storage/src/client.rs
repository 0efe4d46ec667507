//! Provider API client.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};

use shopbox_common::{Error, Result};

use crate::auth::{AuthEndpoints, TokenManager};
use crate::config::{StorageSettings, TokenSet, ROOT_FOLDER_ID};

/// Provider REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.box.com/2.0";
/// Provider upload API base URL.
pub const DEFAULT_UPLOAD_BASE: &str = "https://upload.box.com/api/2.0";

/// Per-call timeout applied to the shared HTTP client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Single listing page size; deeper pagination is not requested.
const LIST_PAGE_LIMIT: &str = "1000";

/// Byte stream type for upload operations.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub upload_base: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Build the HTTP client the API client expects: fixed timeout,
/// redirect-following disabled. The content endpoint answers with a
/// 302 that must stay observable; no other provider endpoint in use
/// relies on redirects.
pub fn default_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))
}

/// A file or folder as presented to the browsing UI.
///
/// Read-only projection of a listing result; recomputed per request,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub size: u64,
    pub modified_at: Option<DateTime<Utc>>,
    /// Ancestor names (root excluded) plus own name, slash-joined.
    pub full_path: String,
}

/// One ancestor in a `path_collection`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathAncestor {
    pub id: String,
    pub name: String,
}

/// Ancestry metadata returned alongside listing entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathCollection {
    #[serde(default)]
    pub entries: Vec<PathAncestor>,
}

/// Folder metadata for breadcrumb rendering.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderDetails {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<PathAncestor>,
    #[serde(default)]
    pub path_collection: Option<PathCollection>,
}

impl FolderDetails {
    /// The synthetic record for the top-level container; produced
    /// without a network call.
    fn root() -> Self {
        Self {
            id: ROOT_FOLDER_ID.to_string(),
            name: "All Files".to_string(),
            parent: None,
            path_collection: Some(PathCollection::default()),
        }
    }
}

/// Lean listing entry used during path resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: String,
    #[serde(rename = "type")]
    item_type: String,
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    path_collection: Option<PathCollection>,
}

impl RawEntry {
    fn into_remote_entry(self) -> RemoteEntry {
        let full_path = full_path_from(self.path_collection.as_ref(), &self.name);
        RemoteEntry {
            id: self.id,
            name: self.name,
            is_folder: self.item_type == "folder",
            size: self.size.unwrap_or(0),
            modified_at: self.modified_at,
            full_path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ItemList {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct ChildList {
    #[serde(default)]
    entries: Vec<ChildEntry>,
}

/// Join ancestor names and the entry's own name into a display path,
/// skipping the synthetic root entry.
fn full_path_from(path_collection: Option<&PathCollection>, name: &str) -> String {
    let mut path = String::new();
    if let Some(collection) = path_collection {
        for ancestor in &collection.entries {
            if ancestor.id != ROOT_FOLDER_ID {
                path.push_str(&ancestor.name);
                path.push('/');
            }
        }
    }
    path.push_str(name);
    path
}

/// Authenticated client for the storage provider's REST API.
///
/// Every authenticated call goes through the same protocol: obtain a
/// valid access token (refreshing on stored expiry), send with a bearer
/// header, and on a 401 refresh once and retry the rebuilt request
/// exactly once. A second 401 or a refresh failure is terminal for
/// that call.
#[derive(Clone)]
pub struct BoxClient {
    http: reqwest::Client,
    tokens: TokenManager,
    config: ClientConfig,
}

impl BoxClient {
    pub fn new(http: reqwest::Client, tokens: TokenManager, config: ClientConfig) -> Self {
        Self {
            http,
            tokens,
            config,
        }
    }

    /// Create a client against the production endpoints.
    pub fn with_defaults(settings: StorageSettings) -> Result<Self> {
        let config = ClientConfig::default();
        let http = default_http_client(config.timeout)?;
        let tokens = TokenManager::new(http.clone(), settings, AuthEndpoints::default());
        Ok(Self::new(http, tokens, config))
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Send an authenticated request, refreshing and retrying once on a
    /// 401. The closure rebuilds the request for each attempt.
    async fn send_authorized<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.tokens.valid_access_token().await?;
        let response = build(&self.http, &token)
            .send()
            .await
            .map_err(|e| Error::Network(format!("request failed: {}", e)))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let token = self.tokens.refresh().await?;
        build(&self.http, &token)
            .send()
            .await
            .map_err(|e| Error::Network(format!("request failed: {}", e)))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Serialization(format!("{}: invalid response: {}", context, e)))
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound(format!("{}: resource not found", context)))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(Error::Authentication(format!(
                "{}: token rejected after refresh",
                context
            )))
        } else {
            Err(Error::Network(format!(
                "{}: provider returned {}",
                context, status
            )))
        }
    }

    /// List the immediate children of a folder, with display paths.
    ///
    /// Listing feeds a best-effort browsing UI, so any failure degrades
    /// to an empty list instead of propagating.
    pub async fn list_files(&self, folder_id: &str) -> Vec<RemoteEntry> {
        let folder_id = if folder_id.is_empty() {
            ROOT_FOLDER_ID
        } else {
            folder_id
        };

        match self.fetch_items(folder_id).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(folder_id, error = %e, "listing folder failed");
                Vec::new()
            }
        }
    }

    async fn fetch_items(&self, folder_id: &str) -> Result<Vec<RemoteEntry>> {
        let url = format!("{}/folders/{}/items", self.config.api_base, folder_id);
        let response = self
            .send_authorized(|http, token| {
                http.get(url.as_str()).bearer_auth(token).query(&[
                    ("limit", LIST_PAGE_LIMIT),
                    ("fields", "id,type,name,size,modified_at,path_collection"),
                    ("sort", "name"),
                    ("direction", "ASC"),
                ])
            })
            .await?;

        let list: ItemList = self.handle_response(response, "list folder items").await?;
        Ok(list
            .entries
            .into_iter()
            .map(RawEntry::into_remote_entry)
            .collect())
    }

    /// List children with the lean field set used by path resolution.
    ///
    /// Unlike [`list_files`](Self::list_files) this propagates errors:
    /// resolution must distinguish a transport failure from an absent
    /// name.
    pub async fn list_child_entries(&self, folder_id: &str) -> Result<Vec<ChildEntry>> {
        let url = format!("{}/folders/{}/items", self.config.api_base, folder_id);
        let response = self
            .send_authorized(|http, token| {
                http.get(url.as_str())
                    .bearer_auth(token)
                    .query(&[("limit", LIST_PAGE_LIMIT), ("fields", "id,name,type")])
            })
            .await?;

        let list: ChildList = self
            .handle_response(response, "list folder children")
            .await?;
        Ok(list.entries)
    }

    /// Folder metadata for breadcrumbs. Never fails: the root sentinel
    /// gets a synthetic record without a network call, and any fetch
    /// failure degrades to a placeholder name.
    pub async fn folder_details(&self, folder_id: &str) -> FolderDetails {
        if folder_id.is_empty() || folder_id == ROOT_FOLDER_ID {
            return FolderDetails::root();
        }

        match self.fetch_folder_details(folder_id).await {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(folder_id, error = %e, "folder details failed");
                FolderDetails {
                    id: folder_id.to_string(),
                    name: "Unknown".to_string(),
                    parent: None,
                    path_collection: None,
                }
            }
        }
    }

    async fn fetch_folder_details(&self, folder_id: &str) -> Result<FolderDetails> {
        let url = format!("{}/folders/{}", self.config.api_base, folder_id);
        let response = self
            .send_authorized(|http, token| {
                http.get(url.as_str())
                    .bearer_auth(token)
                    .query(&[("fields", "id,name,parent,path_collection")])
            })
            .await?;

        self.handle_response(response, "folder details").await
    }

    /// Full display path for a folder id; empty for the root.
    pub async fn folder_path(&self, folder_id: &str) -> String {
        if folder_id.is_empty() || folder_id == ROOT_FOLDER_ID {
            return String::new();
        }

        let details = self.folder_details(folder_id).await;
        full_path_from(details.path_collection.as_ref(), &details.name)
    }

    /// Time-limited direct download URL for a file.
    ///
    /// The content endpoint answers a 302 whose `Location` header is
    /// the direct URL; it is returned verbatim. Any other outcome is a
    /// failure the caller reports as "unavailable".
    pub async fn download_url(&self, file_id: &str) -> Result<String> {
        let url = format!("{}/files/{}/content", self.config.api_base, file_id);
        let response = self
            .send_authorized(|http, token| http.get(url.as_str()).bearer_auth(token))
            .await?;

        if response.status() == StatusCode::FOUND {
            if let Some(location) = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                return Ok(location.to_string());
            }
        }

        Err(Error::DownloadUnavailable(format!(
            "no download redirect for file {}",
            file_id
        )))
    }

    /// Upload a file into a folder via the multipart content endpoint.
    pub async fn upload(&self, data: Bytes, filename: &str, folder_id: &str) -> Result<RemoteEntry> {
        let folder_id = if folder_id.is_empty() {
            ROOT_FOLDER_ID
        } else {
            folder_id
        };

        let url = format!("{}/files/content", self.config.upload_base);
        let attributes = serde_json::json!({
            "name": filename,
            "parent": { "id": folder_id },
        })
        .to_string();

        let response = self
            .send_authorized(|http, token| {
                let form = reqwest::multipart::Form::new()
                    .text("attributes", attributes.clone())
                    .part(
                        "file",
                        reqwest::multipart::Part::stream(data.clone())
                            .file_name(filename.to_string()),
                    );
                http.post(url.as_str()).bearer_auth(token).multipart(form)
            })
            .await?;

        let uploaded: ItemList = self.handle_response(response, "upload file").await?;
        uploaded
            .entries
            .into_iter()
            .next()
            .map(RawEntry::into_remote_entry)
            .ok_or_else(|| Error::Upload("provider returned no uploaded entry".to_string()))
    }

    /// Upload from a byte stream. The 401 retry resends the body, so
    /// the stream is buffered before the request goes out.
    pub async fn upload_stream(
        &self,
        mut stream: ByteStream,
        filename: &str,
        folder_id: &str,
    ) -> Result<RemoteEntry> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        self.upload(Bytes::from(data), filename, folder_id).await
    }

    /// Build the provider authorization URL. No network call.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        self.tokens.authorization_url(redirect_uri, state)
    }

    /// Exchange an authorization code for a persisted token set.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet> {
        self.tokens.exchange_code(code, redirect_uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_excludes_root_ancestor() {
        let collection = PathCollection {
            entries: vec![
                PathAncestor {
                    id: "0".to_string(),
                    name: "All Files".to_string(),
                },
                PathAncestor {
                    id: "5".to_string(),
                    name: "Docs".to_string(),
                },
            ],
        };

        assert_eq!(
            full_path_from(Some(&collection), "report.pdf"),
            "Docs/report.pdf"
        );
    }

    #[test]
    fn test_full_path_without_ancestry() {
        assert_eq!(full_path_from(None, "file.txt"), "file.txt");
        assert_eq!(
            full_path_from(Some(&PathCollection::default()), "file.txt"),
            "file.txt"
        );
    }

    #[test]
    fn test_raw_entry_deserialization() {
        let json = r#"{
            "type": "file",
            "id": "12345",
            "name": "product.zip",
            "size": 2048,
            "modified_at": "2026-03-01T10:53:43-08:00",
            "path_collection": {
                "total_count": 2,
                "entries": [
                    {"type": "folder", "id": "0", "name": "All Files"},
                    {"type": "folder", "id": "7", "name": "Products"}
                ]
            }
        }"#;

        let entry: RawEntry = serde_json::from_str(json).unwrap();
        let entry = entry.into_remote_entry();
        assert_eq!(entry.id, "12345");
        assert!(!entry.is_folder);
        assert_eq!(entry.size, 2048);
        assert_eq!(entry.full_path, "Products/product.zip");
        assert!(entry.modified_at.is_some());
    }

    #[test]
    fn test_folder_entry_has_no_size() {
        let json = r#"{"type": "folder", "id": "9", "name": "Assets"}"#;
        let entry: RawEntry = serde_json::from_str(json).unwrap();
        let entry = entry.into_remote_entry();
        assert!(entry.is_folder);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.full_path, "Assets");
    }

    #[test]
    fn test_item_list_defaults_to_empty() {
        let list: ItemList = serde_json::from_str(r#"{"total_count": 0}"#).unwrap();
        assert!(list.entries.is_empty());
    }

    #[test]
    fn test_folder_details_root_is_synthetic() {
        let root = FolderDetails::root();
        assert_eq!(root.id, ROOT_FOLDER_ID);
        assert_eq!(root.name, "All Files");
    }
}
