//! Human-readable path to provider file-id resolution.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use shopbox_common::{Error, RemotePath, Result};

use crate::client::BoxClient;
use crate::config::ROOT_FOLDER_ID;
use crate::store::KeyValueStore;

/// How long resolved path→id mappings are kept. Renames on the
/// provider side are only picked up after expiry.
pub const PATH_CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

const CACHE_KEY_PREFIX: &str = "shopbox_path_";

/// Resolves slash paths like `Folder/Sub/File.zip` to provider file
/// ids by walking the folder tree level by level.
///
/// Each level costs one listing call, so a cold resolution of a path
/// with N segments makes N sequential round-trips; the cache is the
/// only mitigation.
#[derive(Clone)]
pub struct PathResolver {
    client: BoxClient,
    store: Arc<dyn KeyValueStore>,
}

impl PathResolver {
    pub fn new(client: BoxClient, store: Arc<dyn KeyValueStore>) -> Self {
        Self { client, store }
    }

    /// Resolve a path to a file id.
    ///
    /// Matching is exact and case-sensitive; the first entry whose name
    /// equals the segment wins. A missing segment fails with `NotFound`
    /// without issuing further listing calls, and a transport failure
    /// at any level aborts the walk.
    pub async fn file_id_by_path(&self, path: &str) -> Result<String> {
        let path =
            RemotePath::parse(path).map_err(|_| Error::NotFound("malformed path".to_string()))?;
        if path.is_empty() {
            return Err(Error::NotFound("empty path".to_string()));
        }

        let cache_key = cache_key(&path);
        if let Some(file_id) = self.store.get(&cache_key) {
            return Ok(file_id);
        }

        let mut current_id = ROOT_FOLDER_ID.to_string();
        for segment in path.segments() {
            let children = match self.client.list_child_entries(&current_id).await {
                Ok(children) => children,
                Err(e) => {
                    tracing::debug!(segment = segment.as_str(), error = %e, "path resolution aborted");
                    return Err(e);
                }
            };

            match children.into_iter().find(|child| child.name == *segment) {
                Some(child) => current_id = child.id,
                None => {
                    tracing::debug!(segment = segment.as_str(), "path segment not found");
                    return Err(Error::NotFound(format!(
                        "path segment '{}' not found",
                        segment
                    )));
                }
            }
        }

        self.store
            .set_with_ttl(&cache_key, &current_id, PATH_CACHE_TTL);
        Ok(current_id)
    }
}

fn cache_key(path: &RemotePath) -> String {
    let digest = Sha256::digest(path.to_string().as_bytes());
    format!("{}{}", CACHE_KEY_PREFIX, hex::encode(digest))
}
