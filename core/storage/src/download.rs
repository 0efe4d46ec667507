//! Buyer download redirection for provider-backed file references.

use crate::client::BoxClient;
use crate::config::StorageSettings;
use crate::resolver::PathResolver;

/// Turns a stored product-file reference into a redirect target.
///
/// References carry the configured scheme prefix followed by a display
/// path, e.g. `shopbox://Products/bundle.zip`. Anything that cannot be
/// turned into a direct download URL falls back to the original
/// reference so the host can serve whatever it pointed at before.
#[derive(Clone)]
pub struct DownloadRedirector {
    resolver: PathResolver,
    client: BoxClient,
    settings: StorageSettings,
}

impl DownloadRedirector {
    pub fn new(resolver: PathResolver, client: BoxClient, settings: StorageSettings) -> Self {
        Self {
            resolver,
            client,
            settings,
        }
    }

    /// Produce the redirect target for a stored file reference.
    pub async fn resolve(&self, reference: &str) -> String {
        let Some(path) = reference.strip_prefix(self.settings.url_prefix()) else {
            return reference.to_string();
        };

        if !self.settings.is_connected() {
            tracing::debug!(path, "not connected, serving original reference");
            return reference.to_string();
        }

        let file_id = match self.resolver.file_id_by_path(path).await {
            Ok(file_id) => file_id,
            Err(e) => {
                tracing::debug!(path, error = %e, "could not resolve reference to a file id");
                return reference.to_string();
            }
        };

        match self.client.download_url(&file_id).await {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(file_id = file_id.as_str(), error = %e, "no download URL");
                reference.to_string()
            }
        }
    }
}
