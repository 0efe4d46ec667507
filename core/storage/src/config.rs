//! Stored settings: app credentials, token set, folder selection.

use std::sync::Arc;

use chrono::Utc;

use crate::store::KeyValueStore;

const KEY_CLIENT_ID: &str = "shopbox_client_id";
const KEY_CLIENT_SECRET: &str = "shopbox_client_secret";
const KEY_ACCESS_TOKEN: &str = "shopbox_access_token";
const KEY_REFRESH_TOKEN: &str = "shopbox_refresh_token";
const KEY_TOKEN_EXPIRES: &str = "shopbox_token_expires";
const KEY_DEFAULT_FOLDER: &str = "shopbox_default_folder";

/// Safety margin subtracted from the provider-reported token lifetime,
/// so a token is never presented while it expires mid-request.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// The provider's identifier for the top-level container.
pub const ROOT_FOLDER_ID: &str = "0";

/// Scheme prefix marking a stored product-file reference as living in
/// the remote storage account, e.g. `shopbox://Folder/File.zip`.
pub const URL_PREFIX: &str = "shopbox://";

/// Operator-supplied OAuth application credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// The persisted OAuth token set.
///
/// `expires_at` is epoch seconds with the safety margin already
/// subtracted, so `now >= expires_at` is the complete expiry check.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Settings facade over the injected key/value store.
///
/// Cheap to clone; all clones share the same underlying store.
#[derive(Clone)]
pub struct StorageSettings {
    store: Arc<dyn KeyValueStore>,
}

impl StorageSettings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn client_id(&self) -> String {
        self.store.get(KEY_CLIENT_ID).unwrap_or_default()
    }

    pub fn client_secret(&self) -> String {
        self.store.get(KEY_CLIENT_SECRET).unwrap_or_default()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id(),
            client_secret: self.client_secret(),
        }
    }

    /// Check whether both app credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.client_id().is_empty() && !self.client_secret().is_empty()
    }

    /// Store app credentials.
    ///
    /// Changing either field invalidates the stored token set: tokens
    /// issued under the previous app registration cannot be refreshed.
    pub fn set_credentials(&self, client_id: &str, client_secret: &str) {
        let previous = self.credentials();
        if previous.client_id != client_id || previous.client_secret != client_secret {
            tracing::debug!("app credentials changed, clearing stored tokens");
            self.clear_tokens();
        }
        self.store.set(KEY_CLIENT_ID, client_id);
        self.store.set(KEY_CLIENT_SECRET, client_secret);
    }

    pub fn access_token(&self) -> String {
        self.store.get(KEY_ACCESS_TOKEN).unwrap_or_default()
    }

    pub fn refresh_token(&self) -> String {
        self.store.get(KEY_REFRESH_TOKEN).unwrap_or_default()
    }

    /// Epoch seconds past which the access token must be refreshed.
    /// Zero when no expiry is stored.
    pub fn token_expires(&self) -> i64 {
        self.store
            .get(KEY_TOKEN_EXPIRES)
            .and_then(|value| value.parse().ok())
            .unwrap_or(0)
    }

    pub fn token_set(&self) -> TokenSet {
        TokenSet {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            expires_at: self.token_expires(),
        }
    }

    /// Check whether a connection exists (an access token is stored).
    /// Does not validate the token.
    pub fn is_connected(&self) -> bool {
        !self.access_token().is_empty()
    }

    /// Persist a token set, storing `expires_at` with the safety margin
    /// subtracted from the provider-reported lifetime.
    pub fn save_tokens(&self, access_token: &str, refresh_token: &str, expires_in: i64) {
        self.store.set(KEY_ACCESS_TOKEN, access_token);
        self.store.set(KEY_REFRESH_TOKEN, refresh_token);
        let expires_at = Utc::now().timestamp() + expires_in - TOKEN_EXPIRY_MARGIN_SECS;
        self.store.set(KEY_TOKEN_EXPIRES, &expires_at.to_string());
    }

    /// Remove the stored token set (disconnect). Idempotent.
    pub fn clear_tokens(&self) {
        self.store.delete(KEY_ACCESS_TOKEN);
        self.store.delete(KEY_REFRESH_TOKEN);
        self.store.delete(KEY_TOKEN_EXPIRES);
    }

    /// The default upload folder id, the root container when unset.
    pub fn selected_folder(&self) -> String {
        self.store
            .get(KEY_DEFAULT_FOLDER)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| ROOT_FOLDER_ID.to_string())
    }

    pub fn set_selected_folder(&self, folder_id: &str) {
        self.store.set(KEY_DEFAULT_FOLDER, folder_id);
    }

    /// The scheme prefix for stored file references.
    pub fn url_prefix(&self) -> &'static str {
        URL_PREFIX
    }
}
