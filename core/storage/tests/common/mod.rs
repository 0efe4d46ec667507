//! Shared harness for the wiremock-based protocol tests.

use std::sync::Arc;
use std::time::Duration;

use shopbox_storage::auth::{AuthEndpoints, TokenManager};
use shopbox_storage::client::{default_http_client, BoxClient, ClientConfig};
use shopbox_storage::config::StorageSettings;
use shopbox_storage::store::MemoryStore;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub settings: StorageSettings,
    pub client: BoxClient,
}

/// Build a client wired against a mock server: API, upload, and token
/// endpoints all live under `server_uri`.
pub fn harness(server_uri: &str) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let settings = StorageSettings::new(store.clone());
    settings.set_credentials("client-id", "client-secret");

    let http = default_http_client(Duration::from_secs(30)).unwrap();
    let endpoints = AuthEndpoints {
        authorize_url: format!("{}/oauth2/authorize", server_uri),
        token_url: format!("{}/oauth2/token", server_uri),
    };
    let tokens = TokenManager::new(http.clone(), settings.clone(), endpoints);
    let config = ClientConfig {
        api_base: format!("{}/2.0", server_uri),
        upload_base: format!("{}/upload/2.0", server_uri),
        timeout: Duration::from_secs(30),
    };
    let client = BoxClient::new(http, tokens, config);

    Harness {
        store,
        settings,
        client,
    }
}
