//! OAuth2 authorization flow: CSRF state handling and callback logic.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::client::BoxClient;
use crate::config::StorageSettings;
use crate::store::KeyValueStore;

/// CSRF state lifetime: the window between redirecting the
/// administrator to the provider and the callback arriving.
pub const STATE_TTL: Duration = Duration::from_secs(600);

const STATE_KEY_PREFIX: &str = "shopbox_oauth_state_";

/// Terminal outcome of an authorization attempt.
///
/// Each variant maps to a stable machine-readable code via
/// [`code`](Self::code) for the settings-page redirect built by the
/// host UI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("client credentials are not configured")]
    NoCredentials,
    #[error("redirect URI is not a valid URL")]
    InvalidRedirect,
    #[error("state validation failed")]
    InvalidState,
    #[error("no authorization code in callback")]
    NoCode,
    #[error("authorization code exchange failed")]
    TokenExchangeFailed,
    #[error("authorization denied by the user")]
    AccessDenied,
    /// Provider-supplied error code, passed through verbatim.
    #[error("provider error: {0}")]
    Provider(String),
}

impl FlowError {
    /// Stable machine-readable code for redirect query parameters.
    pub fn code(&self) -> &str {
        match self {
            FlowError::NoCredentials => "no_credentials",
            FlowError::InvalidRedirect => "invalid_redirect",
            FlowError::InvalidState => "invalid_state",
            FlowError::NoCode => "no_code",
            FlowError::TokenExchangeFailed => "token_exchange_failed",
            FlowError::AccessDenied => "access_denied",
            FlowError::Provider(code) => code,
        }
    }
}

/// Query parameters delivered to the OAuth callback endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Drives the authorization-code flow for one storage account.
///
/// `user_key` identifies the initiating administrator so concurrent
/// attempts by different users do not consume each other's state.
#[derive(Clone)]
pub struct OAuthFlow {
    client: BoxClient,
    settings: StorageSettings,
    store: Arc<dyn KeyValueStore>,
}

impl OAuthFlow {
    pub fn new(client: BoxClient, settings: StorageSettings, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client,
            settings,
            store,
        }
    }

    /// Begin an authorization attempt.
    ///
    /// Persists a fresh CSRF state for `user_key` and returns the
    /// provider URL to redirect the administrator to.
    pub fn start(&self, redirect_uri: &str, user_key: &str) -> Result<String, FlowError> {
        if !self.settings.has_credentials() {
            return Err(FlowError::NoCredentials);
        }

        let state = Uuid::new_v4().to_string();
        self.store
            .set_with_ttl(&state_key(user_key), &state, STATE_TTL);

        self.client
            .authorization_url(redirect_uri, &state)
            .map_err(|e| {
                tracing::debug!(error = %e, "failed to build authorization URL");
                FlowError::InvalidRedirect
            })
    }

    /// Handle the provider callback.
    ///
    /// The stored state is deleted before any comparison, so each state
    /// token is single-use regardless of outcome: replaying a callback
    /// always fails the second time.
    pub async fn handle_callback(
        &self,
        query: &CallbackQuery,
        redirect_uri: &str,
        user_key: &str,
    ) -> Result<(), FlowError> {
        let key = state_key(user_key);
        let stored = self.store.get(&key);
        self.store.delete(&key);

        let presented = query.state.as_deref().unwrap_or("");
        match stored {
            Some(stored) if !presented.is_empty() && stored == presented => {}
            _ => return Err(FlowError::InvalidState),
        }

        if let Some(error) = query.error.as_deref() {
            return Err(match error {
                "access_denied" => FlowError::AccessDenied,
                other => FlowError::Provider(other.to_string()),
            });
        }

        let code = match query.code.as_deref() {
            Some(code) if !code.is_empty() => code,
            _ => return Err(FlowError::NoCode),
        };

        if let Err(e) = self.client.exchange_code(code, redirect_uri).await {
            tracing::debug!(error = %e, "authorization code exchange failed");
            return Err(FlowError::TokenExchangeFailed);
        }

        Ok(())
    }

    /// Disconnect: forget the stored token set.
    pub fn disconnect(&self) {
        self.settings.clear_tokens();
    }
}

fn state_key(user_key: &str) -> String {
    format!("{}{}", STATE_KEY_PREFIX, user_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn flow() -> (OAuthFlow, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let settings = StorageSettings::new(store.clone());
        settings.set_credentials("test-id", "test-secret");
        let client = BoxClient::with_defaults(settings.clone()).unwrap();
        (OAuthFlow::new(client, settings, store.clone()), store)
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(FlowError::NoCredentials.code(), "no_credentials");
        assert_eq!(FlowError::InvalidState.code(), "invalid_state");
        assert_eq!(FlowError::NoCode.code(), "no_code");
        assert_eq!(FlowError::TokenExchangeFailed.code(), "token_exchange_failed");
        assert_eq!(FlowError::AccessDenied.code(), "access_denied");
        assert_eq!(
            FlowError::Provider("temporarily_unavailable".to_string()).code(),
            "temporarily_unavailable"
        );
    }

    #[test]
    fn test_start_requires_credentials() {
        let store = Arc::new(MemoryStore::new());
        let settings = StorageSettings::new(store.clone());
        let client = BoxClient::with_defaults(settings.clone()).unwrap();
        let flow = OAuthFlow::new(client, settings, store);

        let result = flow.start("https://shop.example/callback", "admin");
        assert_eq!(result.unwrap_err(), FlowError::NoCredentials);
    }

    #[test]
    fn test_start_persists_state_in_url() {
        let (flow, store) = flow();
        let url = flow.start("https://shop.example/callback", "admin").unwrap();

        let state = store.get("shopbox_oauth_state_admin").unwrap();
        assert!(url.contains(&format!("state={}", state)));
    }

    #[tokio::test]
    async fn test_callback_with_wrong_state_is_rejected() {
        let (flow, store) = flow();
        flow.start("https://shop.example/callback", "admin").unwrap();

        let query = CallbackQuery {
            state: Some("forged".to_string()),
            code: Some("code".to_string()),
            error: None,
        };
        let result = flow
            .handle_callback(&query, "https://shop.example/callback", "admin")
            .await;
        assert_eq!(result.unwrap_err(), FlowError::InvalidState);

        // The stored state is gone even though validation failed.
        assert_eq!(store.get("shopbox_oauth_state_admin"), None);
    }

    #[tokio::test]
    async fn test_callback_without_stored_state_is_rejected() {
        let (flow, _store) = flow();

        let query = CallbackQuery {
            state: Some("anything".to_string()),
            code: Some("code".to_string()),
            error: None,
        };
        let result = flow
            .handle_callback(&query, "https://shop.example/callback", "admin")
            .await;
        assert_eq!(result.unwrap_err(), FlowError::InvalidState);
    }

    #[tokio::test]
    async fn test_provider_error_passes_through() {
        let (flow, store) = flow();
        flow.start("https://shop.example/callback", "admin").unwrap();
        let state = store.get("shopbox_oauth_state_admin").unwrap();

        let query = CallbackQuery {
            state: Some(state),
            code: None,
            error: Some("access_denied".to_string()),
        };
        let result = flow
            .handle_callback(&query, "https://shop.example/callback", "admin")
            .await;
        assert_eq!(result.unwrap_err(), FlowError::AccessDenied);
    }

    #[tokio::test]
    async fn test_missing_code_is_rejected() {
        let (flow, store) = flow();
        flow.start("https://shop.example/callback", "admin").unwrap();
        let state = store.get("shopbox_oauth_state_admin").unwrap();

        let query = CallbackQuery {
            state: Some(state),
            code: None,
            error: None,
        };
        let result = flow
            .handle_callback(&query, "https://shop.example/callback", "admin")
            .await;
        assert_eq!(result.unwrap_err(), FlowError::NoCode);
    }
}
