//! OAuth2 token lifecycle against the provider's token service.

use chrono::Utc;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope, TokenUrl};
use serde::Deserialize;

use shopbox_common::{Error, Result};

use crate::config::{StorageSettings, TokenSet};

/// Authorization endpoint of the storage provider.
pub const PROVIDER_AUTHORIZE_URL: &str = "https://account.box.com/api/oauth2/authorize";
/// Token endpoint of the storage provider.
pub const PROVIDER_TOKEN_URL: &str = "https://api.box.com/oauth2/token";

/// Scope requested during authorization. Full read/write: both the
/// upload path and the download-redirect path need it.
const AUTH_SCOPE: &str = "root_readwrite";

/// Lifetime assumed when the provider omits `expires_in`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// OAuth endpoints, overridable for tests.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: PROVIDER_AUTHORIZE_URL.to_string(),
            token_url: PROVIDER_TOKEN_URL.to_string(),
        }
    }
}

/// Token endpoint response (standard OAuth 2.0).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Performs authorization-code exchange and refresh, and hands out a
/// valid access token to the API client, refreshing when the stored
/// expiry has passed.
#[derive(Clone)]
pub struct TokenManager {
    http: reqwest::Client,
    settings: StorageSettings,
    endpoints: AuthEndpoints,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, settings: StorageSettings, endpoints: AuthEndpoints) -> Self {
        Self {
            http,
            settings,
            endpoints,
        }
    }

    /// Build the provider authorization URL. No network call.
    ///
    /// `state` is the caller-generated CSRF token; the flow controller
    /// persists it before redirecting.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let credentials = self.settings.credentials();

        let client = BasicClient::new(
            ClientId::new(credentials.client_id),
            Some(ClientSecret::new(credentials.client_secret)),
            AuthUrl::new(self.endpoints.authorize_url.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid authorize URL: {}", e)))?,
            Some(
                TokenUrl::new(self.endpoints.token_url.clone())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(redirect_uri.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        );

        let state = state.to_string();
        let (url, _csrf) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scope(Scope::new(AUTH_SCOPE.to_string()))
            .url();

        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens and persist them.
    ///
    /// One-shot: any transport, status, or decode failure is returned
    /// without retry.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet> {
        let credentials = self.settings.credentials();
        if credentials.client_id.is_empty() || credentials.client_secret.is_empty() {
            return Err(Error::Credential(
                "client id and secret are not configured".to_string(),
            ));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ];

        let token = self
            .post_grant(&params)
            .await
            .map_err(Error::TokenExchange)?;

        let refresh_token = token.refresh_token.clone().unwrap_or_default();
        let expires_in = token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
        self.settings
            .save_tokens(&token.access_token, &refresh_token, expires_in);

        Ok(self.settings.token_set())
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// On success the new token set is persisted and the new access
    /// token returned. On any failure the stored token set is cleared:
    /// a rejected refresh token will not recover, and keeping it around
    /// would make every subsequent call re-fail the same way.
    pub async fn refresh(&self) -> Result<String> {
        let refresh_token = self.settings.refresh_token();
        if refresh_token.is_empty() {
            return Err(Error::Refresh("no refresh token stored".to_string()));
        }

        let credentials = self.settings.credentials();
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];

        match self.post_grant(&params).await {
            Ok(token) => {
                let new_refresh = token.refresh_token.clone().unwrap_or(refresh_token);
                let expires_in = token.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
                self.settings
                    .save_tokens(&token.access_token, &new_refresh, expires_in);
                Ok(token.access_token)
            }
            Err(reason) => {
                self.settings.clear_tokens();
                Err(Error::Refresh(reason))
            }
        }
    }

    /// Get an access token that is valid right now.
    ///
    /// Refreshes (once) when the stored expiry has passed; otherwise
    /// returns the stored token as-is.
    pub async fn valid_access_token(&self) -> Result<String> {
        let access_token = self.settings.access_token();
        if access_token.is_empty() {
            return Err(Error::Authentication("not connected".to_string()));
        }

        if Utc::now().timestamp() >= self.settings.token_expires() {
            tracing::info!("access token expired, refreshing");
            return self.refresh().await;
        }

        Ok(access_token)
    }

    /// POST a grant request to the token endpoint.
    ///
    /// Errors carry only transport context and the status code, never
    /// the provider's response body.
    async fn post_grant(&self, params: &[(&str, &str)]) -> std::result::Result<TokenResponse, String> {
        let response = self
            .http
            .post(self.endpoints.token_url.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| format!("token request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("token endpoint returned {}", status));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| format!("invalid token response: {}", e))
    }
}
