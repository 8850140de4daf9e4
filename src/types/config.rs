//! Configuration Types
//!
//! Provider, client and per-request configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, OAuth2Error, OAuth2Result};

/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://auth.api.platform.sh/oauth2/token";
/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.platform.sh";
/// Default HTTP timeout for provider calls.
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

/// Provider configuration.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Resolved endpoints.
    pub endpoints: ProviderEndpoints,
    /// Client credentials.
    pub credentials: ClientCredentials,
    /// Redirect URI sent with token and authorization requests.
    pub redirect_uri: Option<String>,
    /// Default scopes for authorization URLs.
    pub default_scopes: Vec<String>,
    /// Timeout applied to token endpoint requests.
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoints: ProviderEndpoints::default(),
            credentials: ClientCredentials::default(),
            redirect_uri: None,
            default_scopes: Vec::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Endpoint overrides, all optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EndpointOptions {
    /// Base URI; the token URL becomes `{base_uri}/oauth2/token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Resolved provider endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    /// Authorization endpoint URL.
    pub authorize_url: String,
    /// Token endpoint URL.
    pub token_url: String,
    /// Resource API base URL.
    pub api_url: String,
}

impl ProviderEndpoints {
    /// Fill in endpoint defaults.
    ///
    /// The token URL comes from `token_url`, else `base_uri` with path
    /// `/oauth2/token`, else [`DEFAULT_TOKEN_URL`]. The authorize URL defaults
    /// to the token URL with path `/oauth2/authorize`.
    pub fn resolve(options: &EndpointOptions) -> OAuth2Result<Self> {
        let token_url = match (non_empty(&options.token_url), non_empty(&options.base_uri)) {
            (Some(url), _) => url.to_string(),
            (None, Some(base)) => with_path(base, "/oauth2/token")?,
            (None, None) => DEFAULT_TOKEN_URL.to_string(),
        };

        let authorize_url = match non_empty(&options.authorize_url) {
            Some(url) => url.to_string(),
            None => with_path(&token_url, "/oauth2/authorize")?,
        };

        let api_url = non_empty(&options.api_url)
            .unwrap_or(DEFAULT_API_URL)
            .to_string();

        Ok(Self {
            authorize_url,
            token_url,
            api_url,
        })
    }
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: "https://auth.api.platform.sh/oauth2/authorize".to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Replace the path component of `base`.
pub(crate) fn with_path(base: &str, path: &str) -> OAuth2Result<String> {
    let mut url = Url::parse(base).map_err(|_| {
        OAuth2Error::Configuration(ConfigurationError::InvalidEndpoint {
            url: base.to_string(),
        })
    })?;
    url.set_path(path);
    Ok(url.to_string())
}

/// Client credentials for OAuth2 authentication.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret (for confidential clients).
    pub client_secret: Option<SecretString>,
    /// Client authentication method.
    pub auth_method: ClientAuthMethod,
}

impl Default for ClientCredentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            auth_method: ClientAuthMethod::default(),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// client_id and client_secret in request body.
    #[default]
    ClientSecretPost,
    /// HTTP Basic Authentication header.
    ClientSecretBasic,
    /// No client authentication (public client).
    None,
}

/// Whether a request should go through OAuth2 handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// Forward untouched.
    #[default]
    None,
    /// Attach a bearer token and retry on 401.
    OAuth2,
}

/// Per-request options passed alongside each request.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub auth: AuthMode,
}

impl RequestOptions {
    /// Options that engage OAuth2 handling.
    pub fn oauth2() -> Self {
        Self {
            auth: AuthMode::OAuth2,
        }
    }
}
