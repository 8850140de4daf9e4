//! Configuration Builder
//!
//! Fluent builder for provider configuration.

use std::time::Duration;

use crate::error::{ConfigurationError, OAuth2Error, OAuth2Result};
use crate::provider::PlatformProvider;
use crate::types::{
    ClientAuthMethod, ClientCredentials, EndpointOptions, ProviderConfig, ProviderEndpoints,
    DEFAULT_TIMEOUT_MS,
};
use secrecy::SecretString;

/// Provider configuration builder.
#[derive(Default)]
pub struct ProviderConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: Option<ClientAuthMethod>,
    redirect_uri: Option<String>,
    endpoints: EndpointOptions,
    default_scopes: Vec<String>,
    timeout: Option<Duration>,
}

impl ProviderConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    /// Set redirect URI.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Set base URI. Ignored when a token URL is set.
    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.endpoints.base_uri = Some(base_uri.into());
        self
    }

    /// Set token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.token_url = Some(url.into());
        self
    }

    /// Set authorization endpoint.
    pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.authorize_url = Some(url.into());
        self
    }

    /// Set API base URL.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.api_url = Some(url.into());
        self
    }

    /// Set all endpoint overrides at once, e.g. from deserialized settings.
    pub fn endpoints(mut self, endpoints: EndpointOptions) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set default scopes.
    pub fn default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Add a default scope.
    pub fn add_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scopes.push(scope.into());
        self
    }

    /// Set token request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the provider configuration.
    pub fn build(self) -> OAuth2Result<ProviderConfig> {
        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| missing("client_id"))?;

        let auth_method = self.auth_method.unwrap_or_default();

        // Basic authentication needs something to encode.
        if auth_method == ClientAuthMethod::ClientSecretBasic && self.client_secret.is_none() {
            return Err(missing("client_secret"));
        }

        Ok(ProviderConfig {
            endpoints: ProviderEndpoints::resolve(&self.endpoints)?,
            credentials: ClientCredentials {
                client_id,
                client_secret: self.client_secret,
                auth_method,
            },
            redirect_uri: self.redirect_uri,
            default_scopes: self.default_scopes,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        })
    }

    /// Build a [`PlatformProvider`] from the configuration.
    pub fn build_provider(self) -> OAuth2Result<PlatformProvider> {
        self.build().map(PlatformProvider::new)
    }
}

fn missing(field: &str) -> OAuth2Error {
    OAuth2Error::Configuration(ConfigurationError::MissingRequired {
        field: field.to_string(),
    })
}

/// Create a new provider configuration builder.
pub fn provider_config() -> ProviderConfigBuilder {
    ProviderConfigBuilder::new()
}
