//! Middleware Builder
//!
//! Fluent builder assembling the token cache and interceptor.

use std::sync::Arc;
use std::time::Duration;

use crate::core::HttpTransport;
use crate::error::{ConfigurationError, OAuth2Error, OAuth2Result};
use crate::grant::{GrantOptions, GrantType};
use crate::middleware::{Hooks, OAuth2Middleware, TokenCache, DEFAULT_MAX_AUTH_RETRIES};
use crate::provider::{Provider, ProviderClient, TokenRequester};
use crate::telemetry::{Logger, NoOpLogger};
use crate::types::AccessToken;

/// Builder for [`OAuth2Middleware`].
pub struct OAuth2MiddlewareBuilder<T: HttpTransport> {
    provider: Option<Arc<dyn Provider>>,
    transport: Option<Arc<T>>,
    requester: Option<Arc<dyn TokenRequester>>,
    grant: GrantType,
    grant_options: GrantOptions,
    hooks: Hooks,
    initial_token: Option<AccessToken>,
    max_auth_retries: u32,
    expiry_leeway: Duration,
    logger: Arc<dyn Logger>,
}

impl<T: HttpTransport> OAuth2MiddlewareBuilder<T> {
    /// Create new builder using the client credentials grant.
    pub fn new() -> Self {
        Self {
            provider: None,
            transport: None,
            requester: None,
            grant: GrantType::default(),
            grant_options: GrantOptions::new(),
            hooks: Hooks::default(),
            initial_token: None,
            max_auth_retries: DEFAULT_MAX_AUTH_RETRIES,
            expiry_leeway: Duration::ZERO,
            logger: Arc::new(NoOpLogger),
        }
    }

    /// Set the provider.
    pub fn provider(mut self, provider: impl Provider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Set a shared provider.
    pub fn shared_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the transport requests are forwarded to.
    pub fn transport(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set where tokens come from. Defaults to the provider over the
    /// middleware's own transport.
    pub fn token_requester(mut self, requester: Arc<dyn TokenRequester>) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Set the primary grant and its options.
    pub fn grant(mut self, grant: GrantType, options: GrantOptions) -> Self {
        self.grant = grant;
        self.grant_options = options;
        self
    }

    /// Set hooks.
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Start with a previously saved token.
    pub fn initial_token(mut self, token: impl Into<AccessToken>) -> Self {
        self.initial_token = Some(token.into());
        self
    }

    /// Set the number of retries after a 401.
    pub fn max_auth_retries(mut self, max_auth_retries: u32) -> Self {
        self.max_auth_retries = max_auth_retries;
        self
    }

    /// Treat tokens expiring within `leeway` as expired.
    pub fn expiry_leeway(mut self, leeway: Duration) -> Self {
        self.expiry_leeway = leeway;
        self
    }

    /// Set logger.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }
}

impl<T: HttpTransport + 'static> OAuth2MiddlewareBuilder<T> {
    /// Build the middleware.
    pub fn build(self) -> OAuth2Result<OAuth2Middleware<T>> {
        let provider = self.provider.ok_or_else(|| missing("provider"))?;
        let transport = self.transport.ok_or_else(|| missing("transport"))?;

        let requester = self.requester.unwrap_or_else(|| {
            Arc::new(ProviderClient::new(provider.clone(), transport.clone()))
        });

        let mut cache = TokenCache::new(requester, self.grant, self.grant_options)
            .with_hooks(self.hooks.clone())
            .with_leeway(self.expiry_leeway)
            .with_logger(self.logger.clone());
        if let Some(token) = self.initial_token {
            cache = cache.with_initial_token(token);
        }

        Ok(OAuth2Middleware::new(transport, provider, cache)
            .with_hooks(self.hooks)
            .with_max_auth_retries(self.max_auth_retries)
            .with_logger(self.logger))
    }
}

impl<T: HttpTransport> Default for OAuth2MiddlewareBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(field: &str) -> OAuth2Error {
    OAuth2Error::Configuration(ConfigurationError::MissingRequired {
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HttpRequest, HttpResponse, MockHttpTransport};
    use crate::grant::api_token_options;
    use crate::provider::PlatformProvider;
    use crate::types::{ProviderConfig, RequestOptions, StoredToken};
    use chrono::Utc;

    fn provider() -> PlatformProvider {
        PlatformProvider::new(ProviderConfig::default())
    }

    #[test]
    fn test_build_requires_provider_and_transport() {
        let result = OAuth2Middleware::<MockHttpTransport>::builder()
            .transport(Arc::new(MockHttpTransport::new()))
            .build();
        assert!(matches!(
            result,
            Err(OAuth2Error::Configuration(ConfigurationError::MissingRequired { field })) if field == "provider"
        ));

        let result = OAuth2Middleware::<MockHttpTransport>::builder()
            .provider(provider())
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_default_requester_uses_inner_transport() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &serde_json::json!({"access_token": "T1"}));
        transport.queue_response(HttpResponse::new(200, "ok"));

        let middleware = OAuth2Middleware::builder()
            .provider(provider())
            .transport(transport.clone())
            .grant(GrantType::ApiToken, api_token_options("abcdef"))
            .build()
            .unwrap();

        middleware
            .send(
                HttpRequest::get("https://api.platform.sh/projects"),
                &RequestOptions::oauth2(),
            )
            .await
            .unwrap();

        let requests = transport.get_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "https://auth.api.platform.sh/oauth2/token");
        assert!(requests[0].body.as_deref().unwrap().contains("grant_type=api_token"));
        assert_eq!(requests[1].header("authorization"), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn test_initial_token_from_storage() {
        let stored = StoredToken {
            access_token: "saved".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            refresh_token: None,
            scopes: Vec::new(),
            stored_at: Utc::now(),
        };
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(HttpResponse::new(200, "ok"));

        let middleware = OAuth2Middleware::builder()
            .provider(provider())
            .transport(transport.clone())
            .initial_token(stored)
            .max_auth_retries(2)
            .build()
            .unwrap();

        middleware
            .send(
                HttpRequest::get("https://api.platform.sh/projects"),
                &RequestOptions::oauth2(),
            )
            .await
            .unwrap();

        assert_eq!(transport.request_count(), 1);
        assert_eq!(
            transport.get_last_request().unwrap().header("authorization"),
            Some("Bearer saved")
        );
    }
}
