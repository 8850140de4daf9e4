//! Request interceptor.
//!
//! Wraps a transport. Requests sent with [`AuthMode::OAuth2`] get bearer
//! credentials attached; a 401 answer triggers a bounded number of retries
//! with a replacement token.

use std::sync::Arc;
use url::Url;

use super::cache::TokenCache;
use super::hooks::{is_step_up_challenge, Hooks};
use crate::builders::OAuth2MiddlewareBuilder;
use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::OAuth2Result;
use crate::provider::Provider;
use crate::telemetry::{LogContext, Logger, NoOpLogger};
use crate::types::{AccessToken, AuthMode, RequestOptions};

/// Default number of retries after a 401.
pub const DEFAULT_MAX_AUTH_RETRIES: u32 = 1;

const UNAUTHORIZED: u16 = 401;

/// OAuth2 middleware around an HTTP transport.
pub struct OAuth2Middleware<T: HttpTransport> {
    inner: Arc<T>,
    provider: Arc<dyn Provider>,
    cache: TokenCache,
    hooks: Hooks,
    max_auth_retries: u32,
    logger: Arc<dyn Logger>,
}

impl<T: HttpTransport> OAuth2Middleware<T> {
    /// Create new middleware forwarding to `inner`.
    pub fn new(inner: Arc<T>, provider: Arc<dyn Provider>, cache: TokenCache) -> Self {
        Self {
            inner,
            provider,
            cache,
            hooks: Hooks::default(),
            max_auth_retries: DEFAULT_MAX_AUTH_RETRIES,
            logger: Arc::new(NoOpLogger),
        }
    }

    /// Fluent builder.
    pub fn builder() -> OAuth2MiddlewareBuilder<T> {
        OAuth2MiddlewareBuilder::new()
    }

    /// Set hooks. Only the step-up hook is used here; the cache keeps its own.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the retry bound. `0` disables retries.
    pub fn with_max_auth_retries(mut self, max_auth_retries: u32) -> Self {
        self.max_auth_retries = max_auth_retries;
        self
    }

    /// Set logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// The token cache.
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// The provider.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &Arc<T> {
        &self.inner
    }

    /// Send a request, authenticating it when `options` ask for OAuth2.
    ///
    /// The response to the last attempt is returned as-is, including a final
    /// 401. Token acquisition and transport errors are returned as errors.
    pub async fn send(
        &self,
        request: HttpRequest,
        options: &RequestOptions,
    ) -> OAuth2Result<HttpResponse> {
        if !self.engages(&request, options) {
            return self.inner.send(request).await;
        }

        let context = LogContext::new()
            .provider(self.provider.name())
            .url(log_url(&request.url));

        let mut token = self.cache.get_token(None).await?;
        let mut response = self.inner.send(self.authorize(&request, &token)).await?;

        let mut retries = 0;
        while response.status == UNAUTHORIZED && retries < self.max_auth_retries {
            retries += 1;

            token = match &self.hooks.on_step_up {
                Some(step_up) if is_step_up_challenge(&response) => {
                    self.logger.info("Step-up authentication required", &context);
                    let stepped_up = step_up(response).await?;
                    self.cache.set_token(stepped_up.clone()).await;
                    stepped_up
                }
                _ => {
                    self.logger.info(
                        "Request unauthorized, retrying with a new token",
                        &context.clone().extra("attempt", retries.to_string()),
                    );
                    self.cache.get_token(Some(&token)).await?
                }
            };

            response = self.inner.send(self.authorize(&request, &token)).await?;
        }

        if response.status == UNAUTHORIZED && self.max_auth_retries > 0 {
            self.logger
                .warn("Request still unauthorized after retry", &context);
        }

        Ok(response)
    }

    fn engages(&self, request: &HttpRequest, options: &RequestOptions) -> bool {
        options.auth == AuthMode::OAuth2 && !same_url(&request.url, self.provider.token_endpoint())
    }

    fn authorize(&self, request: &HttpRequest, token: &AccessToken) -> HttpRequest {
        let mut request = request.clone();
        for (name, value) in self.provider.authorization_headers(token) {
            request.set_header(&name, value);
        }
        request
    }
}

impl<T: HttpTransport> std::fmt::Debug for OAuth2Middleware<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Middleware")
            .field("provider", &self.provider.name())
            .field("cache", &self.cache)
            .field("max_auth_retries", &self.max_auth_retries)
            .finish()
    }
}

/// Compare URLs after normalisation, or verbatim when either fails to parse.
fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// URL without query or fragment, for logging.
fn log_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockHttpTransport;
    use crate::error::{OAuth2Error, ProviderError};
    use crate::grant::{GrantOptions, GrantType};
    use crate::provider::{MockTokenRequester, PlatformProvider};
    use crate::telemetry::InMemoryLogger;
    use crate::types::ProviderConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RESOURCE: &str = "https://api.platform.sh/projects";

    fn middleware(
        transport: &Arc<MockHttpTransport>,
        requester: &Arc<MockTokenRequester>,
    ) -> OAuth2Middleware<MockHttpTransport> {
        let cache = TokenCache::new(
            requester.clone(),
            GrantType::ClientCredentials,
            GrantOptions::new(),
        );
        OAuth2Middleware::new(
            transport.clone(),
            Arc::new(PlatformProvider::new(ProviderConfig::default())),
            cache,
        )
    }

    fn step_up_challenge() -> HttpResponse {
        HttpResponse::new(401, "").with_header(
            "WWW-Authenticate",
            r#"Bearer error="insufficient_user_authentication", acr_values="mfa""#,
        )
    }

    fn authorizations(transport: &MockHttpTransport) -> Vec<Option<String>> {
        transport
            .get_requests()
            .iter()
            .map(|r| r.header("authorization").map(String::from))
            .collect()
    }

    #[tokio::test]
    async fn test_not_engaged_without_oauth2_option() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(401, ""));
        let requester = Arc::new(MockTokenRequester::new());
        let middleware = middleware(&transport, &requester);

        let response = middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(authorizations(&transport), vec![None]);
        assert_eq!(requester.request_count(), 0);
    }

    #[tokio::test]
    async fn test_token_endpoint_never_engaged() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(401, ""));
        let requester = Arc::new(MockTokenRequester::new());
        let middleware = middleware(&transport, &requester);

        let response = middleware
            .send(
                HttpRequest::post("https://auth.api.platform.sh/oauth2/token"),
                &RequestOptions::oauth2(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(requester.request_count(), 0);
    }

    #[tokio::test]
    async fn test_token_reused_across_requests() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(HttpResponse::new(200, "ok"));
        let requester = Arc::new(MockTokenRequester::new());
        let middleware = middleware(&transport, &requester);

        for _ in 0..3 {
            let response = middleware
                .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
                .await
                .unwrap();
            assert_eq!(response.status, 200);
        }

        assert_eq!(requester.request_count(), 1);
        assert!(authorizations(&transport)
            .iter()
            .all(|a| a.as_deref() == Some("Bearer mock-token-1")));
    }

    #[tokio::test]
    async fn test_existing_authorization_header_replaced() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(HttpResponse::new(200, "ok"));
        let requester = Arc::new(MockTokenRequester::new());
        let middleware = middleware(&transport, &requester);

        let request = HttpRequest::get(RESOURCE).with_header("AUTHORIZATION", "Basic abc");
        middleware
            .send(request, &RequestOptions::oauth2())
            .await
            .unwrap();

        let sent = transport.get_last_request().unwrap();
        assert_eq!(sent.headers.len(), 1);
        assert_eq!(sent.header("Authorization"), Some("Bearer mock-token-1"));
    }

    #[tokio::test]
    async fn test_single_retry_after_unauthorized() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(401, ""));
        transport.queue_response(HttpResponse::new(200, "ok"));
        let requester = Arc::new(MockTokenRequester::new());
        let middleware = middleware(&transport, &requester);

        let response = middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(requester.request_count(), 2);
        assert_eq!(
            authorizations(&transport),
            vec![
                Some("Bearer mock-token-1".to_string()),
                Some("Bearer mock-token-2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_unauthorized_returned_as_is() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(HttpResponse::new(401, "denied"));
        let requester = Arc::new(MockTokenRequester::new());
        let logger = Arc::new(InMemoryLogger::new());
        let middleware = middleware(&transport, &requester).with_logger(logger.clone());

        let response = middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert_eq!(response.body, "denied");
        assert_eq!(transport.request_count(), 2);
        assert!(logger
            .messages()
            .contains(&"Request still unauthorized after retry".to_string()));
    }

    #[tokio::test]
    async fn test_retry_bound_is_configurable() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.set_default_response(HttpResponse::new(401, ""));
        let requester = Arc::new(MockTokenRequester::new());

        let disabled = middleware(&transport, &requester).with_max_auth_retries(0);
        disabled
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await
            .unwrap();
        assert_eq!(transport.request_count(), 1);

        transport.clear_history();
        let patient = middleware(&transport, &requester).with_max_auth_retries(3);
        patient
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await
            .unwrap();
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn test_step_up_hook_invoked_once_on_challenge() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(step_up_challenge());
        transport.queue_response(HttpResponse::new(200, "ok"));
        let requester = Arc::new(MockTokenRequester::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let hooks = {
            let calls = calls.clone();
            Hooks::new().on_step_up(move |response| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    assert!(is_step_up_challenge(&response));
                    Ok(AccessToken::new("stepped-up"))
                }
            })
        };
        let middleware = middleware(&transport, &requester).with_hooks(hooks);

        let response = middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(requester.request_count(), 1);
        assert_eq!(
            transport.get_last_request().unwrap().header("authorization"),
            Some("Bearer stepped-up")
        );
        assert_eq!(
            middleware.cache().current_token().await.unwrap().secret(),
            "stepped-up"
        );
    }

    #[tokio::test]
    async fn test_step_up_hook_ignored_without_challenge() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(
            HttpResponse::new(401, "")
                .with_header("WWW-Authenticate", r#"Bearer error="invalid_token""#),
        );
        transport.queue_response(HttpResponse::new(200, "ok"));
        let requester = Arc::new(MockTokenRequester::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let hooks = {
            let calls = calls.clone();
            Hooks::new().on_step_up(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(AccessToken::new("unused")) }
            })
        };
        let middleware = middleware(&transport, &requester).with_hooks(hooks);

        middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(requester.request_count(), 2);
    }

    #[tokio::test]
    async fn test_challenge_without_hook_reacquires() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(step_up_challenge());
        transport.queue_response(HttpResponse::new(200, "ok"));
        let requester = Arc::new(MockTokenRequester::new());
        let middleware = middleware(&transport, &requester);

        let response = middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(requester.request_count(), 2);
    }

    #[tokio::test]
    async fn test_step_up_error_propagates() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(step_up_challenge());
        let requester = Arc::new(MockTokenRequester::new());
        let hooks = Hooks::new().on_step_up(|_| async {
            Err(OAuth2Error::Provider(ProviderError::InvalidGrant {
                message: "user declined".to_string(),
            }))
        });
        let middleware = middleware(&transport, &requester).with_hooks(hooks);

        let result = middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await;

        assert!(result.unwrap_err().is_provider_error());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_token_error_propagates_before_sending() {
        let transport = Arc::new(MockHttpTransport::new());
        let requester = Arc::new(MockTokenRequester::new());
        requester.queue_error(OAuth2Error::Provider(ProviderError::InvalidClient {
            message: "unknown client".to_string(),
        }));
        let middleware = middleware(&transport, &requester);

        let result = middleware
            .send(HttpRequest::get(RESOURCE), &RequestOptions::oauth2())
            .await;

        assert!(result.is_err());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_share_one_replacement() {
        let transport = Arc::new(MockHttpTransport::with_handler(|request| {
            if request.header("authorization") == Some("Bearer mock-token-1") {
                HttpResponse::new(401, "")
            } else {
                HttpResponse::new(200, "ok")
            }
        }));
        let requester = Arc::new(MockTokenRequester::new());
        let middleware = Arc::new(middleware(&transport, &requester));

        let options = RequestOptions::oauth2();
        let (a, b) = tokio::join!(
            middleware.send(HttpRequest::get(RESOURCE), &options),
            middleware.send(HttpRequest::get(RESOURCE), &options)
        );

        assert_eq!(a.unwrap().status, 200);
        assert_eq!(b.unwrap().status, 200);
        assert_eq!(requester.request_count(), 2);
    }

    #[test]
    fn test_same_url_normalises() {
        assert!(same_url(
            "https://AUTH.example.com/oauth2/token",
            "https://auth.example.com/oauth2/token"
        ));
        assert!(same_url("https://auth.example.com", "https://auth.example.com/"));
        assert!(!same_url(
            "https://auth.example.com/oauth2/token?x=1",
            "https://auth.example.com/oauth2/token"
        ));
        assert!(same_url("not a url", "not a url"));
    }

    #[test]
    fn test_log_url_drops_query() {
        assert_eq!(
            log_url("https://api.example.com/p?api_key=secret#frag"),
            "https://api.example.com/p"
        );
    }
}
