//! Providers
//!
//! A provider knows its endpoints and how to build token requests and read
//! token responses. [`ProviderClient`] pairs a provider with a transport to
//! actually request tokens.

pub mod platform;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::{OAuth2Error, OAuth2Result, ProtocolError};
use crate::grant::{GrantOptions, GrantType};
use crate::types::{AccessToken, AuthorizationParams, AuthorizationUrl, ResourceOwner, TokenResponse};

pub use platform::PlatformProvider;

/// Provider capability interface.
pub trait Provider: Send + Sync {
    /// Short provider name, used in logs.
    fn name(&self) -> &str;

    /// Token endpoint URL.
    fn token_endpoint(&self) -> &str;

    /// Build the URL a user is redirected to for the authorization code grant.
    fn authorization_url(&self, params: AuthorizationParams) -> OAuth2Result<AuthorizationUrl>;

    /// URL returning the resource owner's details.
    fn resource_owner_details_url(&self, token: &AccessToken) -> OAuth2Result<String>;

    /// Build a token endpoint request for `grant`.
    fn build_token_request(
        &self,
        grant: &GrantType,
        options: &GrantOptions,
    ) -> OAuth2Result<HttpRequest>;

    /// Error carried by a token endpoint response, if any.
    fn parse_error(&self, response: &HttpResponse) -> Option<OAuth2Error>;

    /// Turn a token endpoint response into a token.
    fn parse_token_response(&self, response: &HttpResponse) -> OAuth2Result<AccessToken> {
        if let Some(error) = self.parse_error(response) {
            return Err(error);
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body).map_err(|e| {
            OAuth2Error::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;

        AccessToken::from_response(parsed).ok_or_else(|| {
            OAuth2Error::Protocol(ProtocolError::MissingField {
                field: "access_token".to_string(),
            })
        })
    }

    /// Headers that authenticate a resource request.
    fn authorization_headers(&self, token: &AccessToken) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", token.secret()),
        )]
    }

    /// Build a resource owner from the details response body.
    fn create_resource_owner(
        &self,
        data: HashMap<String, serde_json::Value>,
    ) -> OAuth2Result<ResourceOwner> {
        let id = match data.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => {
                return Err(OAuth2Error::Protocol(ProtocolError::MissingField {
                    field: "id".to_string(),
                }))
            }
        };
        Ok(ResourceOwner { id, data })
    }
}

/// Source of new tokens for a grant.
#[async_trait]
pub trait TokenRequester: Send + Sync {
    /// Request a token from the provider.
    async fn request_token(
        &self,
        grant: &GrantType,
        options: &GrantOptions,
    ) -> OAuth2Result<AccessToken>;
}

/// Sends provider requests through a transport.
pub struct ProviderClient<T: HttpTransport> {
    provider: Arc<dyn Provider>,
    transport: Arc<T>,
}

impl<T: HttpTransport> ProviderClient<T> {
    /// Create new provider client.
    pub fn new(provider: Arc<dyn Provider>, transport: Arc<T>) -> Self {
        Self {
            provider,
            transport,
        }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Request a token with `grant`.
    ///
    /// Provider errors come back as [`OAuth2Error::Provider`]; a one-time code
    /// challenge as [`OAuth2Error::TwoFactorRequired`].
    pub async fn get_access_token(
        &self,
        grant: &GrantType,
        options: &GrantOptions,
    ) -> OAuth2Result<AccessToken> {
        let request = self.provider.build_token_request(grant, options)?;
        let response = self.transport.send(request).await?;
        self.provider.parse_token_response(&response)
    }

    /// Fetch the resource owner's details.
    pub async fn get_resource_owner(&self, token: &AccessToken) -> OAuth2Result<ResourceOwner> {
        let mut request = HttpRequest::get(self.provider.resource_owner_details_url(token)?)
            .with_header("accept", "application/json");
        for (name, value) in self.provider.authorization_headers(token) {
            request.set_header(&name, value);
        }

        let response = self.transport.send(request).await?;
        if let Some(error) = self.provider.parse_error(&response) {
            return Err(error);
        }

        let data = serde_json::from_str(&response.body).map_err(|e| {
            OAuth2Error::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        self.provider.create_resource_owner(data)
    }
}

#[async_trait]
impl<T: HttpTransport> TokenRequester for ProviderClient<T> {
    async fn request_token(
        &self,
        grant: &GrantType,
        options: &GrantOptions,
    ) -> OAuth2Result<AccessToken> {
        self.get_access_token(grant, options).await
    }
}

/// Mock token requester for testing.
///
/// Queued results are returned in order; once empty, a fresh
/// `mock-token-N` token is issued per call.
#[derive(Default)]
pub struct MockTokenRequester {
    results: Mutex<VecDeque<OAuth2Result<AccessToken>>>,
    request_history: Mutex<Vec<(GrantType, GrantOptions)>>,
}

impl MockTokenRequester {
    /// Create new mock requester.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a token to return.
    pub fn queue_token(&self, token: AccessToken) -> &Self {
        self.results.lock().unwrap().push_back(Ok(token));
        self
    }

    /// Queue an error to return.
    pub fn queue_error(&self, error: OAuth2Error) -> &Self {
        self.results.lock().unwrap().push_back(Err(error));
        self
    }

    /// Get request history.
    pub fn get_request_history(&self) -> Vec<(GrantType, GrantOptions)> {
        self.request_history.lock().unwrap().clone()
    }

    /// Grants requested so far.
    pub fn grant_history(&self) -> Vec<GrantType> {
        self.request_history
            .lock()
            .unwrap()
            .iter()
            .map(|(grant, _)| grant.clone())
            .collect()
    }

    /// Number of requests so far.
    pub fn request_count(&self) -> usize {
        self.request_history.lock().unwrap().len()
    }
}

#[async_trait]
impl TokenRequester for MockTokenRequester {
    async fn request_token(
        &self,
        grant: &GrantType,
        options: &GrantOptions,
    ) -> OAuth2Result<AccessToken> {
        let count = {
            let mut history = self.request_history.lock().unwrap();
            history.push((grant.clone(), options.clone()));
            history.len()
        };

        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AccessToken::new(format!("mock-token-{}", count))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockHttpTransport;
    use crate::error::ProviderError;
    use crate::grant::{api_token_options, password_options};
    use crate::types::ProviderConfig;

    fn form(request: &HttpRequest) -> HashMap<String, String> {
        url::form_urlencoded::parse(request.body.as_deref().unwrap_or("").as_bytes())
            .into_owned()
            .collect()
    }

    fn client(transport: MockHttpTransport) -> ProviderClient<MockHttpTransport> {
        let provider = PlatformProvider::new(ProviderConfig::default());
        ProviderClient::new(Arc::new(provider), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_get_access_token_with_password() {
        let transport = MockHttpTransport::with_handler(|request| {
            let values = form(request);
            if values.get("username").map(String::as_str) != Some("foo")
                || values.get("password").map(String::as_str) != Some("bar")
            {
                return HttpResponse::new(401, r#"{"error": "invalid_grant"}"#);
            }
            HttpResponse::json(200, &serde_json::json!({"access_token": "T1"}))
        });
        let client = client(transport);

        let token = client
            .get_access_token(&GrantType::Password, &password_options("foo", "bar"))
            .await
            .unwrap();
        assert_eq!(token.secret(), "T1");

        let result = client
            .get_access_token(&GrantType::Password, &password_options("foo", "bar2"))
            .await;
        match result {
            Err(OAuth2Error::Provider(error)) => assert_eq!(error.code(), "invalid_grant"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_access_token_with_api_token() {
        let transport = MockHttpTransport::with_handler(|request| {
            if form(request).get("api_token").map(String::as_str) != Some("abcdef") {
                return HttpResponse::new(
                    401,
                    r#"{"error": "invalid_grant", "error_description": "Invalid API token."}"#,
                );
            }
            HttpResponse::json(200, &serde_json::json!({"access_token": 123}))
        });
        let client = client(transport);

        let token = client
            .get_access_token(&GrantType::ApiToken, &api_token_options("abcdef"))
            .await
            .unwrap();
        assert_eq!(token.secret(), "123");

        let error = client
            .get_access_token(&GrantType::ApiToken, &api_token_options("nope"))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Provider error: Invalid API token.");
    }

    #[tokio::test]
    async fn test_two_factor_required() {
        let transport = MockHttpTransport::new();
        transport.queue_response(
            HttpResponse::new(401, r#"{"error": "invalid_grant"}"#)
                .with_header("X-Drupal-TFA", "1"),
        );
        transport.queue_json_response(200, &serde_json::json!({"access_token": "with-code"}));
        let transport = Arc::new(transport);
        let provider = Arc::new(PlatformProvider::new(ProviderConfig::default()));
        let client = ProviderClient::new(provider, transport.clone());

        let error = client
            .get_access_token(&GrantType::PasswordWithTfa, &password_options("foo", "bar"))
            .await
            .unwrap_err();
        assert!(error.is_two_factor_required());

        let options = password_options("foo", "bar").with("totp", "123456");
        let token = client
            .get_access_token(&GrantType::PasswordWithTfa, &options)
            .await
            .unwrap();
        assert_eq!(token.secret(), "with-code");

        let retried = transport.get_last_request().unwrap();
        assert_eq!(retried.header("x-drupal-tfa"), Some("123456"));
        assert!(!form(&retried).contains_key("totp"));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let client = client(MockHttpTransport::new());
        let result = client
            .get_access_token(&GrantType::ClientCredentials, &GrantOptions::new())
            .await;
        assert!(matches!(result, Err(OAuth2Error::Network(_))));
    }

    #[tokio::test]
    async fn test_missing_access_token_field() {
        let transport = MockHttpTransport::new();
        transport.queue_json_response(200, &serde_json::json!({"token_type": "Bearer"}));
        let result = client(transport)
            .get_access_token(&GrantType::ClientCredentials, &GrantOptions::new())
            .await;
        assert!(matches!(
            result,
            Err(OAuth2Error::Protocol(ProtocolError::MissingField { .. }))
        ));
    }

    #[tokio::test]
    async fn test_get_resource_owner() {
        let transport = MockHttpTransport::new();
        transport.queue_json_response(200, &serde_json::json!({"id": "user-1", "username": "foo"}));
        let transport = Arc::new(transport);
        let provider = Arc::new(PlatformProvider::new(ProviderConfig::default()));
        let client = ProviderClient::new(provider, transport.clone());

        let owner = client
            .get_resource_owner(&AccessToken::new("abc"))
            .await
            .unwrap();
        assert_eq!(owner.id, "user-1");
        assert_eq!(owner.data["username"], "foo");

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, "https://api.platform.sh/users/me");
        assert_eq!(request.header("authorization"), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_mock_requester() {
        let requester = MockTokenRequester::new();
        requester.queue_error(OAuth2Error::Provider(ProviderError::InvalidGrant {
            message: "nope".to_string(),
        }));

        let first = requester
            .request_token(&GrantType::ClientCredentials, &GrantOptions::new())
            .await;
        assert!(first.is_err());

        let second = requester
            .request_token(&GrantType::RefreshToken, &GrantOptions::new())
            .await
            .unwrap();
        assert_eq!(second.secret(), "mock-token-2");
        assert_eq!(
            requester.grant_history(),
            vec![GrantType::ClientCredentials, GrantType::RefreshToken]
        );
    }
}
