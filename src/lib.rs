//! OAuth2 Bearer Middleware
//!
//! Middleware for an HTTP client that attaches OAuth2 bearer tokens to
//! outbound requests, obtains and refreshes them transparently, and retries
//! once with a new token when a request is answered with 401.
//!
//! # Features
//!
//! - Token cache with expiry, refresh-token preference and primary-grant fallback
//! - Bounded 401 retry, coalesced across concurrent requests
//! - Step-up authentication challenges (RFC 9470)
//! - Password grant with two-factor codes, API-token grant, client credentials
//! - Lifecycle hooks for persistence and refresh coordination
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oauth2_middleware::{
//!     api_token_options, provider_config, GrantType, HttpRequest, OAuth2Middleware,
//!     RequestOptions, ReqwestHttpTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = provider_config()
//!         .client_id("platform-cli")
//!         .build_provider()?;
//!
//!     let middleware = OAuth2Middleware::builder()
//!         .provider(provider)
//!         .transport(Arc::new(ReqwestHttpTransport::new()?))
//!         .grant(GrantType::ApiToken, api_token_options("my-api-token"))
//!         .build()?;
//!
//!     let response = middleware
//!         .send(
//!             HttpRequest::get("https://api.platform.sh/projects"),
//!             &RequestOptions::oauth2(),
//!         )
//!         .await?;
//!
//!     println!("{} {}", response.status, response.body);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: tokens, provider configuration and per-request options
//! - `error`: error hierarchy with token endpoint error mapping
//! - `core`: HTTP transport abstraction
//! - `grant`: grant types, their options and the two-factor extension
//! - `provider`: provider interface, Platform.sh provider and token requests
//! - `middleware`: token cache, hooks and the request interceptor
//! - `builders`: fluent builders for configuration and middleware
//! - `telemetry`: logging

pub mod builders;
pub mod core;
pub mod error;
pub mod grant;
pub mod middleware;
pub mod provider;
pub mod telemetry;
pub mod types;

// Re-export builders
pub use builders::{provider_config, OAuth2MiddlewareBuilder, ProviderConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, map_token_error, parse_error_response,
    ConfigurationError, NetworkError, OAuth2Error, OAuth2ErrorResponse, OAuth2Result,
    ProtocolError, ProviderError,
};

// Re-export types
pub use types::{
    // Config
    AuthMode, ClientAuthMethod, ClientCredentials, EndpointOptions, ProviderConfig,
    ProviderEndpoints, RequestOptions,
    // Token
    AccessToken, StoredToken, TokenResponse,
    // Auth
    AuthorizationParams, AuthorizationUrl, ResourceOwner,
};

// Re-export core components
pub use core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport};

// Re-export grants
pub use grant::{api_token_options, password_options, tfa, GrantOptions, GrantType};

// Re-export providers
pub use provider::{
    MockTokenRequester, PlatformProvider, Provider, ProviderClient, TokenRequester,
};

// Re-export middleware
pub use middleware::{is_step_up_challenge, Hooks, OAuth2Middleware, TokenCache};

// Re-export telemetry
pub use telemetry::{InMemoryLogger, LogContext, LogEntry, LogLevel, Logger, NoOpLogger, TracingLogger};
