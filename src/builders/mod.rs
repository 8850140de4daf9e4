//! Builders
//!
//! Fluent builders for provider configuration and the middleware.

pub mod config;
pub mod middleware;

pub use config::{provider_config, ProviderConfigBuilder};
pub use middleware::OAuth2MiddlewareBuilder;
