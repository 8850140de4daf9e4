//! Middleware
//!
//! The token cache and the request interceptor built on it.

pub mod cache;
pub mod hooks;
pub mod interceptor;

pub use cache::TokenCache;
pub use hooks::{
    is_step_up_challenge, Hooks, RefreshEndHook, RefreshErrorHook, RefreshStartHook, StepUpHook,
    TokenSaveHook,
};
pub use interceptor::{OAuth2Middleware, DEFAULT_MAX_AUTH_RETRIES};
