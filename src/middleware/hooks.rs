//! Lifecycle hooks.
//!
//! Every hook is optional. Builder methods consume and return the set, so a
//! shared `Hooks` value can be cloned and extended per middleware.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

use crate::core::HttpResponse;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::types::AccessToken;

/// Called with every token installed as current.
pub type TokenSaveHook = Arc<dyn Fn(&AccessToken) + Send + Sync>;

/// Called with the refresh credential before a refresh. Returning a token
/// skips the refresh request.
pub type RefreshStartHook =
    Arc<dyn Fn(String) -> BoxFuture<'static, Option<AccessToken>> + Send + Sync>;

/// Called with the refresh credential once a refresh attempt has finished.
pub type RefreshEndHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Called when the provider rejects a refresh. Returning a token recovers.
pub type RefreshErrorHook = Arc<dyn Fn(&OAuth2Error) -> Option<AccessToken> + Send + Sync>;

/// Called with a step-up challenge response. Must produce a new token.
pub type StepUpHook =
    Arc<dyn Fn(HttpResponse) -> BoxFuture<'static, OAuth2Result<AccessToken>> + Send + Sync>;

/// Hook set for a middleware.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) on_token_save: Option<TokenSaveHook>,
    pub(crate) on_refresh_start: Option<RefreshStartHook>,
    pub(crate) on_refresh_end: Option<RefreshEndHook>,
    pub(crate) on_refresh_error: Option<RefreshErrorHook>,
    pub(crate) on_step_up: Option<StepUpHook>,
}

impl Hooks {
    /// Empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_token_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AccessToken) + Send + Sync + 'static,
    {
        self.on_token_save = Some(Arc::new(hook));
        self
    }

    pub fn on_refresh_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<AccessToken>> + Send + 'static,
    {
        self.on_refresh_start = Some(Arc::new(move |refresh_token| hook(refresh_token).boxed()));
        self
    }

    pub fn on_refresh_end<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_refresh_end = Some(Arc::new(hook));
        self
    }

    pub fn on_refresh_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OAuth2Error) -> Option<AccessToken> + Send + Sync + 'static,
    {
        self.on_refresh_error = Some(Arc::new(hook));
        self
    }

    pub fn on_step_up<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HttpResponse) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OAuth2Result<AccessToken>> + Send + 'static,
    {
        self.on_step_up = Some(Arc::new(move |response| hook(response).boxed()));
        self
    }

    /// Whether a step-up hook is configured.
    pub fn has_step_up(&self) -> bool {
        self.on_step_up.is_some()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("on_token_save", &self.on_token_save.is_some())
            .field("on_refresh_start", &self.on_refresh_start.is_some())
            .field("on_refresh_end", &self.on_refresh_end.is_some())
            .field("on_refresh_error", &self.on_refresh_error.is_some())
            .field("on_step_up", &self.on_step_up.is_some())
            .finish()
    }
}

/// Whether a 401 response is an RFC 9470 step-up challenge.
pub fn is_step_up_challenge(response: &HttpResponse) -> bool {
    response
        .header("www-authenticate")
        .map(|value| {
            value.to_ascii_lowercase().contains("bearer")
                && value.contains("insufficient_user_authentication")
        })
        .unwrap_or(false)
}
