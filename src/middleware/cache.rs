//! Token cache and acquirer.
//!
//! Holds the current access token and replaces it when it goes stale. The
//! slot lock is held from the staleness check through acquisition and swap,
//! so callers racing on the same stale token trigger a single acquisition.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::hooks::{Hooks, RefreshEndHook};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::grant::{GrantOptions, GrantType};
use crate::provider::TokenRequester;
use crate::telemetry::{LogContext, Logger, NoOpLogger};
use crate::types::AccessToken;

/// Fires the refresh-end hook when dropped, including on error and
/// cancellation.
struct RefreshEndGuard {
    hook: Option<RefreshEndHook>,
    refresh_token: String,
}

impl Drop for RefreshEndGuard {
    fn drop(&mut self) {
        if let Some(hook) = &self.hook {
            hook(&self.refresh_token);
        }
    }
}

/// Current-token slot plus the means to replace it.
pub struct TokenCache {
    requester: Arc<dyn TokenRequester>,
    grant: GrantType,
    grant_options: GrantOptions,
    hooks: Hooks,
    leeway: Duration,
    logger: Arc<dyn Logger>,
    current: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    /// Create new cache acquiring tokens with `grant` and `grant_options`.
    pub fn new(
        requester: Arc<dyn TokenRequester>,
        grant: GrantType,
        grant_options: GrantOptions,
    ) -> Self {
        Self {
            requester,
            grant,
            grant_options,
            hooks: Hooks::default(),
            leeway: Duration::ZERO,
            logger: Arc::new(NoOpLogger),
            current: Mutex::new(None),
        }
    }

    /// Set hooks.
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Treat tokens expiring within `leeway` as expired.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Set logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Start with `token` as current. The save hook is not fired.
    pub fn with_initial_token(mut self, token: AccessToken) -> Self {
        self.current = Mutex::new(Some(token));
        self
    }

    /// The primary grant.
    pub fn grant(&self) -> &GrantType {
        &self.grant
    }

    /// Return the current token, or acquire a new one.
    ///
    /// A new token is acquired when there is none, when the current one is
    /// expired, or when it is the same instance as `excluding`.
    pub async fn get_token(&self, excluding: Option<&AccessToken>) -> OAuth2Result<AccessToken> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            let superseded = excluding.map_or(false, |e| token.same_instance(e));
            if !superseded && !token.is_expired_within(self.leeway) {
                return Ok(token.clone());
            }
        }

        let token = self.acquire_replacing(current.as_ref()).await?;
        self.install(&mut current, token.clone());
        Ok(token)
    }

    /// Acquire and install a new token regardless of the current one.
    pub async fn acquire(&self) -> OAuth2Result<AccessToken> {
        let mut current = self.current.lock().await;
        let token = self.acquire_replacing(current.as_ref()).await?;
        self.install(&mut current, token.clone());
        Ok(token)
    }

    /// Install `token` as current.
    pub async fn set_token(&self, token: AccessToken) {
        let mut current = self.current.lock().await;
        self.install(&mut current, token);
    }

    /// Snapshot of the current token.
    pub async fn current_token(&self) -> Option<AccessToken> {
        self.current.lock().await.clone()
    }

    fn install(&self, slot: &mut Option<AccessToken>, token: AccessToken) {
        if let Some(hook) = &self.hooks.on_token_save {
            hook(&token);
        }
        *slot = Some(token);
    }

    async fn acquire_replacing(&self, previous: Option<&AccessToken>) -> OAuth2Result<AccessToken> {
        match previous.and_then(AccessToken::refresh_token) {
            Some(refresh_token) => self.refresh(refresh_token.to_string()).await,
            None => self.request_primary().await,
        }
    }

    async fn request_primary(&self) -> OAuth2Result<AccessToken> {
        let context = LogContext::new()
            .operation("acquire_token")
            .grant_type(self.grant.name());
        self.logger.debug("Requesting access token", &context);

        match self
            .requester
            .request_token(&self.grant, &self.grant_options)
            .await
        {
            Ok(token) => {
                self.logger.info("Access token acquired", &context);
                Ok(token)
            }
            Err(error) => {
                self.logger.error(
                    "Access token request failed",
                    &context.extra("error_code", error.error_code()),
                );
                Err(error)
            }
        }
    }

    async fn refresh(&self, refresh_token: String) -> OAuth2Result<AccessToken> {
        let _end = RefreshEndGuard {
            hook: self.hooks.on_refresh_end.clone(),
            refresh_token: refresh_token.clone(),
        };
        let context = LogContext::new()
            .operation("refresh_token")
            .grant_type(GrantType::RefreshToken.name());
        self.logger.debug("Refreshing access token", &context);

        if let Some(start) = &self.hooks.on_refresh_start {
            if let Some(token) = start(refresh_token.clone()).await {
                self.logger
                    .debug("Refresh satisfied by refresh-start hook", &context);
                return Ok(token);
            }
        }

        let options = GrantOptions::new().with("refresh_token", refresh_token.clone());
        match self
            .requester
            .request_token(&GrantType::RefreshToken, &options)
            .await
        {
            Ok(token) => {
                self.logger.info("Access token refreshed", &context);
                if token.refresh_token().is_some() {
                    Ok(token)
                } else {
                    Ok(token.with_refresh_token(refresh_token))
                }
            }
            Err(error @ OAuth2Error::Provider(_)) => {
                self.logger.warn(
                    "Token refresh rejected",
                    &context.clone().extra("error_code", error.error_code()),
                );
                match self
                    .hooks
                    .on_refresh_error
                    .as_ref()
                    .and_then(|hook| hook(&error))
                {
                    Some(token) => {
                        self.logger
                            .info("Refresh recovered by refresh-error hook", &context);
                        Ok(token)
                    }
                    None => Err(error),
                }
            }
            Err(error) => {
                self.logger.error(
                    "Token refresh failed",
                    &context.extra("error_code", error.error_code()),
                );
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("grant", &self.grant)
            .field("grant_options", &self.grant_options)
            .field("hooks", &self.hooks)
            .field("leeway", &self.leeway)
            .finish()
    }
}
