//! Token Types
//!
//! OAuth2 token type definitions.

use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

fn next_instance() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

/// Token response from authorization server.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenResponse {
    /// Access token. Some providers send it as a number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub access_token: Option<String>,
    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,
    /// Expires in seconds.
    #[serde(default, deserialize_with = "seconds")]
    pub expires_in: Option<i64>,
    /// Absolute expiry as a unix timestamp, used when `expires_in` is absent.
    #[serde(default, deserialize_with = "seconds")]
    pub expires: Option<i64>,
    /// Refresh token.
    #[serde(default, deserialize_with = "string_or_number")]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Expiry `secs` seconds after `now`.
///
/// Past the representable range a positive lifetime means no expiry and a
/// negative one means already expired.
fn expiry_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    match Duration::try_seconds(secs).and_then(|delta| now.checked_add_signed(delta)) {
        Some(expires_at) => Some(expires_at),
        None if secs < 0 => Some(now),
        None => None,
    }
}

/// An issued access token.
///
/// Tokens are immutable. Every constructor and `with_*` method yields a new
/// instance with its own identity; clones share the identity of their source.
/// Use [`AccessToken::same_instance`] to ask "is this the token that failed",
/// since two separately issued tokens may carry the same string.
#[derive(Clone)]
pub struct AccessToken {
    instance: u64,
    value: SecretString,
    refresh_token: Option<SecretString>,
    token_type: String,
    expires_at: Option<DateTime<Utc>>,
    scopes: Vec<String>,
    values: HashMap<String, serde_json::Value>,
}

impl AccessToken {
    /// Create new bearer token without expiry.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            instance: next_instance(),
            value: SecretString::new(value.into()),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_at: None,
            scopes: Vec::new(),
            values: HashMap::new(),
        }
    }

    /// Build a token from a successful token endpoint response.
    ///
    /// Returns `None` when the response carries no access token.
    pub fn from_response(response: TokenResponse) -> Option<Self> {
        let value = response.access_token?;
        let now = Utc::now();

        let expires_at = match (response.expires_in, response.expires) {
            (Some(secs), _) => expiry_after(now, secs),
            (None, Some(ts)) => Utc.timestamp_opt(ts, 0).single(),
            (None, None) => None,
        };

        let scopes = response
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        Some(Self {
            instance: next_instance(),
            value: SecretString::new(value),
            refresh_token: response.refresh_token.map(SecretString::new),
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            scopes,
            values: response.extra,
        })
    }

    /// Copy with a refresh credential.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::new(refresh_token.into()));
        self.instance = next_instance();
        self
    }

    /// Copy with an absolute expiry.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self.instance = next_instance();
        self
    }

    /// Copy expiring `secs` seconds from now. A lifetime too long to
    /// represent never expires, and one too far negative is already expired.
    pub fn with_expires_in(mut self, secs: i64) -> Self {
        self.expires_at = expiry_after(Utc::now(), secs);
        self.instance = next_instance();
        self
    }

    /// Copy with a different token type.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self.instance = next_instance();
        self
    }

    /// Copy with granted scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self.instance = next_instance();
        self
    }

    /// Whether both handles refer to the same issued token.
    pub fn same_instance(&self, other: &AccessToken) -> bool {
        self.instance == other.instance
    }

    /// Get token value (for Authorization header).
    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    /// Refresh credential, if the provider issued one.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// Token type.
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Expiration time.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Granted scopes.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Extra values returned alongside the token.
    pub fn values(&self) -> &HashMap<String, serde_json::Value> {
        &self.values
    }

    /// Check if token is expired. Tokens without expiry never expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_within(std::time::Duration::ZERO)
    }

    /// Check if token expires within `leeway` from now.
    pub fn is_expired_within(&self, leeway: std::time::Duration) -> bool {
        let Some(exp) = self.expires_at else {
            return false;
        };
        match Duration::from_std(leeway)
            .ok()
            .and_then(|leeway| Utc::now().checked_add_signed(leeway))
        {
            Some(deadline) => exp <= deadline,
            None => true,
        }
    }

    /// Get time until expiration.
    pub fn expires_in(&self) -> Option<std::time::Duration> {
        self.expires_at.and_then(|exp| {
            let now = Utc::now();
            if exp > now {
                (exp - now).to_std().ok()
            } else {
                None
            }
        })
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value.expose_secret())
    }

    /// Snapshot for external persistence.
    pub fn to_stored(&self) -> StoredToken {
        StoredToken {
            access_token: self.value.expose_secret().clone(),
            token_type: self.token_type.clone(),
            expires_at: self.expires_at,
            refresh_token: self.refresh_token().map(String::from),
            scopes: self.scopes.clone(),
            stored_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("instance", &self.instance)
            .field("value", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Serializable token snapshot, handed to a save hook for persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub stored_at: DateTime<Utc>,
}

impl From<StoredToken> for AccessToken {
    /// Restoring always yields a fresh instance.
    fn from(stored: StoredToken) -> Self {
        Self {
            instance: next_instance(),
            value: SecretString::new(stored.access_token),
            refresh_token: stored.refresh_token.map(SecretString::new),
            token_type: stored.token_type,
            expires_at: stored.expires_at,
            scopes: stored.scopes,
            values: HashMap::new(),
        }
    }
}
