//! Authorization Types
//!
//! Authorization URL and resource owner types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for authorization URL generation.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationParams {
    /// Redirect URI (overrides the configured one).
    pub redirect_uri: Option<String>,
    /// Requested scopes (overrides default).
    pub scopes: Option<Vec<String>>,
    /// Custom state value (auto-generated if not provided).
    pub state: Option<String>,
    /// Additional parameters.
    pub extra_params: HashMap<String, String>,
}

/// Result of authorization URL generation.
#[derive(Clone, Debug)]
pub struct AuthorizationUrl {
    /// The authorization URL to redirect user to.
    pub url: String,
    /// State parameter for CSRF validation.
    pub state: String,
}

/// Account details returned by the resource owner endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceOwner {
    /// Owner identifier (the `id` field).
    pub id: String,
    /// Full response body.
    pub data: HashMap<String, serde_json::Value>,
}
