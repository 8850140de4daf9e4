//! OAuth2 Error Types
//!
//! Error hierarchy for token acquisition and request interception.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the middleware.
#[derive(Error, Debug)]
pub enum OAuth2Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Two-factor authentication required: {message}")]
    TwoFactorRequired { message: String },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl OAuth2Error {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "OAUTH2_CONFIG",
            Self::Provider(_) => "OAUTH2_PROVIDER",
            Self::TwoFactorRequired { .. } => "OAUTH2_TFA_REQUIRED",
            Self::Network(_) => "OAUTH2_NETWORK",
            Self::Protocol(_) => "OAUTH2_PROTOCOL",
        }
    }

    /// Whether this error came back from the token endpoint as an OAuth2 error.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider(_))
    }

    /// Whether the caller should prompt for a one-time code and retry the grant.
    pub fn is_two_factor_required(&self) -> bool {
        matches!(self, Self::TwoFactorRequired { .. })
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(ProviderError::TemporarilyUnavailable { retry_after, .. }) => {
                *retry_after
            }
            _ => None,
        }
    }

    /// Check if error requires the user to sign in again.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError::InvalidGrant { .. })
                | Self::Provider(ProviderError::InvalidClient { .. })
                | Self::TwoFactorRequired { .. }
        )
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Required parameter not passed: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("TLS error: {message}")]
    TlsError { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Refusing to send {what} over a non-HTTPS request to {url}")]
    InsecureRequest { what: String, url: String },
}

/// Provider (OAuth2 server) error.
///
/// `message` holds the `error_description` when the provider sent one and
/// falls back to the error code otherwise.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{message}")]
    InvalidClient { message: String },

    #[error("{message}")]
    InvalidGrant { message: String },

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("{message}")]
    InvalidScope { message: String },

    #[error("{message}")]
    UnauthorizedClient { message: String },

    #[error("{message}")]
    UnsupportedGrantType { message: String },

    #[error("{message}")]
    ServerError { message: String },

    #[error("{message}")]
    TemporarilyUnavailable {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("{message}")]
    Other { code: String, message: String },
}

impl ProviderError {
    /// Machine-readable OAuth2 error code.
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::ServerError { .. } => "server_error",
            Self::TemporarilyUnavailable { .. } => "temporarily_unavailable",
            Self::Other { code, .. } => code,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        match self {
            Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::InvalidRequest { message }
            | Self::InvalidScope { message }
            | Self::UnauthorizedClient { message }
            | Self::UnsupportedGrantType { message }
            | Self::ServerError { message }
            | Self::TemporarilyUnavailable { message, .. }
            | Self::Other { message, .. } => message,
        }
    }
}

/// Result type for OAuth2 operations.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// OAuth2 error response from provider.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Map token error response to error type.
pub fn map_token_error(response: &OAuth2ErrorResponse) -> ProviderError {
    let message = response
        .error_description
        .clone()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| response.error.clone());

    match response.error.as_str() {
        "invalid_client" => ProviderError::InvalidClient { message },
        "invalid_grant" => ProviderError::InvalidGrant { message },
        "invalid_request" => ProviderError::InvalidRequest { message },
        "invalid_scope" => ProviderError::InvalidScope { message },
        "unauthorized_client" => ProviderError::UnauthorizedClient { message },
        "unsupported_grant_type" => ProviderError::UnsupportedGrantType { message },
        "server_error" => ProviderError::ServerError { message },
        "temporarily_unavailable" => ProviderError::TemporarilyUnavailable {
            message,
            retry_after: None,
        },
        other => ProviderError::Other {
            code: other.to_string(),
            message,
        },
    }
}

/// Parse error response from HTTP body.
///
/// Bodies whose `error` field is missing or empty are not error responses.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str::<OAuth2ErrorResponse>(body)
        .ok()
        .filter(|response| !response.error.is_empty())
}

/// Create error from HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> OAuth2Error {
    if let Some(response) = parse_error_response(body) {
        return OAuth2Error::Provider(map_token_error(&response));
    }

    let error = match status {
        400 => ProviderError::InvalidRequest {
            message: "Bad request".to_string(),
        },
        401 => ProviderError::InvalidClient {
            message: "Unauthorized".to_string(),
        },
        403 => ProviderError::UnauthorizedClient {
            message: "Forbidden".to_string(),
        },
        429 => ProviderError::TemporarilyUnavailable {
            message: "Too many requests".to_string(),
            retry_after: Some(Duration::from_secs(60)),
        },
        _ => ProviderError::ServerError {
            message: format!("HTTP {}", status),
        },
    };

    OAuth2Error::Provider(error)
}

/// Get user-friendly error message.
pub fn get_user_message(error: &OAuth2Error) -> String {
    match error {
        OAuth2Error::TwoFactorRequired { .. } => {
            "Two-factor authentication is required. Please enter your one-time code.".to_string()
        }
        OAuth2Error::Provider(ProviderError::InvalidGrant { .. }) => {
            "Your credentials were rejected. Please sign in again.".to_string()
        }
        OAuth2Error::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        OAuth2Error::Provider(ProviderError::ServerError { .. })
        | OAuth2Error::Provider(ProviderError::TemporarilyUnavailable { .. }) => {
            "The authentication service is temporarily unavailable. Please try again later."
                .to_string()
        }
        OAuth2Error::Protocol(ProtocolError::InsecureRequest { .. }) => {
            "A secure (HTTPS) connection is required for this operation.".to_string()
        }
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after() {
        let error = create_error_from_response(429, "");
        assert_eq!(error.retry_after(), Some(Duration::from_secs(60)));
        assert_eq!(
            get_user_message(&error),
            "The authentication service is temporarily unavailable. Please try again later."
        );

        let error = OAuth2Error::Provider(ProviderError::TemporarilyUnavailable {
            message: "busy".to_string(),
            retry_after: Some(Duration::from_secs(10)),
        });
        assert_eq!(error.retry_after(), Some(Duration::from_secs(10)));

        let error = OAuth2Error::TwoFactorRequired {
            message: "code".to_string(),
        };
        assert_eq!(error.retry_after(), None);
    }

    #[test]
    fn test_needs_reauth() {
        let error = OAuth2Error::Provider(ProviderError::InvalidGrant {
            message: "expired".to_string(),
        });
        assert!(error.needs_reauth());
        assert!(!OAuth2Error::Network(NetworkError::ConnectionFailed {
            message: "refused".to_string()
        })
        .needs_reauth());
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":"invalid_grant","error_description":"The token is expired"}"#;
        let response = parse_error_response(body).unwrap();
        assert_eq!(response.error, "invalid_grant");
        assert_eq!(
            response.error_description,
            Some("The token is expired".to_string())
        );

        assert!(parse_error_response(r#"{"error":""}"#).is_none());
        assert!(parse_error_response(r#"{"access_token":"abc"}"#).is_none());
    }

    #[test]
    fn test_map_token_error_falls_back_to_code() {
        let error = create_error_from_response(401, r#"{"error": "invalid_grant"}"#);
        match error {
            OAuth2Error::Provider(provider) => {
                assert_eq!(provider.code(), "invalid_grant");
                assert_eq!(provider.description(), "invalid_grant");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_error_code_is_preserved() {
        let response = OAuth2ErrorResponse {
            error: "mfa_locked".to_string(),
            error_description: Some("Account locked".to_string()),
            error_uri: None,
        };
        let error = map_token_error(&response);
        assert_eq!(error.code(), "mfa_locked");
        assert_eq!(error.to_string(), "Account locked");
    }

    #[test]
    fn test_status_fallback_without_body() {
        let error = create_error_from_response(503, "");
        assert_eq!(error.error_code(), "OAUTH2_PROVIDER");
        assert!(matches!(
            error,
            OAuth2Error::Provider(ProviderError::ServerError { .. })
        ));
    }
}
