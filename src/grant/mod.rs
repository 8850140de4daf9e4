//! Grants
//!
//! Named OAuth2 grants and the parameters they require.

pub mod tfa;

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeMap;

use crate::error::{ConfigurationError, OAuth2Error, OAuth2Result};

/// Grant type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantType {
    /// `client_credentials`.
    ClientCredentials,
    /// `password`: username and password.
    Password,
    /// `password` with an optional `totp` option sent as a header.
    PasswordWithTfa,
    /// `refresh_token`.
    RefreshToken,
    /// `api_token`: exchange a long-lived API token.
    ApiToken,
    /// `authorization_code`.
    AuthorizationCode,
    /// Any other grant.
    Custom {
        name: String,
        required: Vec<String>,
    },
}

impl GrantType {
    /// The `grant_type` value sent to the token endpoint.
    pub fn name(&self) -> &str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::Password | Self::PasswordWithTfa => "password",
            Self::RefreshToken => "refresh_token",
            Self::ApiToken => "api_token",
            Self::AuthorizationCode => "authorization_code",
            Self::Custom { name, .. } => name,
        }
    }

    /// Options that must be present.
    pub fn required_parameters(&self) -> Vec<&str> {
        match self {
            Self::ClientCredentials => Vec::new(),
            Self::Password | Self::PasswordWithTfa => vec!["username", "password"],
            Self::RefreshToken => vec!["refresh_token"],
            Self::ApiToken => vec!["api_token"],
            Self::AuthorizationCode => vec!["code"],
            Self::Custom { required, .. } => required.iter().map(String::as_str).collect(),
        }
    }

    /// Body parameters for a token request: `defaults`, then `grant_type`,
    /// then the options. Options override defaults with the same name.
    ///
    /// The TFA grant keeps its `totp` option out of the body.
    pub fn prepare_request_parameters(
        &self,
        defaults: Vec<(String, String)>,
        options: &GrantOptions,
    ) -> OAuth2Result<Vec<(String, String)>> {
        for field in self.required_parameters() {
            if options.get(field).map_or(true, str::is_empty) {
                return Err(OAuth2Error::Configuration(
                    ConfigurationError::MissingRequired {
                        field: field.to_string(),
                    },
                ));
            }
        }

        let mut params: BTreeMap<String, String> = defaults.into_iter().collect();
        params.insert("grant_type".to_string(), self.name().to_string());
        for (key, value) in options.iter() {
            if *self == Self::PasswordWithTfa && key == tfa::TOTP_OPTION {
                continue;
            }
            params.insert(key.to_string(), value.to_string());
        }

        Ok(params.into_iter().collect())
    }
}

impl Default for GrantType {
    fn default() -> Self {
        Self::ClientCredentials
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Grant options. Values are kept secret and redacted in `Debug`.
#[derive(Clone, Default)]
pub struct GrantOptions {
    params: BTreeMap<String, SecretString>,
}

impl GrantOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an option.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params
            .insert(key.into(), SecretString::new(value.into()));
    }

    /// Get an option value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.expose_secret().as_str())
    }

    /// Iterate over options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.expose_secret().as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl std::fmt::Debug for GrantOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.params.keys().map(|k| (k, "[REDACTED]")))
            .finish()
    }
}

/// Options for the password grant.
pub fn password_options(username: impl Into<String>, password: impl Into<String>) -> GrantOptions {
    GrantOptions::new()
        .with("username", username)
        .with("password", password)
}

/// Options for the API-token grant.
pub fn api_token_options(api_token: impl Into<String>) -> GrantOptions {
    GrantOptions::new().with("api_token", api_token)
}
