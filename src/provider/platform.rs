//! Platform.sh-style provider.
//!
//! Standard form-encoded token requests, errors reported through
//! `error`/`error_description`, bearer authorization and the two-factor
//! header extension. Endpoints default to the Platform.sh auth service and
//! are all overridable through [`ProviderConfig`].

use base64::Engine;
use rand::Rng;
use secrecy::ExposeSecret;
use url::Url;

use super::Provider;
use crate::core::{HttpRequest, HttpResponse};
use crate::error::{
    create_error_from_response, map_token_error, parse_error_response, ConfigurationError,
    OAuth2Error, OAuth2Result,
};
use crate::grant::{tfa, GrantOptions, GrantType};
use crate::types::config::with_path;
use crate::types::{AccessToken, AuthorizationParams, AuthorizationUrl, ClientAuthMethod, ProviderConfig};

const SCOPE_SEPARATOR: &str = ",";

/// Provider backed by a [`ProviderConfig`].
#[derive(Clone, Debug)]
pub struct PlatformProvider {
    config: ProviderConfig,
}

impl PlatformProvider {
    /// Create new provider.
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// The provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn client_parameters(&self) -> Vec<(String, String)> {
        let credentials = &self.config.credentials;
        let mut params = Vec::new();

        if credentials.auth_method != ClientAuthMethod::ClientSecretBasic {
            params.push(("client_id".to_string(), credentials.client_id.clone()));
        }
        if credentials.auth_method == ClientAuthMethod::ClientSecretPost {
            if let Some(secret) = &credentials.client_secret {
                params.push((
                    "client_secret".to_string(),
                    secret.expose_secret().to_string(),
                ));
            }
        }
        if let Some(redirect_uri) = &self.config.redirect_uri {
            params.push(("redirect_uri".to_string(), redirect_uri.clone()));
        }

        params
    }

    fn basic_authorization(&self) -> Option<String> {
        let credentials = &self.config.credentials;
        if credentials.auth_method != ClientAuthMethod::ClientSecretBasic {
            return None;
        }
        let secret = credentials
            .client_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
            .unwrap_or("");
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", credentials.client_id, secret));
        Some(format!("Basic {}", encoded))
    }

    fn random_state() -> String {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Provider for PlatformProvider {
    fn name(&self) -> &str {
        "platformsh"
    }

    fn token_endpoint(&self) -> &str {
        &self.config.endpoints.token_url
    }

    fn authorization_url(&self, params: AuthorizationParams) -> OAuth2Result<AuthorizationUrl> {
        let mut url = Url::parse(&self.config.endpoints.authorize_url).map_err(|_| {
            OAuth2Error::Configuration(ConfigurationError::InvalidEndpoint {
                url: self.config.endpoints.authorize_url.clone(),
            })
        })?;

        let state = params.state.unwrap_or_else(Self::random_state);
        let scopes = params
            .scopes
            .unwrap_or_else(|| self.config.default_scopes.clone());

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.credentials.client_id);
            if let Some(redirect_uri) = params.redirect_uri.as_ref().or(self.config.redirect_uri.as_ref()) {
                query.append_pair("redirect_uri", redirect_uri);
            }
            query.append_pair("response_type", "code");
            query.append_pair("approval_prompt", "auto");
            query.append_pair("state", &state);
            if !scopes.is_empty() {
                query.append_pair("scope", &scopes.join(SCOPE_SEPARATOR));
            }
            for (key, value) in &params.extra_params {
                query.append_pair(key, value);
            }
        }

        Ok(AuthorizationUrl {
            url: url.to_string(),
            state,
        })
    }

    fn resource_owner_details_url(&self, _token: &AccessToken) -> OAuth2Result<String> {
        with_path(&self.config.endpoints.api_url, "/users/me")
    }

    fn build_token_request(
        &self,
        grant: &GrantType,
        options: &GrantOptions,
    ) -> OAuth2Result<HttpRequest> {
        let params = grant.prepare_request_parameters(self.client_parameters(), options)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        let mut request = HttpRequest::post(self.token_endpoint())
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_header("accept", "application/json")
            .with_body(body);
        request.timeout = Some(self.config.timeout);

        if let Some(basic) = self.basic_authorization() {
            request.set_header("authorization", basic);
        }

        if *grant == GrantType::PasswordWithTfa {
            if let Some(totp) = options.get(tfa::TOTP_OPTION).filter(|t| !t.is_empty()) {
                request = tfa::add_totp(request, totp)?;
            }
        }

        Ok(request)
    }

    fn parse_error(&self, response: &HttpResponse) -> Option<OAuth2Error> {
        if tfa::requires_otp(response) {
            let message = parse_error_response(&response.body)
                .and_then(|e| e.error_description)
                .unwrap_or_else(|| "A one-time code is required".to_string());
            return Some(OAuth2Error::TwoFactorRequired { message });
        }

        if let Some(error) = parse_error_response(&response.body) {
            return Some(OAuth2Error::Provider(map_token_error(&error)));
        }

        if !response.is_success() {
            return Some(create_error_from_response(response.status, &response.body));
        }

        None
    }
}
