//! Two-factor authentication for the password grant.
//!
//! The one-time code travels in the [`TFA_HEADER`] request header. A 4xx
//! response that carries the same header means a code is required.

use url::Url;

use crate::core::{HttpRequest, HttpResponse};
use crate::error::{OAuth2Error, OAuth2Result, ProtocolError};

/// Header carrying the one-time code, and signalling that one is needed.
pub const TFA_HEADER: &str = "X-Drupal-TFA";

/// Grant option holding the one-time code.
pub const TOTP_OPTION: &str = "totp";

/// Attach a one-time code to a request. Only HTTPS requests are accepted.
pub fn add_totp(request: HttpRequest, totp: &str) -> OAuth2Result<HttpRequest> {
    let is_https = Url::parse(&request.url)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false);

    if !is_https {
        return Err(OAuth2Error::Protocol(ProtocolError::InsecureRequest {
            what: "TOTP token".to_string(),
            url: request.url,
        }));
    }

    Ok(request.with_header(TFA_HEADER, totp))
}

/// Check whether the response requires a one-time code.
pub fn requires_otp(response: &HttpResponse) -> bool {
    response.is_client_error() && response.header(TFA_HEADER).is_some()
}
