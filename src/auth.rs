//! Static API key verification.
//!
//! The gateway accepts exactly one secret, configured at startup. Callers
//! present it in the [`API_KEY_HEADER`] header; the comparison is an exact,
//! case-sensitive byte match with no trimming.

use thiserror::Error;

/// Header carrying the caller's credential.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("API key required. Please provide X-API-Key header.")]
    MissingCredential,

    #[error("Invalid API key")]
    InvalidCredential,
}

/// Compares presented credentials against the configured secret.
#[derive(Clone)]
pub struct ApiKeyVerifier {
    secret: String,
}

impl ApiKeyVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verify a credential as extracted from the request.
    ///
    /// An empty value counts as missing.
    pub fn verify<'a>(&self, presented: Option<&'a str>) -> Result<&'a str, AuthError> {
        match presented {
            None | Some("") => Err(AuthError::MissingCredential),
            Some(key) if key == self.secret => Ok(key),
            Some(_) => Err(AuthError::InvalidCredential),
        }
    }

    /// Verify the credential carried by a header map.
    ///
    /// A header whose value is not valid UTF-8 can never equal the secret and
    /// is rejected as invalid rather than missing.
    pub fn verify_headers(&self, headers: &axum::http::HeaderMap) -> Result<(), AuthError> {
        match headers.get(API_KEY_HEADER) {
            None => Err(AuthError::MissingCredential),
            Some(value) => {
                let key = value.to_str().map_err(|_| AuthError::InvalidCredential)?;
                self.verify(Some(key)).map(|_| ())
            }
        }
    }
}

impl std::fmt::Debug for ApiKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}
