//! JWT Signing and Verification
//!
//! Tokens are HS256 JWTs: `base64url(header).base64url(payload).base64url(mac)`,
//! where the MAC is HMAC-SHA256 over the first two segments as sent. The
//! signature comparison inside `jsonwebtoken` is constant-time.
//!
//! Verification is pure and synchronous; it never touches the cache.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use warden_common::TokenPayload;

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Why a presented token was rejected.
///
/// Callers see a single "verification failed" outcome; the kind is kept for
/// logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Wrong segment count, bad encoding or unparseable payload.
    #[error("Malformed token")]
    Malformed,

    /// MAC mismatch or an algorithm other than HS256.
    #[error("Token signature mismatch")]
    BadSignature,

    /// Past its `exp`.
    #[error("Token expired")]
    Expired,
}

impl TokenError {
    /// Short label for structured logs.
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
        }
    }
}

/// `jsonwebtoken` parses the header before it checks the MAC, so a header
/// that does not decode is `Malformed` even when the token was tampered
/// with. The HS256 check compares encoded signatures, so a signature segment
/// that is not valid base64 is still `BadSignature`.
impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::BadSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

/// HS256 key material and validation rules derived from one secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Serialize and sign a payload.
    pub fn sign(&self, payload: &TokenPayload) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), payload, &self.encoding)
    }

    /// Verify a token and return its payload unchanged.
    ///
    /// Checks, in order: three non-empty segments, signature, payload
    /// shape, expiry.
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        if !has_three_segments(token) {
            return Err(TokenError::Malformed);
        }

        let data = decode::<TokenPayload>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

fn has_three_segments(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        if segment.is_empty() {
            return false;
        }
        segments += 1;
    }
    segments == 3
}
