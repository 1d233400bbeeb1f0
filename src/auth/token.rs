//! JWT payload inspection.
//!
//! Decodes the claims segment of a JWT without verifying the signature.
//! The client only needs the expiry timestamp to decide between the probe
//! and refresh paths; verification is the backend's job.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token is not a three-part JWT")]
    MissingPayload,

    #[error("token payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload is not a valid claims object: {0}")]
    Claims(#[from] serde_json::Error),
}

/// Claims of interest from an access token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiration timestamp, Unix seconds
    pub exp: i64,
}

impl TokenClaims {
    /// Decode the payload segment of `token`. Pure; performs no verification
    /// and no I/O.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) => payload,
            _ => return Err(TokenError::MissingPayload),
        };

        let bytes = URL_SAFE_NO_PAD.decode(payload)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Expiry in milliseconds since the epoch, for comparison against
    /// wall-clock time. Saturates rather than overflowing on absurd `exp`
    /// values, which are decodable but effectively "never expires".
    pub fn expires_at_millis(&self) -> i64 {
        self.exp.saturating_mul(1000)
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expires_at_millis() < now_millis
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an unsigned JWT with the given claims JSON.
    fn make_token(claims: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    #[test]
    fn test_decode_well_formed_token() {
        let token = make_token(r#"{"exp":1700000000,"user_id":7}"#);
        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.exp, 1700000000);
        assert_eq!(claims.expires_at_millis(), 1700000000000);
    }

    #[test]
    fn test_decode_rejects_missing_segments() {
        assert!(matches!(
            TokenClaims::decode("not-a-jwt"),
            Err(TokenError::MissingPayload)
        ));
        assert!(matches!(
            TokenClaims::decode("only.two"),
            Err(TokenError::MissingPayload)
        ));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            TokenClaims::decode("a.!!!.c"),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_exp() {
        let token = make_token(r#"{"user_id":7}"#);
        assert!(matches!(
            TokenClaims::decode(&token),
            Err(TokenError::Claims(_))
        ));
    }

    #[test]
    fn test_expiry_comparison() {
        let claims = TokenClaims { exp: 1000 };
        assert!(claims.is_expired_at(1_000_001));
        assert!(!claims.is_expired_at(999_999));
    }

    #[test]
    fn test_huge_exp_saturates_instead_of_overflowing() {
        let token = make_token(&format!(r#"{{"exp":{}}}"#, i64::MAX));
        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.expires_at_millis(), i64::MAX);
        assert!(!claims.is_expired_at(i64::MAX - 1));

        let token = make_token(&format!(r#"{{"exp":{}}}"#, i64::MIN));
        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.expires_at_millis(), i64::MIN);
        assert!(claims.is_expired_at(0));
    }
}
