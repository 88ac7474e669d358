//! Sliding-window bearer tokens (§4.8).
//!
//! Every authenticated request reissues a fresh token with a new expiry,
//! so a session stays alive as long as its caller keeps using it and
//! lapses `ttl` after the last request otherwise.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use std::time::Duration;

use atp_domain::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub tenant_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Signs and verifies session tokens. The secret must be at least 32 bytes
/// (validated by `atp_domain::config::Config::validate`).
pub struct TokenManager {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenManager {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Mint a fresh token for `tenant_id`, valid for `ttl` from now.
    pub fn issue(&self, tenant_id: &str) -> Result<String> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl).unwrap_or_default();
        let claims = TokenClaims {
            tenant_id: tenant_id.to_string(),
            issued_at: now,
            expires_at: now + ttl,
        };
        self.encode(&claims)
    }

    /// Verify a token and, if still valid, return a freshly reissued one
    /// alongside its claims — the caller swaps in the new token for its
    /// next request (`X-Session-Token`).
    pub fn verify_and_reissue(&self, token: &str) -> Result<(TokenClaims, String)> {
        let claims = self.verify(token)?;
        let reissued = self.issue(&claims.tenant_id)?;
        Ok((claims, reissued))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let claims = self.decode(token)?;
        if claims.is_expired(Utc::now()) {
            return Err(Error::Expired);
        }
        Ok(claims)
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String> {
        let payload_json = serde_json::to_vec(claims)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Other(format!("invalid session secret: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload_b64}.{sig_b64}"))
    }

    fn decode(&self, token: &str) -> Result<TokenClaims> {
        let (payload_b64, sig_b64) = token
            .split_once('.')
            .ok_or(Error::Unauthenticated)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Other(format!("invalid session secret: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let expected = mac.finalize().into_bytes();

        let given = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| Error::Unauthenticated)?;
        if given.ct_eq(&expected).unwrap_u8() != 1 {
            return Err(Error::Unauthenticated);
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| Error::Unauthenticated)?;
        serde_json::from_slice(&payload_json).map_err(|_| Error::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_round_trips() {
        let mgr = TokenManager::new(b"0123456789abcdef0123456789abcdef".to_vec(), Duration::from_secs(3600));
        let token = mgr.issue("acme").unwrap();
        let claims = mgr.verify(&token).unwrap();
        assert_eq!(claims.tenant_id, "acme");
    }

    #[test]
    fn verify_and_reissue_returns_a_different_token() {
        let mgr = TokenManager::new(b"0123456789abcdef0123456789abcdef".to_vec(), Duration::from_secs(3600));
        let token = mgr.issue("acme").unwrap();
        let (claims, reissued) = mgr.verify_and_reissue(&token).unwrap();
        assert_eq!(claims.tenant_id, "acme");
        assert_ne!(token, reissued);
        assert!(mgr.verify(&reissued).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mgr = TokenManager::new(b"0123456789abcdef0123456789abcdef".to_vec(), Duration::from_millis(0));
        let token = mgr.issue("acme").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(mgr.verify(&token), Err(Error::Expired)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let mgr = TokenManager::new(b"0123456789abcdef0123456789abcdef".to_vec(), Duration::from_secs(3600));
        let mut token = mgr.issue("acme").unwrap();
        token.push('x');
        assert!(matches!(mgr.verify(&token), Err(Error::Unauthenticated)));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let mgr = TokenManager::new(b"0123456789abcdef0123456789abcdef".to_vec(), Duration::from_secs(3600));
        assert!(matches!(mgr.verify("not-a-token"), Err(Error::Unauthenticated)));
    }
}
