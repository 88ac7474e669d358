//! The cross-boundary carrier (§3, §4.6): `base64url(payload).base64url(hmac)`.
//!
//! A token never carries `ProvenanceMetadata` directly — only a reference
//! into the shared metadata cache (`prov:meta:{tenant_id}:{metadata_ref}`)
//! plus enough of the payload to verify it without a cache lookup
//! (tenant, execution, expiry, digest). This keeps a response's token list
//! cheap even when the tagged value itself is large.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use atp_domain::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: u8 = 1;

/// The signed payload inside a `ProvenanceToken` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    pub version: u8,
    pub tenant_id: String,
    pub execution_id: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// `canonical_digest` of the tagged value, so the server can rebuild
    /// the taint map on a later request by matching this against incoming
    /// argument digests without needing the cache at all for primitives.
    pub value_digest: String,
    /// The key suffix under which the full `ProvenanceMetadata` is stored:
    /// `prov:meta:{tenant_id}:{metadata_ref}`.
    pub metadata_ref: String,
}

impl TokenPayload {
    pub fn new(
        tenant_id: impl Into<String>,
        execution_id: impl Into<String>,
        value_digest: impl Into<String>,
        metadata_ref: impl Into<String>,
        ttl: chrono::Duration,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            version: TOKEN_VERSION,
            tenant_id: tenant_id.into(),
            execution_id: execution_id.into(),
            issued_at: now,
            expires_at: now + ttl,
            value_digest: value_digest.into(),
            metadata_ref: metadata_ref.into(),
        }
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now > self.expires_at
    }
}

/// A signed, opaque hint a client echoes back on a later `/execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceToken(String);

impl ProvenanceToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn sign(secret: &[u8], payload: &TokenPayload) -> Result<Self> {
        let payload_json =
            serde_json::to_vec(payload).map_err(|e| Error::Other(e.to_string()))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::Other(format!("invalid hmac key: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(Self(format!("{payload_b64}.{sig_b64}")))
    }

    /// Verify signature, tenant, and expiry (§4.6: "verifies each
    /// (signature, tenant, execution, expiry, digest)"). The digest match
    /// itself is the caller's job — it happens against *incoming argument*
    /// values, not against anything inside the token.
    pub fn verify(secret: &[u8], tenant_id: &str, token: &str) -> Result<TokenPayload> {
        let (payload_b64, sig_b64) = token
            .split_once('.')
            .ok_or_else(|| Error::ValidationFailed("malformed provenance token".into()))?;

        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::Other(format!("invalid hmac key: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let expected = mac.finalize().into_bytes();

        let given = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| Error::ValidationFailed("malformed provenance token signature".into()))?;
        if given.ct_eq(&expected).unwrap_u8() != 1 {
            return Err(Error::ValidationFailed(
                "provenance token signature mismatch".into(),
            ));
        }

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| Error::ValidationFailed("malformed provenance token payload".into()))?;
        let payload: TokenPayload =
            serde_json::from_slice(&payload_json).map_err(|e| Error::Other(e.to_string()))?;

        if payload.version != TOKEN_VERSION {
            return Err(Error::ValidationFailed(format!(
                "unsupported provenance token version {}",
                payload.version
            )));
        }
        if payload.tenant_id != tenant_id {
            return Err(Error::Forbidden);
        }
        if payload.is_expired(chrono::Utc::now()) {
            return Err(Error::Expired);
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(tenant_id: &str) -> TokenPayload {
        TokenPayload::new(tenant_id, "exec-1", "deadbeef", "ref-1", chrono::Duration::hours(1))
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let token = ProvenanceToken::sign(secret, &sample_payload("acme")).unwrap();
        let payload = ProvenanceToken::verify(secret, "acme", token.as_str()).unwrap();
        assert_eq!(payload.execution_id, "exec-1");
        assert_eq!(payload.metadata_ref, "ref-1");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let token = ProvenanceToken::sign(secret, &sample_payload("acme")).unwrap();
        let mut tampered = token.as_str().to_string();
        tampered.push('x');
        assert!(ProvenanceToken::verify(secret, "acme", &tampered).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token =
            ProvenanceToken::sign(b"0123456789abcdef0123456789abcdef", &sample_payload("acme"))
                .unwrap();
        assert!(ProvenanceToken::verify(
            b"different-secret-00000000000000",
            "acme",
            token.as_str()
        )
        .is_err());
    }

    #[test]
    fn cross_tenant_verify_is_forbidden() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let token = ProvenanceToken::sign(secret, &sample_payload("acme")).unwrap();
        assert!(matches!(
            ProvenanceToken::verify(secret, "other-tenant", token.as_str()),
            Err(Error::Forbidden)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let mut payload = sample_payload("acme");
        payload.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        let token = ProvenanceToken::sign(secret, &payload).unwrap();
        assert!(matches!(
            ProvenanceToken::verify(secret, "acme", token.as_str()),
            Err(Error::Expired)
        ));
    }
}
