use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::config::BwsConfig;

/// HMAC-SHA512 wants a 64-byte key; BWS signing keys shorter than that are
/// extended by SHA-512 hashing rather than zero-padded or used as-is (spec
/// §4.1: "hash/extend the secret to a 64-byte key when shorter").
fn extend_key(secret: &[u8]) -> Vec<u8> {
    if secret.len() >= 64 {
        secret.to_vec()
    } else {
        Sha512::digest(secret).to_vec()
    }
}

/// Bearer credential claims, HMAC-SHA512 signed (spec §4.1 "bearer
/// credential signed HMAC-SHA512"). `iss`/`sub` are both the configured
/// client-id (the partition), `aud` is the fixed literal `"BWS"` (spec
/// §6.2/§4.1). Grounded on the teacher's `oauth/token_service.rs`
/// JWT-issuing pattern, which already uses `jsonwebtoken` for this exact
/// shape of claim set.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    aud: String,
    iat: i64,
    nbf: i64,
    exp: i64,
}

struct CachedToken {
    token: String,
    issued_at: Instant,
    ttl: Duration,
}

/// Issues and caches the bearer credential attached to every BWS call.
/// Refreshed once 80% of its TTL has elapsed, matching the teacher's
/// refresh-before-expiry convention for its own access tokens.
pub struct CredentialSigner {
    encoding_key: EncodingKey,
    partition: String,
    ttl: Duration,
    cached: RwLock<Option<CachedToken>>,
}

impl CredentialSigner {
    pub fn new(config: &BwsConfig) -> Self {
        CredentialSigner {
            encoding_key: EncodingKey::from_secret(&extend_key(config.signing_key.as_bytes())),
            partition: config.partition.clone(),
            ttl: Duration::from_secs(config.credential_ttl_seconds),
            cached: RwLock::new(None),
        }
    }

    pub fn current_token(&self) -> Result<String> {
        if let Some(token) = self.fresh_cached_token() {
            return Ok(token);
        }
        self.mint_and_cache()
    }

    fn fresh_cached_token(&self) -> Option<String> {
        let guard = self.cached.read().expect("signer lock poisoned");
        let cached = guard.as_ref()?;
        let refresh_at = cached.ttl.mul_f64(0.8);
        if cached.issued_at.elapsed() < refresh_at {
            Some(cached.token.clone())
        } else {
            None
        }
    }

    fn mint_and_cache(&self) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: self.partition.clone(),
            iss: self.partition.clone(),
            aud: "BWS".to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + chrono::Duration::from_std(self.ttl).unwrap()).timestamp(),
        };
        let token = encode(&Header::new(jsonwebtoken::Algorithm::HS512), &claims, &self.encoding_key)
            .context("failed to sign BWS bearer credential")?;

        let mut guard = self.cached.write().expect("signer lock poisoned");
        *guard = Some(CachedToken {
            token: token.clone(),
            issued_at: Instant::now(),
            ttl: self.ttl,
        });
        Ok(token)
    }
}
