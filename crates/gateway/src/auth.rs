//! Bearer tokens and password verification.
//!
//! Tokens are HMAC-SHA256-signed: `base64(claims JSON) "." base64(tag)`.
//! The claims carry the user ID and an expiry timestamp; anything with a
//! bad tag, bad encoding, or a past expiry simply fails verification.
//! Passwords are stored as argon2 hashes.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// The authenticated caller, inserted into request extensions by the auth
/// middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub Uuid);

#[derive(Serialize, Deserialize)]
struct Claims {
    user_id: Uuid,
    exp: i64,
}

/// Issues and verifies signed bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
    ttl_hours: u64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: u64) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            ttl_hours,
        }
    }

    /// Issue a token for a user, valid for the configured TTL.
    pub fn issue(&self, user_id: Uuid) -> String {
        let claims = Claims {
            user_id,
            exp: (Utc::now() + chrono::Duration::hours(self.ttl_hours as i64)).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
        let tag = self.sign(&payload);
        format!("{payload}.{tag}")
    }

    /// Verify a token and return the user ID it was issued for.
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let (payload, tag) = token.split_once('.')?;

        let mut mac = HmacSha256::new_from_slice(&self.key).ok()?;
        mac.update(payload.as_bytes());
        let tag_bytes = URL_SAFE_NO_PAD.decode(tag).ok()?;
        mac.verify_slice(&tag_bytes).ok()?;

        let claims: Claims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        if claims.exp < Utc::now().timestamp() {
            return None;
        }

        Some(claims.user_id)
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify a password against a stored argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
