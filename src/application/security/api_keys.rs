//! API key digests.
//!
//! Raw keys are shown to the user once. Only an HMAC-SHA256 digest keyed by a
//! server-side secret is stored, so a read-only database leak does not allow
//! keys to be verified or forged.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct ApiKeyHasher {
    mac: HmacSha256,
}

impl ApiKeyHasher {
    /// # Errors
    ///
    /// Fails only if the HMAC implementation rejects the key length.
    pub fn new(secret: &str) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret.as_bytes())?,
        })
    }

    /// Returns the 64-character lowercase hex digest of `raw_key`.
    pub fn digest(&self, raw_key: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(raw_key.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
