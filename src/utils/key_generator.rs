//! API key generation.

use base64::Engine as _;
use rand::Rng;

/// Random bytes before base64 encoding.
const KEY_LENGTH_BYTES: usize = 32;

/// Prefix that makes keys recognizable in logs and secret scanners.
pub const API_KEY_PREFIX: &str = "imk_";

/// Generates a cryptographically secure random API key.
///
/// The key is [`API_KEY_PREFIX`] followed by 32 random bytes encoded as
/// URL-safe base64 without padding (47 characters in total).
pub fn generate_api_key() -> String {
    let mut buffer = [0u8; KEY_LENGTH_BYTES];
    rand::rng().fill(&mut buffer);

    format!(
        "{}{}",
        API_KEY_PREFIX,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_shape() {
        let key = generate_api_key();
        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(key.len(), 47);
        assert!(
            key[API_KEY_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_keys_are_unique() {
        let keys: HashSet<_> = (0..500).map(|_| generate_api_key()).collect();
        assert_eq!(keys.len(), 500);
    }
}
