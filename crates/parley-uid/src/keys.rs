use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::UidError;

/// Length of the uid obfuscation key.
pub const UID_KEY_LEN: usize = 16;

/// Decode a base64 uid key as it appears in the store configuration.
pub fn key_from_base64(encoded: &str) -> Result<[u8; UID_KEY_LEN], UidError> {
    let bytes = BASE64.decode(encoded.trim())?;
    let key: [u8; UID_KEY_LEN] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| UidError::InvalidKey(b.len()))?;
    Ok(key)
}
