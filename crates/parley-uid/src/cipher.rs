use std::fmt;

use blowfish::Blowfish;
use blowfish::cipher::generic_array::GenericArray;
use blowfish::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::UidError;
use crate::keys::UID_KEY_LEN;

/// Reversible 64-bit permutation that hides generation order and worker id.
pub struct Obfuscator {
    cipher: Blowfish,
}

impl Obfuscator {
    pub fn new(key: &[u8]) -> Result<Self, UidError> {
        if key.len() != UID_KEY_LEN {
            return Err(UidError::InvalidKey(key.len()));
        }
        let cipher: Blowfish =
            Blowfish::new_from_slice(key).map_err(|_| UidError::InvalidKey(key.len()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, value: u64) -> u64 {
        let mut block = GenericArray::clone_from_slice(&value.to_be_bytes());
        self.cipher.encrypt_block(&mut block);
        to_u64(&block)
    }

    pub fn decrypt(&self, value: u64) -> u64 {
        let mut block = GenericArray::clone_from_slice(&value.to_be_bytes());
        self.cipher.decrypt_block(&mut block);
        to_u64(&block)
    }
}

fn to_u64(block: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(block);
    u64::from_be_bytes(buf)
}

impl fmt::Debug for Obfuscator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Obfuscator { .. }")
    }
}
