use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Externally visible identifier of a user, file or message.
///
/// The wrapped value is the obfuscated form produced by the generator, never
/// the raw snowflake. Zero is reserved as "no id".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(u64);

#[derive(Debug, thiserror::Error)]
pub enum ParseUidError {
    #[error("invalid uid encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("uid must decode to 8 bytes, got {0}")]
    Length(usize),
    #[error("missing '{0}' prefix")]
    Prefix(&'static str),
}

impl Uid {
    pub const ZERO: Uid = Uid(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Name of the user's own topic, `usr<uid>`.
    pub fn user_id(self) -> String {
        format!("usr{}", self)
    }

    /// Name of the user's search topic, `fnd<uid>`.
    pub fn fnd_name(self) -> String {
        format!("fnd{}", self)
    }

    /// Name of the P2P topic between `self` and `other`. Symmetric.
    pub fn p2p_name(self, other: Uid) -> String {
        let (first, second) = if self <= other { (self, other) } else { (other, self) };
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&first.0.to_le_bytes());
        buf[8..].copy_from_slice(&second.0.to_le_bytes());
        format!("p2p{}", B64.encode(buf))
    }

    /// Parse a `usr<uid>` topic name back into the uid.
    pub fn parse_user_id(topic: &str) -> Result<Uid, ParseUidError> {
        topic
            .strip_prefix("usr")
            .ok_or(ParseUidError::Prefix("usr"))?
            .parse()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return Ok(());
        }
        f.write_str(&B64.encode(self.0.to_le_bytes()))
    }
}

impl FromStr for Uid {
    type Err = ParseUidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Uid::ZERO);
        }
        let bytes = B64.decode(s)?;
        let bytes: [u8; 8] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| ParseUidError::Length(b.len()))?;
        Ok(Uid(u64::from_le_bytes(bytes)))
    }
}

impl Serialize for Uid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
