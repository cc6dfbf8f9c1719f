use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Permission bits on a subscription: `J R W P A S D O`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AccessMode(u32);

const LETTERS: &[u8; 8] = b"JRWPASDO";

impl AccessMode {
    pub const NONE: AccessMode = AccessMode(0);
    pub const JOIN: AccessMode = AccessMode(1 << 0);
    pub const READ: AccessMode = AccessMode(1 << 1);
    pub const WRITE: AccessMode = AccessMode(1 << 2);
    pub const PRES: AccessMode = AccessMode(1 << 3);
    pub const APPROVE: AccessMode = AccessMode(1 << 4);
    pub const SHARE: AccessMode = AccessMode(1 << 5);
    pub const DELETE: AccessMode = AccessMode(1 << 6);
    pub const OWNER: AccessMode = AccessMode(1 << 7);

    /// `JRWP`: what a user has on their own `me` and `fnd` topics.
    pub const SELF: AccessMode = AccessMode(0b0000_1111);
    /// `JRWPA`
    pub const P2P: AccessMode = AccessMode(0b0001_1111);
    /// `JRWPS`
    pub const PUBLIC: AccessMode = AccessMode(0b0010_1111);
    /// `JR`
    pub const READ_ONLY: AccessMode = AccessMode(0b0000_0011);
    /// `JRWPASDO`
    pub const FULL: AccessMode = AccessMode(0b1111_1111);
    /// `JRWPASD`
    pub const ADMIN: AccessMode = AccessMode(0b0111_1111);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Unknown bits are dropped.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::FULL.0)
    }

    pub const fn contains(self, other: AccessMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AccessMode {
    type Output = AccessMode;

    fn bitor(self, rhs: Self) -> Self {
        AccessMode(self.0 | rhs.0)
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("N");
        }
        for (i, letter) in LETTERS.iter().enumerate() {
            if self.0 & (1 << i) != 0 {
                write!(f, "{}", *letter as char)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid access mode character '{0}'")]
pub struct ParseAccessModeError(char);

impl FromStr for AccessMode {
    type Err = ParseAccessModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = 0u32;
        for c in s.chars() {
            let upper = c.to_ascii_uppercase();
            if upper == 'N' {
                continue;
            }
            let pos = LETTERS
                .iter()
                .position(|l| *l as char == upper)
                .ok_or(ParseAccessModeError(c))?;
            bits |= 1 << pos;
        }
        Ok(AccessMode(bits))
    }
}

impl Serialize for AccessMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccessMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Default permissions granted to authenticated and anonymous users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAccess {
    pub auth: AccessMode,
    pub anon: AccessMode,
}

/// Strength of an authentication record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    #[default]
    None,
    Anon,
    Auth,
    Root,
}

impl AuthLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthLevel::None => "none",
            AuthLevel::Anon => "anon",
            AuthLevel::Auth => "auth",
            AuthLevel::Root => "root",
        }
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown auth level '{0}'")]
pub struct ParseAuthLevelError(String);

impl FromStr for AuthLevel {
    type Err = ParseAuthLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(AuthLevel::None),
            "anon" => Ok(AuthLevel::Anon),
            "auth" => Ok(AuthLevel::Auth),
            "root" => Ok(AuthLevel::Root),
            _ => Err(ParseAuthLevelError(s.to_string())),
        }
    }
}
