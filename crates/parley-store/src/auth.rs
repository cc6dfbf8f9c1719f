use chrono::{DateTime, Utc};

use parley_types::{AuthLevel, Uid};

use crate::error::Result;

/// Result of a successful authentication or record creation.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    pub user: Uid,
    pub auth_level: AuthLevel,
    pub expires: Option<DateTime<Utc>>,
}

/// An authentication scheme such as `basic` or `token`.
///
/// The store only keeps handlers by name; the session layer drives them.
pub trait AuthHandler: Send + Sync {
    fn init(&self, config: &str, name: &str) -> Result<()>;

    /// Create a record for `user` from a scheme-specific secret.
    fn add_record(&self, user: Uid, level: AuthLevel, secret: &[u8]) -> Result<AuthOutcome>;

    fn authenticate(&self, secret: &[u8]) -> Result<AuthOutcome>;

    /// Whether the unique part of `secret` is still free.
    fn is_unique(&self, secret: &[u8]) -> Result<bool>;

    /// Issue a new secret for an already authenticated user.
    fn gen_secret(&self, user: Uid, level: AuthLevel) -> Result<(Vec<u8>, Option<DateTime<Utc>>)>;
}
