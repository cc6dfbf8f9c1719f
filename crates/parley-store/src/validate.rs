use parley_types::Uid;

use crate::error::Result;

/// Credential validator, e.g. email or phone confirmation.
pub trait Validator: Send + Sync {
    fn init(&self, config: &str) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Normalize a credential value or reject it as malformed.
    fn pre_check(&self, value: &str) -> Result<String>;

    /// Start validation: send a code to `value`. Returns whether a request
    /// was actually sent.
    fn request(&self, user: Uid, value: &str, lang: &str, resp: &str) -> Result<bool>;

    /// Check a response. Returns the confirmed value.
    fn check(&self, user: Uid, resp: &str) -> Result<String>;

    fn remove(&self, user: Uid, value: &str) -> Result<()>;
}
