//! Persistence orchestration for Parley.
//!
//! [`Store`] sits between application logic and a storage backend. Backends
//! implement [`Adapter`]; the entity mappers returned by [`Store::users`],
//! [`Store::topics`] and friends apply the cross-entity rules on top of it:
//! id assignment, bootstrap subscriptions, cascade order and deletion
//! bookkeeping.
//!
//! None of the multi-step operations are atomic. Each documents the order of
//! its steps; when one fails the error of that step is returned as-is and the
//! earlier steps stay applied. Every step is safe to repeat.

pub mod adapter;
pub mod auth;
pub mod config;
pub mod devices;
pub mod error;
pub mod files;
pub mod media;
pub mod messages;
pub mod registry;
pub mod store;
pub mod subs;
pub mod topics;
pub mod users;
pub mod validate;

pub use adapter::Adapter;
pub use auth::{AuthHandler, AuthOutcome};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use media::MediaHandler;
pub use registry::{Registries, Registry};
pub use store::Store;
pub use validate::Validator;
