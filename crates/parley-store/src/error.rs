use parley_uid::UidError;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the store, its backends and its handlers.
///
/// Mappers return backend errors unchanged; the variant tells what went
/// wrong, not how far a cascade got.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Bad startup configuration. Startup must abort on this.
    #[error("store: {0}")]
    Config(String),

    #[error(transparent)]
    Uid(#[from] UidError),

    #[error("store: not found")]
    NotFound,

    /// A unique key is already taken.
    #[error("store: duplicate value")]
    Duplicate,

    #[error("store: not implemented")]
    NotImplemented,

    /// Media, auth or validation handler failure.
    #[error("external handler: {0:#}")]
    External(anyhow::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        StoreError::Config(msg.into())
    }

    pub fn external(err: impl Into<anyhow::Error>) -> Self {
        StoreError::External(err.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}
