//! Parley unique id generation
//!
//! Snowflake-style 64-bit ids, partitioned by worker, made opaque to clients
//! with a 64-bit block cipher keyed by the deployment's uid key.

pub mod cipher;
pub mod generator;
pub mod keys;

pub use generator::UidGenerator;

#[derive(Debug, thiserror::Error)]
pub enum UidError {
    #[error("worker id {0} is outside [0, {max}]", max = generator::MAX_WORKER_ID)]
    InvalidWorker(u32),
    #[error("uid key must be {expected} bytes, got {0}", expected = keys::UID_KEY_LEN)]
    InvalidKey(usize),
    #[error("invalid uid key encoding: {0}")]
    KeyEncoding(#[from] base64::DecodeError),
    #[error("system clock is before the id epoch")]
    ClockBeforeEpoch,
    #[error("clock moved backwards: last id at {last_ms} ms, now {now_ms} ms")]
    ClockMovedBackwards { last_ms: u64, now_ms: u64 },
    #[error("timestamp no longer fits the id layout")]
    TimestampOverflow,
}
