//! Worker-partitioned snowflake ids.
//!
//! # Layout
//!
//! ```text
//! | 1 bit: 0 | 41 bits: ms since 2024-01-01 UTC | 10 bits: worker | 12 bits: sequence |
//! ```
//!
//! The top bit is always clear so a raw id fits an `i64` column.
//!
//! # Ordering
//!
//! Ids from one generator never decrease. When 4096 ids have been issued in
//! one millisecond, [`UidGenerator::next_raw`] sleeps until the clock ticks
//! over. When the clock steps back by more than [`CLOCK_TOLERANCE_MS`] it
//! fails with [`UidError::ClockMovedBackwards`]; smaller steps are absorbed by
//! continuing on the last timestamp.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use parley_types::Uid;

use crate::UidError;
use crate::cipher::Obfuscator;

/// Custom epoch: 2024-01-01 00:00:00 UTC (milliseconds since Unix epoch).
pub const EPOCH_MS: i64 = 1_704_067_200_000;

const TIMESTAMP_BITS: u32 = 41;
const WORKER_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

pub const MAX_WORKER_ID: u32 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;
const TIMESTAMP_MAX: u64 = (1 << TIMESTAMP_BITS) - 1;

/// Backward clock steps up to this size are absorbed.
pub const CLOCK_TOLERANCE_MS: u64 = 5;

struct State {
    last_timestamp: u64,
    sequence: u64,
}

pub struct UidGenerator {
    worker_id: u64,
    cipher: Obfuscator,
    state: Mutex<State>,
}

impl UidGenerator {
    /// Configure a generator for one worker partition.
    pub fn new(worker_id: u32, key: &[u8]) -> Result<Self, UidError> {
        if worker_id > MAX_WORKER_ID {
            return Err(UidError::InvalidWorker(worker_id));
        }
        let cipher = Obfuscator::new(key)?;
        Ok(Self {
            worker_id: u64::from(worker_id),
            cipher,
            state: Mutex::new(State { last_timestamp: 0, sequence: 0 }),
        })
    }

    pub fn worker_id(&self) -> u32 {
        self.worker_id as u32
    }

    /// Next raw id. Blocks for at most a millisecond when the sequence for the
    /// current millisecond is used up.
    pub fn next_raw(&self) -> Result<i64, UidError> {
        loop {
            if let Some(id) = self.issue(chrono::Utc::now().timestamp_millis())? {
                return Ok(id);
            }
            std::thread::sleep(Duration::from_micros(100));
        }
    }

    /// Issue an id for wall-clock time `now_ms` (Unix milliseconds).
    /// `Ok(None)` means the sequence for that millisecond is exhausted.
    pub(crate) fn issue(&self, now_ms: i64) -> Result<Option<i64>, UidError> {
        let now = u64::try_from(now_ms - EPOCH_MS).map_err(|_| UidError::ClockBeforeEpoch)?;

        let mut state = self.state.lock();

        if now > state.last_timestamp {
            state.last_timestamp = now;
            state.sequence = 0;
        } else {
            if state.last_timestamp - now > CLOCK_TOLERANCE_MS {
                return Err(UidError::ClockMovedBackwards {
                    last_ms: state.last_timestamp,
                    now_ms: now,
                });
            }
            if state.sequence == SEQUENCE_MASK {
                return Ok(None);
            }
            state.sequence += 1;
        }

        if state.last_timestamp > TIMESTAMP_MAX {
            return Err(UidError::TimestampOverflow);
        }

        let id = (state.last_timestamp << (WORKER_BITS + SEQUENCE_BITS))
            | (self.worker_id << SEQUENCE_BITS)
            | state.sequence;
        Ok(Some(id as i64))
    }

    /// Next id in its external form.
    pub fn get(&self) -> Result<Uid, UidError> {
        self.next_raw().map(|raw| self.encode(raw))
    }

    pub fn get_str(&self) -> Result<String, UidError> {
        self.get().map(|uid| uid.to_string())
    }

    /// Obfuscate a raw id. Zero maps to [`Uid::ZERO`].
    pub fn encode(&self, raw: i64) -> Uid {
        if raw == 0 {
            return Uid::ZERO;
        }
        Uid::new(self.cipher.encrypt(raw as u64))
    }

    /// Inverse of [`encode`](Self::encode). [`Uid::ZERO`] maps to zero.
    pub fn decode(&self, uid: Uid) -> i64 {
        if uid.is_zero() {
            return 0;
        }
        self.cipher.decrypt(uid.get()) as i64
    }
}

impl fmt::Debug for UidGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UidGenerator")
            .field("worker_id", &self.worker_id)
            .finish_non_exhaustive()
    }
}

/// Milliseconds since [`EPOCH_MS`] encoded in a raw id.
pub fn timestamp_of(raw: i64) -> u64 {
    (raw as u64) >> (WORKER_BITS + SEQUENCE_BITS)
}

pub fn worker_of(raw: i64) -> u32 {
    (((raw as u64) >> SEQUENCE_BITS) & WORKER_MASK) as u32
}

pub fn sequence_of(raw: i64) -> u32 {
    ((raw as u64) & SEQUENCE_MASK) as u32
}
