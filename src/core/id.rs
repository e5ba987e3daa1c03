//! Time-ordered 64-bit identifier generation
//!
//! Identifiers are laid out (high to low) as:
//! - 1 bit: always zero, so ids stay positive as `BIGINT`
//! - 41 bits: milliseconds since [`CUSTOM_EPOCH_MS`]
//! - 10 bits: node id, configured once at startup
//! - 12 bits: per-millisecond sequence
//!
//! A single atomic state word holds the last issued timestamp and sequence,
//! so `next()` is lock-free and safe to call from any number of tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub type Id = i64;

/// 2025-01-01 00:00:00 UTC
pub const CUSTOM_EPOCH_MS: u64 = 1_735_689_600_000;

const NODE_BITS: u8 = 10;
const SEQUENCE_BITS: u8 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Largest node id that fits in the node field
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;

/// How far the clock may step backwards before `next()` gives up
pub const DEFAULT_MAX_CLOCK_DRIFT: Duration = Duration::from_millis(5);

/// Source of wall-clock milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// The system wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// ID generator errors
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("Node ID {0} exceeds maximum {max}", max = MAX_NODE_ID)]
    NodeIdOutOfRange(u16),

    #[error("Clock moved backwards: last issued at {last_ms}ms, now {now_ms}ms")]
    ClockRegression { last_ms: u64, now_ms: u64 },

    #[error("System clock is before the ID epoch")]
    ClockBeforeEpoch,
}

/// Lock-free generator of unique, strictly increasing ids for one node
pub struct IdGenerator {
    node_id: u16,
    max_clock_drift: Duration,
    clock: Arc<dyn Clock>,
    /// High bits: timestamp relative to the epoch, low 12 bits: sequence
    last_state: AtomicU64,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("node_id", &self.node_id)
            .field("max_clock_drift", &self.max_clock_drift)
            .finish()
    }
}

impl IdGenerator {
    /// Create a generator for `node_id` backed by the system clock
    pub fn new(node_id: u16) -> Result<Self, IdError> {
        Self::with_clock(node_id, Arc::new(SystemClock))
    }

    /// Create a generator reading time from `clock`
    pub fn with_clock(node_id: u16, clock: Arc<dyn Clock>) -> Result<Self, IdError> {
        if node_id > MAX_NODE_ID {
            return Err(IdError::NodeIdOutOfRange(node_id));
        }

        Ok(Self {
            node_id,
            max_clock_drift: DEFAULT_MAX_CLOCK_DRIFT,
            clock,
            last_state: AtomicU64::new(0),
        })
    }

    /// Set the clock regression tolerance
    pub fn max_clock_drift(mut self, drift: Duration) -> Self {
        self.max_clock_drift = drift;
        self
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Issue the next id.
    ///
    /// If the clock is observed behind the last issued timestamp by no more
    /// than the drift tolerance, this waits for it to catch up; a larger
    /// regression, or one that outlasts the tolerance, fails with
    /// [`IdError::ClockRegression`].
    pub fn next(&self) -> Result<Id, IdError> {
        let max_drift_ms = self.max_clock_drift.as_millis() as u64;
        let mut waiting_since: Option<Instant> = None;

        loop {
            // State first: a clock read taken after the load can only be
            // behind it if the clock itself stepped backwards
            let last_state = self.last_state.load(Ordering::Acquire);
            let now = self.elapsed_millis()?;
            let last_timestamp = last_state >> SEQUENCE_BITS;
            let last_sequence = last_state & SEQUENCE_MASK;

            let (timestamp, sequence) = if now > last_timestamp {
                (now, 0)
            } else if now == last_timestamp {
                if last_sequence >= SEQUENCE_MASK {
                    // Sequence exhausted for this millisecond
                    std::hint::spin_loop();
                    continue;
                }
                (now, last_sequence + 1)
            } else {
                let regression = IdError::ClockRegression {
                    last_ms: last_timestamp + CUSTOM_EPOCH_MS,
                    now_ms: now + CUSTOM_EPOCH_MS,
                };

                if last_timestamp - now > max_drift_ms {
                    return Err(regression);
                }

                let started = *waiting_since.get_or_insert_with(Instant::now);
                if started.elapsed() > self.max_clock_drift {
                    return Err(regression);
                }

                std::thread::yield_now();
                continue;
            };

            let new_state = (timestamp << SEQUENCE_BITS) | sequence;
            if self
                .last_state
                .compare_exchange_weak(last_state, new_state, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(self.compose(timestamp, sequence));
            }

            // Contention, retry
            std::hint::spin_loop();
        }
    }

    fn elapsed_millis(&self) -> Result<u64, IdError> {
        self.clock
            .now_millis()
            .checked_sub(CUSTOM_EPOCH_MS)
            .ok_or(IdError::ClockBeforeEpoch)
    }

    fn compose(&self, timestamp: u64, sequence: u64) -> Id {
        ((timestamp << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as u64) << SEQUENCE_BITS)
            | sequence) as Id
    }
}

/// Split an id into (Unix milliseconds, node id, sequence)
pub fn decompose(id: Id) -> (u64, u16, u16) {
    let id = id as u64;
    let timestamp = (id >> (NODE_BITS + SEQUENCE_BITS)) + CUSTOM_EPOCH_MS;
    let node_id = ((id >> SEQUENCE_BITS) & MAX_NODE_ID as u64) as u16;
    let sequence = (id & SEQUENCE_MASK) as u16;

    (timestamp, node_id, sequence)
}
