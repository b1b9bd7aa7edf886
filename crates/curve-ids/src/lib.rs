#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-ids** – Snowflake-style 64-bit time-ordered id generator.
//!
//! Layout (conceptually big-endian): `0 | 41-bit ms-since-epoch | 10-bit
//! worker_id | 12-bit sequence`. A single critical section per id keeps the
//! algorithm simple and correct under concurrent callers; throughput is
//! capped at 4096 ids/ms/worker by the width of the sequence field.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Number of bits reserved for the worker id.
const WORKER_ID_BITS: u32 = 10;
/// Number of bits reserved for the per-millisecond sequence.
const SEQUENCE_BITS: u32 = 12;
/// Highest worker id representable in [`WORKER_ID_BITS`] bits.
pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;
/// Highest sequence value representable in [`SEQUENCE_BITS`] bits.
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;
/// How long to tolerate a backwards clock jump before giving up, in ms.
const CLOCK_RECOVERY_BUDGET_MS: i64 = 100;

/// Default epoch: 2024-01-01T00:00:00Z, in milliseconds since the Unix
/// epoch. Fixed per deployment; changing it after ids have been minted
/// breaks the time-ordering guarantee across the change.
pub const DEFAULT_EPOCH_MS: i64 = 1_704_067_200_000;

//─────────────────────────────
//  Clock abstraction
//─────────────────────────────

/// Millisecond wall-clock source for the generator. Abstracted so tests can
/// simulate clock jumps without sleeping in real time.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_millis() as i64
    }
}

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Errors raised while minting an id.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnowflakeError {
    /// `worker_id` was outside `[0, 1023]`.
    #[error("worker_id {0} out of range [0, {max}]", max = MAX_WORKER_ID)]
    WorkerIdOutOfRange(u16),
    /// The clock moved backwards by more than the recovery budget.
    #[error("clock moved backwards by {drift_ms}ms, exceeding the {CLOCK_RECOVERY_BUDGET_MS}ms recovery budget")]
    ClockBackwards {
        /// How far back the clock moved, in milliseconds.
        drift_ms: i64,
    },
}

/// Policy applied when the clock is observed to have moved backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockBackwardsPolicy {
    /// Wait up to the recovery budget for the clock to catch back up,
    /// then retry; fail if it still hasn't recovered.
    WaitAndRetry,
    /// Fail immediately on any backwards observation.
    FailFast,
}

//─────────────────────────────
//  Generator
//─────────────────────────────

struct GeneratorState {
    last_timestamp_ms: i64,
    sequence: u16,
}

/// A single Snowflake id generator bound to one `worker_id`.
///
/// All mutation happens inside one `Mutex`-guarded critical section, so a
/// process normally owns exactly one generator per worker id; sharing it
/// behind an `Arc` is the expected usage for multiple caller threads.
pub struct SnowflakeGenerator<C: Clock = SystemClock> {
    worker_id: u16,
    epoch_ms: i64,
    policy: ClockBackwardsPolicy,
    clock: C,
    state: Mutex<GeneratorState>,
}

impl SnowflakeGenerator<SystemClock> {
    /// Construct a generator using the system clock and the default epoch.
    pub fn new(worker_id: u16) -> Result<Self, SnowflakeError> {
        Self::with_clock(worker_id, DEFAULT_EPOCH_MS, ClockBackwardsPolicy::WaitAndRetry, SystemClock)
    }
}

impl<C: Clock> SnowflakeGenerator<C> {
    /// Construct a generator with an explicit clock, epoch, and
    /// clock-backwards policy. Returns an error if `worker_id` is out of
    /// the 10-bit range.
    pub fn with_clock(
        worker_id: u16,
        epoch_ms: i64,
        policy: ClockBackwardsPolicy,
        clock: C,
    ) -> Result<Self, SnowflakeError> {
        if worker_id > MAX_WORKER_ID {
            return Err(SnowflakeError::WorkerIdOutOfRange(worker_id));
        }
        Ok(Self {
            worker_id,
            epoch_ms,
            policy,
            clock,
            state: Mutex::new(GeneratorState { last_timestamp_ms: -1, sequence: 0 }),
        })
    }

    /// The worker id this generator was constructed with.
    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    /// Mint a new id.
    ///
    /// Blocks (busy-waits in sub-millisecond spins) if the 4096-per-ms
    /// sequence budget for the current millisecond is exhausted; the
    /// generator then advances to the next millisecond tick.
    pub fn next_id(&self) -> Result<u64, SnowflakeError> {
        let mut state = self.state.lock().expect("snowflake generator mutex poisoned");
        let mut now = self.clock.now_millis();

        if now < state.last_timestamp_ms {
            now = self.recover_from_backwards_clock(&state)?;
        }

        if now == state.last_timestamp_ms {
            state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
            if state.sequence == 0 {
                now = self.wait_for_next_millis(state.last_timestamp_ms);
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp_ms = now;
        Ok(self.compose(now, state.sequence))
    }

    fn recover_from_backwards_clock(&self, state: &GeneratorState) -> Result<i64, SnowflakeError> {
        let drift_ms = state.last_timestamp_ms - self.clock.now_millis();
        if self.policy == ClockBackwardsPolicy::FailFast {
            return Err(SnowflakeError::ClockBackwards { drift_ms });
        }

        let deadline = Instant::now() + Duration::from_millis(CLOCK_RECOVERY_BUDGET_MS as u64);
        loop {
            let now = self.clock.now_millis();
            if now >= state.last_timestamp_ms {
                return Ok(now);
            }
            if Instant::now() >= deadline {
                return Err(SnowflakeError::ClockBackwards {
                    drift_ms: state.last_timestamp_ms - now,
                });
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    fn wait_for_next_millis(&self, last_timestamp_ms: i64) -> i64 {
        loop {
            let now = self.clock.now_millis();
            if now > last_timestamp_ms {
                return now;
            }
            std::thread::yield_now();
        }
    }

    fn compose(&self, timestamp_ms: i64, sequence: u16) -> u64 {
        let relative_ms = (timestamp_ms - self.epoch_ms) as u64;
        (relative_ms << (WORKER_ID_BITS + SEQUENCE_BITS))
            | ((self.worker_id as u64) << SEQUENCE_BITS)
            | (sequence as u64)
    }

    /// Decompose an id minted by a generator sharing this epoch back into
    /// its `(timestamp_ms, worker_id, sequence)` components.
    pub fn decompose(&self, id: u64) -> (i64, u16, u16) {
        decompose(id, self.epoch_ms)
    }
}

/// Decompose an id into `(timestamp_ms, worker_id, sequence)` given the
/// epoch it was minted with.
pub fn decompose(id: u64, epoch_ms: i64) -> (i64, u16, u16) {
    let sequence = (id & MAX_SEQUENCE as u64) as u16;
    let worker_id = ((id >> SEQUENCE_BITS) & MAX_WORKER_ID as u64) as u16;
    let relative_ms = id >> (WORKER_ID_BITS + SEQUENCE_BITS);
    (relative_ms as i64 + epoch_ms, worker_id, sequence)
}

/// Derive a worker id from a MAC-style byte slice by hashing it into the
/// valid range. Discouraged per the design spec (collisions are possible
/// across instances); prefer explicit configuration.
pub fn worker_id_from_mac(mac: &[u8]) -> u16 {
    let mut hash: u32 = 2166136261;
    for byte in mac {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    (hash % (MAX_WORKER_ID as u32 + 1)) as u16
}
