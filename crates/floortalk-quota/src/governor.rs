use crate::clock::TimeSource;
use crate::state::{QuotaState, WINDOW_MS};
use crate::store::KvStore;
use chrono::{DateTime, Local};
use floortalk_core::QuotaError;
use std::fmt;

const STATE_KEY: &str = "quota";

/// Client-side ceilings mirroring the backend's free-tier limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub rpm: u32,
    pub rpd: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self { rpm: 15, rpd: 1500 }
    }
}

/// Point-in-time usage view, polled by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub minute_used: u32,
    pub minute_remaining: u32,
    pub minute_reset_in_seconds: u32,
    pub day_used: u32,
    pub day_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Deny(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    DailyCapReached { limit: u32 },
    MinuteCapReached { limit: u32, reset_in_seconds: u32 },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::DailyCapReached { limit } => {
                write!(f, "daily cap of {limit} requests reached, resets next calendar day")
            }
            DenyReason::MinuteCapReached {
                limit,
                reset_in_seconds,
            } => {
                write!(
                    f,
                    "per-minute cap of {limit} requests reached, resets in {reset_in_seconds}s"
                )
            }
        }
    }
}

/// Advisory admission control for backend calls. The true enforcement is the
/// backend's own rate limiting; this layer gives pre-flight feedback and
/// avoids wasted calls. State is read-modify-written non-atomically, so
/// concurrent processes sharing one store can lose updates.
pub struct QuotaGovernor {
    store: Box<dyn KvStore>,
    clock: Box<dyn TimeSource>,
    limits: QuotaLimits,
}

impl QuotaGovernor {
    pub fn new(store: Box<dyn KvStore>, clock: Box<dyn TimeSource>, limits: QuotaLimits) -> Self {
        Self {
            store,
            clock,
            limits,
        }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    fn load(&self) -> Result<(QuotaState, DateTime<Local>), QuotaError> {
        let now = self.clock.now();
        let blob = self.store.get(STATE_KEY)?;
        let mut state = QuotaState::decode(blob.as_deref(), now.date_naive());
        state.roll_day(now.date_naive());
        state.prune(now.timestamp_millis());
        Ok((state, now))
    }

    fn persist(&self, state: &QuotaState) -> Result<(), QuotaError> {
        self.store.set(STATE_KEY, &state.encode()?)
    }

    fn snapshot_of(&self, state: &QuotaState, now: DateTime<Local>) -> QuotaSnapshot {
        let minute_used = state.minute_window.len() as u32;
        let minute_reset_in_seconds = match state.minute_window.first() {
            Some(&oldest) => {
                let remaining_ms = oldest + WINDOW_MS - now.timestamp_millis();
                (remaining_ms.max(0) as u64).div_ceil(1000) as u32
            }
            None => 0,
        };
        QuotaSnapshot {
            minute_used,
            minute_remaining: self.limits.rpm.saturating_sub(minute_used),
            minute_reset_in_seconds,
            day_used: state.day_count,
            day_remaining: self.limits.rpd.saturating_sub(state.day_count),
        }
    }

    /// Load, prune, roll over, persist the pruned state back, and return a
    /// usage snapshot. Persisting on a read is deliberate: pruning mutates the
    /// on-disk representation.
    pub fn evaluate(&self) -> Result<QuotaSnapshot, QuotaError> {
        let (state, now) = self.load()?;
        self.persist(&state)?;
        Ok(self.snapshot_of(&state, now))
    }

    /// Pre-flight admission check. Day exhaustion wins over minute exhaustion.
    pub fn can_proceed(&self) -> Result<Admission, QuotaError> {
        let snapshot = self.evaluate()?;
        if snapshot.day_remaining == 0 {
            return Ok(Admission::Deny(DenyReason::DailyCapReached {
                limit: self.limits.rpd,
            }));
        }
        if snapshot.minute_remaining == 0 {
            return Ok(Admission::Deny(DenyReason::MinuteCapReached {
                limit: self.limits.rpm,
                reset_in_seconds: snapshot.minute_reset_in_seconds,
            }));
        }
        Ok(Admission::Admit)
    }

    /// Count one backend attempt that actually reached the network.
    pub fn record_request(&self) -> Result<(), QuotaError> {
        let (mut state, now) = self.load()?;
        state.minute_window.push(now.timestamp_millis());
        state.day_count += 1;
        self.persist(&state)?;
        tracing::debug!(
            minute_used = state.minute_window.len(),
            day_used = state.day_count,
            "recorded backend request"
        );
        Ok(())
    }
}
