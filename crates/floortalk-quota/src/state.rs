use chrono::NaiveDate;
use floortalk_core::QuotaError;
use serde::{Deserialize, Serialize};

/// Width of the sliding per-minute window.
pub const WINDOW_MS: i64 = 60_000;

/// Persisted usage counters. Reloaded fresh on every governor operation;
/// nothing holds this in memory across operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaState {
    /// Ascending epoch-millis timestamps of requests within the last minute.
    pub minute_window: Vec<i64>,
    pub day_count: u32,
    /// Local calendar date the day counter belongs to.
    pub day_start: NaiveDate,
}

impl QuotaState {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            minute_window: Vec::new(),
            day_count: 0,
            day_start: today,
        }
    }

    /// Decode a persisted blob. Missing or unparsable blobs become an empty
    /// state for today.
    pub fn decode(blob: Option<&str>, today: NaiveDate) -> Self {
        match blob {
            Some(raw) => match serde_json::from_str(raw) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("discarding unparsable quota state: {e}");
                    Self::empty(today)
                }
            },
            None => Self::empty(today),
        }
    }

    pub fn encode(&self) -> Result<String, QuotaError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Drop minute-window entries that fell out of the trailing 60 seconds.
    pub fn prune(&mut self, now_ms: i64) {
        self.minute_window.retain(|&ts| ts > now_ms - WINDOW_MS);
    }

    /// Reset the day counter when the local calendar date has advanced.
    /// Calendar-day comparison, not elapsed 24h.
    pub fn roll_day(&mut self, today: NaiveDate) {
        if self.day_start != today {
            self.day_count = 0;
            self.day_start = today;
        }
    }
}
