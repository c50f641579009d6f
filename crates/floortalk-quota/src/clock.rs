use chrono::{DateTime, Local};
use std::sync::Mutex;

/// Source of wall-clock time for the governor. Day rollover uses the local
/// calendar date, so this hands out `DateTime<Local>`.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}

pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for deterministic pruning/rollover tests.
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += duration;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}
