pub mod clock;
pub mod governor;
pub mod state;
pub mod store;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use governor::{Admission, DenyReason, QuotaGovernor, QuotaLimits, QuotaSnapshot};
pub use state::QuotaState;
pub use store::{FileStore, KvStore, MemoryStore};
