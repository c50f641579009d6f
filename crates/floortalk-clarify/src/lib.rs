pub mod coordinator;
pub mod round;

pub use coordinator::{resolve, ClarificationChooser};
pub use round::{open_round, RoundState, SelectionSlot, SelectionWait};
