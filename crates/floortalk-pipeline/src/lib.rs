pub mod history;
pub mod pipeline;
pub mod speech;

pub use history::{HistoryEntry, HistoryLog};
pub use pipeline::{user_message, Pipeline, RoundOutcome};
pub use speech::{NullSink, ScriptedSource, SpeechSink, SpeechSource};
