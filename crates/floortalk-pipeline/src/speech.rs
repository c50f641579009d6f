use async_trait::async_trait;
use floortalk_core::{CaptureError, LanguageTag};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Speech capture boundary. Resolves with the accumulated transcript on
/// natural end, explicit stop, or silence; an empty transcript means no
/// speech was detected. Rejects only on genuine capture errors.
#[async_trait]
pub trait SpeechSource: Send + Sync {
    async fn listen(&self, lang: LanguageTag) -> Result<String, CaptureError>;
}

/// Speech playback boundary. Best-effort: failures are logged by the
/// implementation, never surfaced to the round.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str, lang: LanguageTag);
}

/// Sink that only logs, for headless runs and tests.
pub struct NullSink;

#[async_trait]
impl SpeechSink for NullSink {
    async fn speak(&self, text: &str, lang: LanguageTag) {
        tracing::debug!(locale = lang.speech_locale(), "speak: {text}");
    }
}

/// Source that replays queued transcripts, for tests. An exhausted queue
/// yields an empty transcript (silence).
pub struct ScriptedSource {
    transcripts: Mutex<VecDeque<String>>,
}

impl ScriptedSource {
    pub fn new(transcripts: Vec<&str>) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl SpeechSource for ScriptedSource {
    async fn listen(&self, _lang: LanguageTag) -> Result<String, CaptureError> {
        Ok(self
            .transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}
