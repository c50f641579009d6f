use floortalk_core::{LanguageTag, Translated};
use floortalk_quota::KvStore;
use serde::{Deserialize, Serialize};

const HISTORY_KEY: &str = "history";

/// One delivered translation, kept for the session-review view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp_ms: i64,
    pub original: String,
    pub translated: String,
    pub from: LanguageTag,
    pub to: LanguageTag,
}

/// Capped, best-effort log of delivered translations. Failures to persist
/// are logged and swallowed; history must never fail a round.
pub struct HistoryLog {
    store: Box<dyn KvStore>,
    max_entries: usize,
}

impl HistoryLog {
    pub fn new(store: Box<dyn KvStore>, max_entries: usize) -> Self {
        Self { store, max_entries }
    }

    /// Append one delivered translation, dropping the oldest entries beyond
    /// the cap.
    pub fn record(
        &self,
        translated: &Translated,
        from: LanguageTag,
        to: LanguageTag,
        timestamp_ms: i64,
    ) {
        let mut entries = self.entries();
        entries.push(HistoryEntry {
            timestamp_ms,
            original: translated.original.clone(),
            translated: translated.translated.clone(),
            from,
            to,
        });
        let overflow = entries.len().saturating_sub(self.max_entries);
        if overflow > 0 {
            entries.drain(..overflow);
        }
        let blob = match serde_json::to_string(&entries) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("failed to encode history: {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(HISTORY_KEY, &blob) {
            tracing::warn!("failed to persist history: {e}");
        }
    }

    /// All stored entries, oldest first. Missing or unparsable blobs are
    /// treated as an empty log.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let blob = match self.store.get(HISTORY_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read history: {e}");
                return Vec::new();
            }
        };
        serde_json::from_str(&blob).unwrap_or_else(|e| {
            tracing::warn!("discarding unparsable history: {e}");
            Vec::new()
        })
    }
}
