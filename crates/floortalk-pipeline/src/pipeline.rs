use crate::history::HistoryLog;
use crate::speech::{SpeechSink, SpeechSource};
use async_trait::async_trait;
use floortalk_backend::TranslatorBackend;
use floortalk_clarify::ClarificationChooser;
use floortalk_core::{
    BackendError, LanguageTag, QuotaError, RoundError, Translated, TranslationRequest,
    TranslationResult,
};
use floortalk_quota::{Admission, DenyReason, QuotaGovernor, QuotaSnapshot};
use std::sync::Arc;

/// Terminal state of one translation round.
#[derive(Debug)]
pub enum RoundOutcome {
    /// Translation spoken (and logged) successfully.
    Delivered(Translated),
    /// Quota governor refused admission; no backend call was made.
    Denied(DenyReason),
    /// Capture finished with an empty transcript. Not an error.
    NoSpeech,
    /// The round failed; carries the user-facing message.
    Failed(String),
}

/// Map a round error to the single message shown to the operator. Raw
/// backend details go to the log, not the user.
pub fn user_message(err: &RoundError) -> String {
    match err {
        RoundError::Quota(_) => {
            "Could not read the usage tracker. Please try again.".to_string()
        }
        RoundError::Backend(BackendError::MissingCredential) => {
            "No API key is configured. Set FLOORTALK_API_KEY or add api_key to the config."
                .to_string()
        }
        RoundError::Backend(BackendError::RateLimited) => {
            "The translation service is busy right now. Wait a moment and try again.".to_string()
        }
        RoundError::Backend(_) => {
            "Translation failed. Please try again.".to_string()
        }
        RoundError::Clarify(_) => {
            "The clarification was not answered. Please repeat the sentence.".to_string()
        }
        RoundError::Capture(_) => {
            "Could not capture speech. Check the microphone and try again.".to_string()
        }
    }
}

/// Backend wrapper that charges the quota for every call that got past the
/// credential check. Recording failures are logged and swallowed so a broken
/// state file cannot lose a translation that already succeeded.
struct RecordingBackend {
    inner: Box<dyn TranslatorBackend>,
    governor: Arc<QuotaGovernor>,
}

impl RecordingBackend {
    fn charge(&self) {
        if let Err(e) = self.governor.record_request() {
            tracing::warn!("failed to record quota usage: {e}");
        }
    }

    fn charge_unless_unsent(&self, err: Option<&BackendError>) {
        // MissingCredential is raised before anything reaches the network.
        if !matches!(err, Some(BackendError::MissingCredential)) {
            self.charge();
        }
    }
}

#[async_trait]
impl TranslatorBackend for RecordingBackend {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResult, BackendError> {
        let result = self.inner.translate(request).await;
        self.charge_unless_unsent(result.as_ref().err());
        result
    }

    async fn translate_clarified(
        &self,
        resolved_value: &str,
        from: LanguageTag,
        to: LanguageTag,
    ) -> Result<Translated, BackendError> {
        let result = self.inner.translate_clarified(resolved_value, from, to).await;
        self.charge_unless_unsent(result.as_ref().err());
        result
    }
}

/// Drives one translation round end to end: admission, backend call,
/// optional clarification, delivery, history.
pub struct Pipeline {
    governor: Arc<QuotaGovernor>,
    backend: RecordingBackend,
    chooser: Box<dyn ClarificationChooser>,
    sink: Box<dyn SpeechSink>,
    history: Option<HistoryLog>,
    from: LanguageTag,
    to: LanguageTag,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        governor: Arc<QuotaGovernor>,
        backend: Box<dyn TranslatorBackend>,
        chooser: Box<dyn ClarificationChooser>,
        sink: Box<dyn SpeechSink>,
        history: Option<HistoryLog>,
        from: LanguageTag,
        to: LanguageTag,
    ) -> Self {
        let backend = RecordingBackend {
            inner: backend,
            governor: Arc::clone(&governor),
        };
        Self {
            governor,
            backend,
            chooser,
            sink,
            history,
            from,
            to,
        }
    }

    pub fn from_lang(&self) -> LanguageTag {
        self.from
    }

    pub fn to_lang(&self) -> LanguageTag {
        self.to
    }

    /// Reverse the translation direction for subsequent rounds.
    pub fn swap_languages(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
        tracing::info!(from = self.from.code(), to = self.to.code(), "languages swapped");
    }

    pub fn quota_snapshot(&self) -> Result<QuotaSnapshot, QuotaError> {
        self.governor.evaluate()
    }

    pub fn history_entries(&self) -> Vec<crate::history::HistoryEntry> {
        self.history
            .as_ref()
            .map(|log| log.entries())
            .unwrap_or_default()
    }

    /// One round from typed text.
    pub async fn translate_text(&self, text: &str) -> RoundOutcome {
        match self.admit() {
            Ok(Admission::Admit) => {}
            Ok(Admission::Deny(reason)) => return RoundOutcome::Denied(reason),
            Err(outcome) => return outcome,
        }
        self.dispatch(text).await
    }

    /// One round from speech. Admission is checked before capture so the
    /// operator is not asked to speak a sentence that cannot be sent.
    pub async fn translate_voice(&self, source: &dyn SpeechSource) -> RoundOutcome {
        match self.admit() {
            Ok(Admission::Admit) => {}
            Ok(Admission::Deny(reason)) => return RoundOutcome::Denied(reason),
            Err(outcome) => return outcome,
        }

        let transcript = match source.listen(self.from).await {
            Ok(transcript) => transcript,
            Err(e) => {
                let err = RoundError::from(e);
                tracing::warn!("speech capture failed: {err}");
                return RoundOutcome::Failed(user_message(&err));
            }
        };
        if transcript.trim().is_empty() {
            tracing::debug!("capture ended with no speech");
            return RoundOutcome::NoSpeech;
        }
        self.dispatch(&transcript).await
    }

    fn admit(&self) -> Result<Admission, RoundOutcome> {
        match self.governor.can_proceed() {
            Ok(admission) => {
                if let Admission::Deny(reason) = &admission {
                    tracing::info!(%reason, "round denied by quota governor");
                }
                Ok(admission)
            }
            Err(e) => {
                let err = RoundError::from(e);
                tracing::error!("quota check failed: {err}");
                Err(RoundOutcome::Failed(user_message(&err)))
            }
        }
    }

    async fn dispatch(&self, text: &str) -> RoundOutcome {
        let request = TranslationRequest {
            source_text: text.to_string(),
            from: self.from,
            to: self.to,
        };

        let translated = match self.run_round(&request).await {
            Ok(translated) => translated,
            Err(err) => {
                tracing::warn!("round failed: {err}");
                return RoundOutcome::Failed(user_message(&err));
            }
        };

        self.sink.speak(&translated.translated, self.to).await;
        if let Some(history) = &self.history {
            history.record(
                &translated,
                self.from,
                self.to,
                chrono::Local::now().timestamp_millis(),
            );
        }
        RoundOutcome::Delivered(translated)
    }

    async fn run_round(&self, request: &TranslationRequest) -> Result<Translated, RoundError> {
        match self.backend.translate(request).await? {
            TranslationResult::Translated(translated) => Ok(translated),
            TranslationResult::NeedsClarification(prompt) => {
                tracing::info!(options = prompt.options.len(), "ambiguous input, asking operator");
                floortalk_clarify::resolve(
                    &self.backend,
                    self.chooser.as_ref(),
                    &prompt,
                    self.from,
                    self.to,
                )
                .await
            }
        }
    }
}
