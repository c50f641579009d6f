use crate::round::{open_round, RoundState, SelectionSlot};
use async_trait::async_trait;
use floortalk_backend::TranslatorBackend;
use floortalk_core::{ClarificationPrompt, LanguageTag, RoundError, Translated};

/// External chooser (the UI) that renders options and eventually completes
/// the slot. The coordinator never renders anything itself.
#[async_trait]
pub trait ClarificationChooser: Send + Sync {
    async fn present(&self, prompt: &ClarificationPrompt, slot: SelectionSlot);
}

/// Drive one clarification round to a final translation: suspend until the
/// chooser submits exactly one selection, then invoke the backend at most
/// once with the resolved value.
pub async fn resolve(
    backend: &dyn TranslatorBackend,
    chooser: &dyn ClarificationChooser,
    prompt: &ClarificationPrompt,
    from: LanguageTag,
    to: LanguageTag,
) -> Result<Translated, RoundError> {
    let (slot, wait) = open_round(prompt);
    let mut state = RoundState::Pending;
    tracing::debug!(?state, options = prompt.options.len(), "clarification round opened");

    chooser.present(prompt, slot).await;
    let value = wait.recv().await?;
    state = RoundState::Selected;
    tracing::debug!(?state, value = %value, "selection received");

    state = RoundState::Resolving;
    tracing::debug!(?state, "requesting clarified translation");
    let translated = backend.translate_clarified(&value, from, to).await?;

    state = RoundState::Done;
    tracing::debug!(?state, "clarification round finished");
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use floortalk_core::{
        BackendError, ClarificationOption, TranslationRequest, TranslationResult,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingBackend {
        clarified_calls: AtomicUsize,
        clarified_values: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn new() -> Self {
            Self {
                clarified_calls: AtomicUsize::new(0),
                clarified_values: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TranslatorBackend for RecordingBackend {
        async fn translate(
            &self,
            _request: &TranslationRequest,
        ) -> Result<TranslationResult, BackendError> {
            panic!("coordinator must never call the initial translate");
        }

        async fn translate_clarified(
            &self,
            resolved_value: &str,
            _from: LanguageTag,
            _to: LanguageTag,
        ) -> Result<Translated, BackendError> {
            self.clarified_calls.fetch_add(1, Ordering::SeqCst);
            self.clarified_values
                .lock()
                .unwrap()
                .push(resolved_value.to_string());
            Ok(Translated {
                original: resolved_value.to_string(),
                translated: format!("translated({resolved_value})"),
                note: None,
            })
        }
    }

    struct PickByIndex(usize);

    #[async_trait]
    impl ClarificationChooser for PickByIndex {
        async fn present(&self, _prompt: &ClarificationPrompt, mut slot: SelectionSlot) {
            let value = slot.options()[self.0].clone();
            slot.submit(&value).unwrap();
        }
    }

    struct DropsTheSlot;

    #[async_trait]
    impl ClarificationChooser for DropsTheSlot {
        async fn present(&self, _prompt: &ClarificationPrompt, slot: SelectionSlot) {
            drop(slot);
        }
    }

    fn two_option_prompt() -> ClarificationPrompt {
        ClarificationPrompt {
            question_source: "哪一個？".to_string(),
            question_target: "อันไหน?".to_string(),
            options: vec![
                ClarificationOption {
                    source_label: "甲".to_string(),
                    target_label: "ก".to_string(),
                    resolved_value: "A".to_string(),
                },
                ClarificationOption {
                    source_label: "乙".to_string(),
                    target_label: "ข".to_string(),
                    resolved_value: "B".to_string(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_selecting_b_calls_backend_once_with_b() {
        let backend = RecordingBackend::new();
        let chooser = PickByIndex(1);

        let translated = resolve(
            &backend,
            &chooser,
            &two_option_prompt(),
            LanguageTag::Mandarin,
            LanguageTag::Thai,
        )
        .await
        .unwrap();

        assert_eq!(backend.clarified_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            backend.clarified_values.lock().unwrap().as_slice(),
            &["B".to_string()]
        );
        assert_eq!(translated.translated, "translated(B)");
    }

    #[tokio::test]
    async fn test_abandoned_chooser_fails_without_backend_call() {
        let backend = RecordingBackend::new();
        let chooser = DropsTheSlot;

        let result = resolve(
            &backend,
            &chooser,
            &two_option_prompt(),
            LanguageTag::Mandarin,
            LanguageTag::Thai,
        )
        .await;

        assert!(matches!(
            result,
            Err(RoundError::Clarify(floortalk_core::ClarifyError::Abandoned))
        ));
        assert_eq!(backend.clarified_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_late_selection_from_another_task() {
        struct HandsOff(Mutex<Option<SelectionSlot>>);

        #[async_trait]
        impl ClarificationChooser for HandsOff {
            async fn present(&self, _prompt: &ClarificationPrompt, slot: SelectionSlot) {
                *self.0.lock().unwrap() = Some(slot);
            }
        }

        let backend = RecordingBackend::new();
        let chooser = std::sync::Arc::new(HandsOff(Mutex::new(None)));

        let chooser_handle = std::sync::Arc::clone(&chooser);
        let submit = tokio::spawn(async move {
            // Wait until the coordinator has parked the slot with the chooser.
            loop {
                let taken = chooser_handle.0.lock().unwrap().take();
                if let Some(mut slot) = taken {
                    slot.submit("A").unwrap();
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        });

        let translated = resolve(
            &backend,
            chooser.as_ref(),
            &two_option_prompt(),
            LanguageTag::Mandarin,
            LanguageTag::Thai,
        )
        .await
        .unwrap();

        submit.await.unwrap();
        assert_eq!(translated.translated, "translated(A)");
        assert_eq!(backend.clarified_calls.load(Ordering::SeqCst), 1);
    }
}
