use async_trait::async_trait;
use floortalk_core::{
    BackendError, LanguageTag, Translated, TranslationRequest, TranslationResult,
};

/// Turns one piece of source text into a structured translation result.
///
/// `translate` may come back with a clarification question;
/// `translate_clarified` never does — it always yields a final translation,
/// falling back to the raw model text when the reply does not match the
/// expected shape.
#[async_trait]
pub trait TranslatorBackend: Send + Sync {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResult, BackendError>;

    async fn translate_clarified(
        &self,
        resolved_value: &str,
        from: LanguageTag,
        to: LanguageTag,
    ) -> Result<Translated, BackendError>;
}
