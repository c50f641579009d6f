use crate::backend_trait::TranslatorBackend;
use crate::prompt;
use crate::wire::{ErrorEnvelope, GenerateRequest, GenerateResponse, ModelReply};
use async_trait::async_trait;
use floortalk_core::{
    BackendError, ClarificationOption, ClarificationPrompt, LanguageTag, Translated,
    TranslationRequest, TranslationResult,
};
use std::time::Duration;

/// Credential baked in at build time, overridable per deployment.
pub const BUILD_TIME_KEY: Option<&str> = option_env!("FLOORTALK_API_KEY");

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// User-supplied override falling back to the build-time default. Resolved at
/// call time; absence is a configuration error, not a network error.
pub struct Credentials {
    override_key: Option<String>,
    default_key: Option<String>,
}

impl Credentials {
    pub fn new(override_key: Option<String>, default_key: Option<String>) -> Self {
        Self {
            override_key,
            default_key,
        }
    }

    pub fn from_config(api_key: Option<String>) -> Self {
        Self::new(api_key, BUILD_TIME_KEY.map(str::to_string))
    }

    pub fn resolve(&self) -> Option<&str> {
        self.override_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .or(self.default_key.as_deref())
    }
}

/// Raw reply from one HTTP attempt, before any parsing.
#[derive(Debug, Clone)]
pub struct WireReply {
    pub status: u16,
    pub body: String,
}

/// Seam between the retry/parse logic and the actual HTTP stack.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<WireReply, BackendError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<WireReply, BackendError> {
        (**self).send(api_key, request).await
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<WireReply, BackendError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(WireReply { status, body })
    }
}

/// Client for the hosted language-model completion endpoint, with bounded
/// retry on 429 responses. The client-side quota governor prevents
/// predictable overuse; this retry absorbs unpredictable backend-side
/// throttling (burst contention on a shared key).
pub struct GeminiClient {
    transport: Box<dyn Transport>,
    credentials: Credentials,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(transport: Box<dyn Transport>, credentials: Credentials, temperature: f32) -> Self {
        Self {
            transport,
            credentials,
            temperature,
        }
    }

    async fn send_with_retry(
        &self,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<String, BackendError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let reply = self.transport.send(api_key, request).await?;

            if reply.status == 429 {
                if attempt > MAX_RETRIES {
                    return Err(BackendError::RateLimited);
                }
                let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    "backend rate-limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !(200..300).contains(&reply.status) {
                return Err(BackendError::Upstream {
                    status: reply.status,
                    message: extract_error_message(&reply.body),
                });
            }

            return extract_reply_text(&reply.body);
        }
    }
}

#[async_trait]
impl TranslatorBackend for GeminiClient {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<TranslationResult, BackendError> {
        let api_key = self
            .credentials
            .resolve()
            .ok_or(BackendError::MissingCredential)?
            .to_string();

        let wire = prompt::initial_request(request, self.temperature);
        let text = self.send_with_retry(&api_key, &wire).await?;

        match parse_model_reply(&text)? {
            ModelReply::Translate {
                translated, note, ..
            } => Ok(TranslationResult::Translated(Translated {
                // The model echoes the input back; the caller's text is
                // authoritative.
                original: request.source_text.clone(),
                translated,
                note,
            })),
            ModelReply::Clarify {
                question_source,
                question_target,
                options,
            } => {
                if options.is_empty() {
                    return Err(BackendError::MalformedResponse(
                        "clarify reply carried no options".to_string(),
                    ));
                }
                Ok(TranslationResult::NeedsClarification(ClarificationPrompt {
                    question_source,
                    question_target,
                    options: options
                        .into_iter()
                        .map(|o| ClarificationOption {
                            source_label: o.source,
                            target_label: o.target,
                            resolved_value: o.value,
                        })
                        .collect(),
                }))
            }
        }
    }

    async fn translate_clarified(
        &self,
        resolved_value: &str,
        from: LanguageTag,
        to: LanguageTag,
    ) -> Result<Translated, BackendError> {
        let api_key = self
            .credentials
            .resolve()
            .ok_or(BackendError::MissingCredential)?
            .to_string();

        let wire = prompt::clarified_request(resolved_value, from, to, self.temperature);
        let text = self.send_with_retry(&api_key, &wire).await?;

        match parse_model_reply(&text) {
            Ok(ModelReply::Translate {
                translated, note, ..
            }) => Ok(Translated {
                original: resolved_value.to_string(),
                translated,
                note,
            }),
            _ => Ok(lenient_translated(resolved_value, &text)),
        }
    }
}

/// The clarified path never fails the round on a shape mismatch: show the raw
/// model text, or the resolved value itself when even that is absent.
fn lenient_translated(resolved_value: &str, raw: &str) -> Translated {
    let stripped = strip_code_fence(raw);
    let trimmed = stripped.trim();
    tracing::warn!(
        raw = %raw,
        "clarified reply did not match the translate shape, using raw text"
    );
    Translated {
        original: resolved_value.to_string(),
        translated: if trimmed.is_empty() {
            resolved_value.to_string()
        } else {
            trimmed.to_string()
        },
        note: None,
    }
}

fn extract_error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(message) = envelope.error.and_then(|e| e.message) {
            return message;
        }
    }
    let mut snippet = body.trim().to_string();
    if snippet.len() > 200 {
        snippet.truncate(200);
    }
    snippet
}

fn extract_reply_text(body: &str) -> Result<String, BackendError> {
    let response: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        tracing::error!(body = %body, "unparsable response envelope");
        BackendError::MalformedResponse(format!("invalid response envelope: {e}"))
    })?;

    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| {
            tracing::error!(body = %body, "response envelope carried no candidate text");
            BackendError::MalformedResponse("no candidate text in response".to_string())
        })
}

/// The model sometimes wraps its JSON in a markdown code fence despite the
/// mime-type constraint.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .trim_end_matches('`')
        .trim()
}

fn parse_model_reply(text: &str) -> Result<ModelReply, BackendError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        tracing::error!(text = %text, "model reply did not match either expected shape");
        BackendError::MalformedResponse(format!("unexpected reply shape: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedTransport {
        replies: Mutex<VecDeque<WireReply>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<WireReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn user_text(&self, call: usize) -> String {
            self.requests.lock().unwrap()[call].contents[0].parts[0]
                .text
                .clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _api_key: &str,
            request: &GenerateRequest,
        ) -> Result<WireReply, BackendError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| BackendError::Transport("no scripted reply left".to_string()))
        }
    }

    fn ok_reply(inner_json: &str) -> WireReply {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": inner_json}]}}]
        })
        .to_string();
        WireReply { status: 200, body }
    }

    fn rate_limited() -> WireReply {
        WireReply {
            status: 429,
            body: r#"{"error":{"message":"Resource has been exhausted"}}"#.to_string(),
        }
    }

    fn client_with(
        transport: Box<dyn Transport>,
    ) -> GeminiClient {
        GeminiClient::new(
            transport,
            Credentials::new(Some("test-key".to_string()), None),
            0.2,
        )
    }

    fn mandarin_request(text: &str) -> TranslationRequest {
        TranslationRequest {
            source_text: text.to_string(),
            from: LanguageTag::Mandarin,
            to: LanguageTag::Thai,
        }
    }

    const TRANSLATE_JSON: &str =
        r#"{"type":"translate","original":"echo","translated":"ยกกล่องนั้น","note":"polite"}"#;

    #[test]
    fn test_credentials_override_wins() {
        let creds = Credentials::new(Some("user".to_string()), Some("default".to_string()));
        assert_eq!(creds.resolve(), Some("user"));
    }

    #[test]
    fn test_credentials_blank_override_falls_back() {
        let creds = Credentials::new(Some("   ".to_string()), Some("default".to_string()));
        assert_eq!(creds.resolve(), Some("default"));
    }

    #[test]
    fn test_credentials_absent_everywhere() {
        let creds = Credentials::new(None, None);
        assert_eq!(creds.resolve(), None);
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let transport = ScriptedTransport::new(vec![ok_reply(TRANSLATE_JSON)]);
        let calls = std::sync::Arc::new(transport);
        let client = GeminiClient::new(
            Box::new(std::sync::Arc::clone(&calls)),
            Credentials::new(None, None),
            0.2,
        );

        let result = client.translate(&mandarin_request("搬箱子")).await;
        assert!(matches!(result, Err(BackendError::MissingCredential)));
        // No request was ever attempted.
        assert_eq!(calls.calls(), 0);
    }

    #[tokio::test]
    async fn test_translate_happy_path_keeps_source_text() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply(TRANSLATE_JSON)]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let result = client.translate(&mandarin_request("搬那個箱子")).await.unwrap();
        match result {
            TranslationResult::Translated(t) => {
                // `original` is the exact source text, not the model's echo.
                assert_eq!(t.original, "搬那個箱子");
                assert_eq!(t.translated, "ยกกล่องนั้น");
                assert_eq!(t.note.as_deref(), Some("polite"));
            }
            other => panic!("expected Translated, got {other:?}"),
        }
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.user_text(0), "搬那個箱子");
    }

    #[tokio::test]
    async fn test_translate_clarify_shape() {
        let clarify = r#"{
            "type":"clarify",
            "question_source":"弄哪一個？",
            "question_target":"อันไหน?",
            "options":[
                {"source":"修機器","target":"ซ่อมเครื่อง","value":"修理機器"},
                {"source":"掃地","target":"กวาดพื้น","value":"打掃地板"}
            ]
        }"#;
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply(clarify)]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let result = client.translate(&mandarin_request("那個弄一下")).await.unwrap();
        match result {
            TranslationResult::NeedsClarification(prompt) => {
                assert_eq!(prompt.question_source, "弄哪一個？");
                assert_eq!(prompt.options.len(), 2);
                assert_eq!(prompt.options[0].resolved_value, "修理機器");
            }
            other => panic!("expected NeedsClarification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_translate_clarify_without_options_is_malformed() {
        let clarify = r#"{"type":"clarify","question_source":"q","question_target":"q","options":[]}"#;
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply(clarify)]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let result = client.translate(&mandarin_request("那個")).await;
        assert!(matches!(result, Err(BackendError::MalformedResponse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_twice_then_succeed() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![
            rate_limited(),
            rate_limited(),
            ok_reply(TRANSLATE_JSON),
        ]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let start = tokio::time::Instant::now();
        let result = client.translate(&mandarin_request("快一點")).await;
        assert!(result.is_ok());
        // Exactly three attempts, after backoffs of 2s then 4s.
        assert_eq!(transport.calls(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_surfaces_rate_limit() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            rate_limited(),
        ]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let start = tokio::time::Instant::now();
        let result = client.translate(&mandarin_request("快一點")).await;
        assert!(matches!(result, Err(BackendError::RateLimited)));
        // Initial attempt plus three retries, after 2s + 4s + 8s.
        assert_eq!(transport.calls(), 4);
        assert!(start.elapsed() >= Duration::from_secs(14));
    }

    #[tokio::test]
    async fn test_upstream_error_extracts_message() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![WireReply {
            status: 500,
            body: r#"{"error":{"message":"internal error","details":[]}}"#.to_string(),
        }]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        match client.translate(&mandarin_request("x")).await {
            Err(BackendError::Upstream { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal error");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upstream_error_without_envelope_uses_body_snippet() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![WireReply {
            status: 503,
            body: "Service Unavailable".to_string(),
        }]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        match client.translate(&mandarin_request("x")).await {
            Err(BackendError::Upstream { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_envelope_fails() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![WireReply {
            status: 200,
            body: "not json at all".to_string(),
        }]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let result = client.translate(&mandarin_request("x")).await;
        assert!(matches!(result, Err(BackendError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_fenced_reply_still_parses() {
        let fenced = format!("```json\n{TRANSLATE_JSON}\n```");
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply(&fenced)]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let result = client.translate(&mandarin_request("搬箱子")).await.unwrap();
        assert!(matches!(result, TranslationResult::Translated(_)));
    }

    #[tokio::test]
    async fn test_clarified_happy_path() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply(TRANSLATE_JSON)]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let translated = client
            .translate_clarified("修理機器", LanguageTag::Mandarin, LanguageTag::Thai)
            .await
            .unwrap();
        assert_eq!(translated.original, "修理機器");
        assert_eq!(translated.translated, "ยกกล่องนั้น");
        // The resolved value travels in the inline instruction.
        assert!(transport.user_text(0).contains("修理機器"));
    }

    #[tokio::test]
    async fn test_clarified_falls_back_to_raw_text() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply(
            "ซ่อมเครื่องจักรตอนนี้",
        )]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let translated = client
            .translate_clarified("修理機器", LanguageTag::Mandarin, LanguageTag::Thai)
            .await
            .unwrap();
        assert_eq!(translated.translated, "ซ่อมเครื่องจักรตอนนี้");
        assert_eq!(translated.original, "修理機器");
        assert!(translated.note.is_none());
    }

    #[tokio::test]
    async fn test_clarified_never_returns_second_clarification() {
        let clarify = r#"{"type":"clarify","question_source":"q","question_target":"q","options":[{"source":"a","target":"b","value":"c"}]}"#;
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply(clarify)]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        // A clarify-shaped second reply is treated as raw text, not re-asked.
        let translated = client
            .translate_clarified("修理機器", LanguageTag::Mandarin, LanguageTag::Thai)
            .await
            .unwrap();
        assert!(translated.translated.contains("clarify"));
    }

    #[tokio::test]
    async fn test_clarified_empty_reply_uses_resolved_value() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![ok_reply("   ")]));
        let client = client_with(Box::new(std::sync::Arc::clone(&transport)));

        let translated = client
            .translate_clarified("修理機器", LanguageTag::Mandarin, LanguageTag::Thai)
            .await
            .unwrap();
        assert_eq!(translated.translated, "修理機器");
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }
}
