use serde::{Deserialize, Serialize};

// Request envelope for the generateContent endpoint.

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    /// Constrains the reply body to syntactically valid JSON.
    pub response_mime_type: String,
}

// Response envelope.

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: ResponseContent,
}

#[derive(Debug, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: String,
}

/// Error envelope carried by non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

/// The JSON payload embedded in the model's reply text: either a finished
/// translation or a clarification question with options.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelReply {
    Translate {
        original: String,
        translated: String,
        #[serde(default)]
        note: Option<String>,
    },
    Clarify {
        question_source: String,
        question_target: String,
        options: Vec<WireOption>,
    },
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct WireOption {
    pub source: String,
    pub target: String,
    pub value: String,
}
