use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two languages this deployment speaks. Determines prompt vocabulary and
/// speech locale, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageTag {
    #[serde(rename = "zh")]
    Mandarin,
    #[serde(rename = "th")]
    Thai,
}

impl LanguageTag {
    /// Short tag used in config files and CLI flags.
    pub fn code(&self) -> &'static str {
        match self {
            LanguageTag::Mandarin => "zh",
            LanguageTag::Thai => "th",
        }
    }

    /// Locale string handed to the speech capture/playback layer.
    pub fn speech_locale(&self) -> &'static str {
        match self {
            LanguageTag::Mandarin => "zh-TW",
            LanguageTag::Thai => "th-TH",
        }
    }

    /// Human-readable name used when addressing the model.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageTag::Mandarin => "Mandarin Chinese",
            LanguageTag::Thai => "Thai",
        }
    }
}

impl FromStr for LanguageTag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-tw" | "mandarin" => Ok(LanguageTag::Mandarin),
            "th" | "th-th" | "thai" => Ok(LanguageTag::Thai),
            other => Err(ConfigError::UnknownLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One utterance or typed submission, consumed by a single round.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub source_text: String,
    pub from: LanguageTag,
    pub to: LanguageTag,
}

/// What the backend made of one piece of source text.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationResult {
    Translated(Translated),
    NeedsClarification(ClarificationPrompt),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translated {
    pub original: String,
    pub translated: String,
    pub note: Option<String>,
}

/// Question posed back to the speaker when the input was judged ambiguous.
/// `options` is non-empty; exactly one option is eventually selected.
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationPrompt {
    pub question_source: String,
    pub question_target: String,
    pub options: Vec<ClarificationOption>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationOption {
    pub source_label: String,
    pub target_label: String,
    pub resolved_value: String,
}
