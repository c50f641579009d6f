pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{
    BackendError, CaptureError, ClarifyError, ConfigError, QuotaError, RoundError,
};
pub use types::{
    ClarificationOption, ClarificationPrompt, LanguageTag, Translated, TranslationRequest,
    TranslationResult,
};
