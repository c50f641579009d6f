use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("unknown language tag: {0}")]
    UnknownLanguage(String),
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota store read failed: {0}")]
    StoreRead(String),

    #[error("quota store write failed: {0}")]
    StoreWrite(String),

    #[error("quota state encoding failed: {0}")]
    StateEncode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no API credential configured")]
    MissingCredential,

    #[error("backend rate limit persisted after retries")]
    RateLimited,

    #[error("backend returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ClarifyError {
    #[error("a choice was already submitted for this clarification round")]
    AlreadySelected,

    #[error("selected value is not among the offered options: {0}")]
    UnknownOption(String),

    #[error("clarification chooser went away before selecting")]
    Abandoned,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("speech capture failed: {0}")]
    Failed(String),
}

/// Umbrella error for one translation round. Every variant is caught at the
/// round boundary and mapped to a single user-facing message.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Clarify(#[from] ClarifyError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
