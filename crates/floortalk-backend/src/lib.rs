pub mod backend_trait;
pub mod gemini;
pub mod prompt;
pub mod wire;

pub use backend_trait::TranslatorBackend;
pub use gemini::{Credentials, GeminiClient, HttpTransport, Transport, WireReply};
