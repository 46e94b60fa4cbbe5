use thiserror::Error;

/// Errors from the LLM transport.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("No API key configured (set TORQ_LLM_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}
