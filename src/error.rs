use thiserror::Error;

/// Represents all possible errors that can occur in Torq
#[derive(Error, Debug)]
pub enum TorqError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Type alias for Result with TorqError
pub type Result<T> = std::result::Result<T, TorqError>;
