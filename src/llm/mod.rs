mod error;
mod openai;

pub use error::LlmError;
pub use openai::OpenAiClient;

use crate::settings::LlmSettings;
use async_trait::async_trait;

/// Trait for the text-generation transport behind test generation.
///
/// The orchestrator only ever needs "prompt in, text out"; everything
/// else (model choice, endpoint, credentials) lives behind this seam so
/// providers can be swapped without touching the pipeline.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Complete a prompt and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Complete a prompt with a system message.
    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Blanket implementation for boxed trait objects.
#[async_trait]
impl Llm for Box<dyn Llm> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(prompt).await
    }

    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        (**self).complete_with_system(system, prompt).await
    }
}

/// Build a client from the configured provider settings.
pub fn build_client(settings: &LlmSettings) -> Result<Box<dyn Llm>, LlmError> {
    let api_key = settings.api_key_or_env().ok_or(LlmError::MissingApiKey)?;
    let base_url = settings
        .base_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
    let model = settings
        .model
        .clone()
        .unwrap_or_else(|| "gpt-4o".to_string());

    Ok(Box::new(
        OpenAiClient::new(base_url, api_key, model).with_max_tokens(settings.max_tokens),
    ))
}
