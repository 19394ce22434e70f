//! Text-generation client abstraction.
//!
//! Agents only ever see [`TextGenerator`]; the concrete client is picked from
//! `[llm].provider` when the workflow is assembled.

mod openai;
mod scripted;

pub use openai::OpenAiGenerator;
pub use scripted::{RecordedCall, ScriptedGenerator};

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::error::GenerationError;
use crate::metrics::record_generation;
use crate::{ApiKey, TriadError};

/// Sampling settings shared by every call a client makes.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&LlmConfig> for GenerationSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// A remote (or scripted) text-completion service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `user_prompt` under `system_prompt`.
    async fn invoke(&self, system_prompt: &str, user_prompt: &str)
    -> Result<String, GenerationError>;

    /// Model identifier stamped on produced messages.
    fn model_id(&self) -> &str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Invoke `generator` with a hard deadline, recording latency under `label`.
pub async fn invoke_bounded(
    generator: &dyn TextGenerator,
    label: &str,
    system_prompt: &str,
    user_prompt: &str,
    timeout: Duration,
) -> Result<String, GenerationError> {
    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, generator.invoke(system_prompt, user_prompt))
        .await
        .unwrap_or(Err(GenerationError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }));

    let status = if outcome.is_ok() { "ok" } else { "error" };
    record_generation(label, status, started.elapsed().as_millis() as u64);
    outcome
}

/// Build the client named by `config.provider`.
pub fn build_generator(config: &LlmConfig) -> Result<DynGenerator, TriadError> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = ApiKey::from_env(&config.api_key_env)?;
            tracing::debug!(model = %config.model, api_key = %api_key, "using openai-compatible provider");
            let generator = OpenAiGenerator::new(config, api_key)?;
            Ok(Arc::new(generator))
        }
        "scripted" => Ok(Arc::new(ScriptedGenerator::new(config.model.clone()))),
        other => Err(TriadError::InvalidConfiguration(format!(
            "unsupported llm.provider {other:?} (expected \"openai\" or \"scripted\")"
        ))),
    }
}
