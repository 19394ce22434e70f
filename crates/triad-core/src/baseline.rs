use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::BaselineError;
use crate::llm::{DynGenerator, invoke_bounded};
use crate::retry::RetryPolicy;
use crate::workflow::round_secs;

const BASELINE_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Answer the question comprehensively.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineResult {
    pub query: String,
    pub response: String,
    /// Wall time in seconds, two decimals.
    pub time_taken: f64,
}

/// One direct generation call per query: no history, no critique loop.
pub struct SingleAgentBaseline {
    generator: DynGenerator,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SingleAgentBaseline {
    pub fn new(generator: DynGenerator, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            generator,
            timeout,
            retry,
        }
    }

    pub fn from_config(config: &Config, generator: DynGenerator) -> Self {
        Self::new(
            generator,
            config.llm.timeout(),
            RetryPolicy::from_config(&config.retry),
        )
    }

    #[instrument(name = "baseline.run", skip_all)]
    pub async fn run(&self, query: &str) -> Result<BaselineResult, BaselineError> {
        let started = Instant::now();
        let response = self
            .retry
            .run("baseline", || {
                invoke_bounded(
                    self.generator.as_ref(),
                    "baseline",
                    BASELINE_SYSTEM_PROMPT,
                    query,
                    self.timeout,
                )
            })
            .await?;

        let time_taken = round_secs(started.elapsed().as_secs_f64());
        info!(chars = response.len(), time_taken, "baseline completed");
        Ok(BaselineResult {
            query: query.to_string(),
            response,
            time_taken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::llm::ScriptedGenerator;
    use std::sync::Arc;

    #[tokio::test]
    async fn single_call_with_fixed_prompt() {
        let generator =
            Arc::new(ScriptedGenerator::new("m").with_replies(["Supervised uses labels."]));
        let baseline =
            SingleAgentBaseline::new(generator.clone(), Duration::from_secs(5), RetryPolicy::none());

        let result = baseline.run("Explain supervised learning").await.unwrap();
        assert_eq!(result.query, "Explain supervised learning");
        assert_eq!(result.response, "Supervised uses labels.");
        assert!(result.time_taken >= 0.0);

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system_prompt, BASELINE_SYSTEM_PROMPT);
        assert_eq!(calls[0].user_prompt, "Explain supervised learning");
    }

    #[tokio::test]
    async fn failure_is_classified() {
        let generator = Arc::new(
            ScriptedGenerator::new("m")
                .with_error(GenerationError::InvalidResponse("empty choices".into())),
        );
        let baseline =
            SingleAgentBaseline::new(generator, Duration::from_secs(5), RetryPolicy::default());

        let err = baseline.run("q").await.unwrap_err();
        assert!(matches!(err.0, GenerationError::InvalidResponse(_)));
    }
}
