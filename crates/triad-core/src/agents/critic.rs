//! Critic agent: scores a candidate answer.

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::{Agent, AgentCore, CritiqueResult};
use crate::error::GenerationError;

pub struct CriticAgent {
    core: AgentCore,
    default_score: u8,
}

impl CriticAgent {
    pub fn new(core: AgentCore, default_score: u8) -> Self {
        Self {
            core,
            default_score,
        }
    }

    pub fn default_score(&self) -> u8 {
        self.default_score
    }

    #[instrument(name = "agent.critique", skip_all, fields(agent_id = %self.core.id()))]
    pub async fn critique(
        &self,
        query: &str,
        candidate_response: &str,
    ) -> Result<CritiqueResult, GenerationError> {
        let prompt = format!(
            "Original query: \"{query}\"\n\n\
             Response to evaluate:\n{candidate_response}\n\n\
             Please evaluate this response for:\n\
             1. Accuracy and factual correctness\n\
             2. Completeness in addressing the query\n\
             3. Clarity and coherence\n\
             4. Any potential hallucinations or unsupported claims\n\n\
             Reply with a single JSON object and nothing else:\n\
             {{\"score\": <integer 1-10>, \"critique\": \"<overall assessment>\", \
             \"issues\": [\"<specific issue>\"], \"improvements\": [\"<suggested improvement>\"]}}"
        );
        let raw = self.core.generate(&prompt).await?;
        let result = CritiqueResult::parse(&raw, self.default_score);

        match &result.parse_error {
            Some(err) => warn!(
                error = %err,
                fallback_score = result.score,
                "critic output had no usable score"
            ),
            None => info!(score = result.score, "critic scored candidate"),
        }
        Ok(result)
    }
}

#[async_trait]
impl Agent for CriticAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }
}
