//! Synthesizer agent: folds retrieved material into a single answer.

use async_trait::async_trait;
use tracing::{info, instrument};

use super::{Agent, AgentCore};
use crate::error::GenerationError;

pub struct SynthesizerAgent {
    core: AgentCore,
}

impl SynthesizerAgent {
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }

    #[instrument(name = "agent.synthesize", skip_all, fields(agent_id = %self.core.id()))]
    pub async fn synthesize(
        &self,
        query: &str,
        retrieved_info: &str,
    ) -> Result<String, GenerationError> {
        let prompt = format!(
            "Original query: \"{query}\"\n\n\
             Retrieved information:\n{retrieved_info}\n\n\
             Please synthesize this information into a clear, comprehensive answer.\n\
             Ensure the response is well-structured and directly addresses the query."
        );
        let answer = self.core.generate(&prompt).await?;
        info!(chars = answer.len(), "synthesizer produced answer");
        Ok(answer)
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentRole, AgentSettings};
    use crate::llm::ScriptedGenerator;
    use crate::message::{Message, MessageType};
    use crate::prompts::PromptStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn synthesize_embeds_query_and_material() {
        let generator = Arc::new(
            ScriptedGenerator::new("gpt-test").with_replies(["Answer.", "Chatty reply"]),
        );
        let mut agent = SynthesizerAgent::new(AgentCore::new(
            AgentRole::Synthesizer,
            generator.clone(),
            &PromptStore::new(),
            &AgentSettings::default(),
        ));

        let answer = agent
            .synthesize("Why is the sky blue?", "Rayleigh scattering.")
            .await
            .unwrap();
        assert_eq!(answer, "Answer.");

        let prompt = &generator.calls()[0].user_prompt;
        assert!(prompt.contains("Original query: \"Why is the sky blue?\""));
        assert!(prompt.contains("Retrieved information:\nRayleigh scattering."));

        // role operation leaves history alone; process uses it
        assert!(agent.history().is_empty());
        agent
            .process(Message::new("user", "synthesizer", MessageType::Query, "hi"))
            .await
            .unwrap();
        assert_eq!(agent.history().len(), 2);
    }
}
