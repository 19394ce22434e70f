//! Retriever agent: asks the model for background facts on a query.
//!
//! No index or search backend is consulted; the "retrieved" material is
//! model-generated context.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{Agent, AgentCore};
use crate::error::GenerationError;

/// Optional source hints supplied by a caller. Accepted for interface
/// compatibility with real retrieval backends; not used to build the prompt.
pub type SourceHints = HashMap<String, Value>;

pub struct RetrieverAgent {
    core: AgentCore,
}

impl RetrieverAgent {
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }

    #[instrument(name = "agent.retrieve", skip_all, fields(agent_id = %self.core.id()))]
    pub async fn search(
        &self,
        query: &str,
        sources: Option<&SourceHints>,
    ) -> Result<String, GenerationError> {
        if let Some(hints) = sources {
            debug!(hint_count = hints.len(), "source hints supplied");
        }

        let prompt = format!(
            "Given the query: \"{query}\"\n\n\
             Provide relevant information that would help answer this query.\n\
             Focus on facts, definitions, and key concepts.\n\
             If you don't have specific information, provide general context."
        );
        let retrieved = self.core.generate(&prompt).await?;
        info!(chars = retrieved.len(), "retriever produced context");
        Ok(retrieved)
    }
}

#[async_trait]
impl Agent for RetrieverAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }
}
