//! Role-bound agents.
//!
//! Every agent wraps an [`AgentCore`] (identity, generator, system prompt and
//! private history) and adds one role-specific operation on top of the shared
//! [`Agent::process`] behaviour.

mod critic;
mod critique;
mod retriever;
mod synthesizer;

pub use critic::CriticAgent;
pub use critique::CritiqueResult;
pub use retriever::{RetrieverAgent, SourceHints};
pub use synthesizer::SynthesizerAgent;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{GenerationError, WorkflowStage};
use crate::llm::{DynGenerator, invoke_bounded};
use crate::message::{ConversationHistory, Message, MessageType};
use crate::prompts::PromptStore;
use crate::redact::{preview, sanitize_text};

const INTERACTION_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Produces background facts and definitions for a query
    Retriever,
    /// Turns retrieved material into a single answer
    Synthesizer,
    /// Scores and critiques a candidate answer
    Critic,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Retriever => "retriever",
            AgentRole::Synthesizer => "synthesizer",
            AgentRole::Critic => "critic",
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        match self {
            AgentRole::Retriever => WorkflowStage::Retrieve,
            AgentRole::Synthesizer => WorkflowStage::Synthesize,
            AgentRole::Critic => WorkflowStage::Critique,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction-time knobs shared by all agents.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub context_window: usize,
    pub max_retained: Option<usize>,
    pub timeout: Duration,
    pub log_interactions: bool,
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            context_window: config.history.window,
            max_retained: config.history.max_retained,
            timeout: config.llm.timeout(),
            log_interactions: config.logging.debug,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// State and behaviour common to every role.
pub struct AgentCore {
    id: String,
    role: AgentRole,
    generator: DynGenerator,
    system_prompt: String,
    history: ConversationHistory,
    settings: AgentSettings,
}

impl AgentCore {
    pub fn new(
        role: AgentRole,
        generator: DynGenerator,
        prompts: &PromptStore,
        settings: &AgentSettings,
    ) -> Self {
        let history = match settings.max_retained {
            Some(limit) => ConversationHistory::with_retention(limit),
            None => ConversationHistory::new(),
        };
        Self {
            id: role.as_str().to_string(),
            role,
            system_prompt: prompts.lookup(role.as_str()),
            generator,
            history,
            settings: settings.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn model_id(&self) -> &str {
        self.generator.model_id()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// One bounded call to the generator under this agent's system prompt.
    pub async fn generate(&self, user_prompt: &str) -> Result<String, GenerationError> {
        invoke_bounded(
            self.generator.as_ref(),
            self.role.as_str(),
            &self.system_prompt,
            user_prompt,
            self.settings.timeout,
        )
        .await
    }

    #[instrument(name = "agent.process", skip(self, incoming), fields(agent_id = %self.id))]
    pub async fn process(&mut self, incoming: Message) -> Result<Message, GenerationError> {
        self.history.append(incoming.clone());

        let prompt = format!(
            "Previous conversation:\n{}\n\nCurrent message: {}\n\nYour response:",
            self.history.context_view(self.settings.context_window),
            incoming.content()
        );
        let content = self.generate(&prompt).await?;

        let response = Message::new(
            self.id.clone(),
            incoming.sender(),
            MessageType::Response,
            content,
        )
        .with_context(incoming.context().clone())
        .with_metadata("model", Value::from(self.model_id()));

        self.history.append(response.clone());
        self.log_interaction(&incoming, &response);
        Ok(response)
    }

    fn log_interaction(&self, received: &Message, sent: &Message) {
        if !self.settings.log_interactions {
            return;
        }
        let (received_text, _) = sanitize_text(received.content());
        let (sent_text, _) = sanitize_text(sent.content());
        debug!(
            agent_id = %self.id,
            received = %preview(&received_text, INTERACTION_PREVIEW_CHARS),
            sent = %preview(&sent_text, INTERACTION_PREVIEW_CHARS),
            "agent interaction"
        );
    }
}

/// Capability shared by every role: identity plus message processing.
#[async_trait]
pub trait Agent: Send + Sync {
    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    fn id(&self) -> &str {
        self.core().id()
    }

    fn role(&self) -> AgentRole {
        self.core().role()
    }

    fn history(&self) -> &ConversationHistory {
        self.core().history()
    }

    /// Record `incoming`, answer it with conversation context, record the answer.
    async fn process(&mut self, incoming: Message) -> Result<Message, GenerationError> {
        self.core_mut().process(incoming).await
    }
}

/// Generators assigned to each role; usually one shared client.
#[derive(Clone)]
pub struct RoleGenerators {
    pub retriever: DynGenerator,
    pub synthesizer: DynGenerator,
    pub critic: DynGenerator,
}

impl RoleGenerators {
    pub fn shared(generator: DynGenerator) -> Self {
        Self {
            retriever: generator.clone(),
            synthesizer: generator.clone(),
            critic: generator,
        }
    }
}

/// One agent per pipeline role.
pub struct AgentSet {
    pub retriever: RetrieverAgent,
    pub synthesizer: SynthesizerAgent,
    pub critic: CriticAgent,
}

impl AgentSet {
    pub fn build(
        generators: RoleGenerators,
        prompts: &PromptStore,
        settings: &AgentSettings,
        default_score: u8,
    ) -> Self {
        Self {
            retriever: RetrieverAgent::new(AgentCore::new(
                AgentRole::Retriever,
                generators.retriever,
                prompts,
                settings,
            )),
            synthesizer: SynthesizerAgent::new(AgentCore::new(
                AgentRole::Synthesizer,
                generators.synthesizer,
                prompts,
                settings,
            )),
            critic: CriticAgent::new(
                AgentCore::new(AgentRole::Critic, generators.critic, prompts, settings),
                default_score,
            ),
        }
    }
}
