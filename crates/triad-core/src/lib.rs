//! Triad core: a retrieve, synthesize and critique agent pipeline with a
//! bounded refinement loop, plus a single-call baseline to compare it with.
//!
//! The workflow is built from one [`Config`] loaded at startup, a
//! [`TextGenerator`] client and a [`PromptStore`] of role system prompts.

pub mod agents;
mod baseline;
pub mod config;
mod credentials;
mod error;
mod eval;
mod events;
mod interaction;
pub mod llm;
mod message;
pub mod metrics;
mod prompts;
mod redact;
mod retry;
mod telemetry;
mod workflow;

pub use agents::{
    Agent, AgentCore, AgentRole, AgentSet, AgentSettings, CriticAgent, CritiqueResult,
    RetrieverAgent, RoleGenerators, SourceHints, SynthesizerAgent,
};
pub use baseline::{BaselineResult, SingleAgentBaseline};
pub use config::{Config, ConfigLoader};
pub use credentials::ApiKey;
pub use error::{
    BaselineError, CritiqueParseError, GenerationError, PromptResolutionError, TriadError,
    WorkflowError, WorkflowStage,
};
pub use eval::{
    BaselineRecord, Comparison, DEFAULT_PAUSE, EvaluationHarness, EvaluationReport,
    EvaluationSummary, EvaluationTask, MultiAgentRecord, SystemSummary, TaskFailure,
    builtin_tasks, completeness, word_count,
};
pub use events::{EventCollector, WorkflowEvent};
pub use interaction::{InteractionEntry, InteractionLog, InteractionOutput};
pub use llm::{DynGenerator, ScriptedGenerator, TextGenerator, build_generator};
pub use message::{ConversationHistory, DEFAULT_CONTEXT_WINDOW, EMPTY_HISTORY, Message, MessageType};
pub use prompts::{PromptStore, fallback_prompt};
pub use redact::sanitize_text;
pub use retry::RetryPolicy;
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use workflow::{Workflow, WorkflowResult, WorkflowSettings};
