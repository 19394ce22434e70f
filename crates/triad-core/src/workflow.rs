//! Retrieve, synthesize, critique, refine.
//!
//! [`Workflow`] owns one agent per role and drives them through an explicit
//! state machine. The critique loop stops on the first score at or above the
//! threshold, or once the iteration cap is reached. A failed step aborts the
//! run with a [`WorkflowError`] naming the stage and iteration.

use std::future::Future;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::agents::{AgentRole, AgentSet, AgentSettings, CritiqueResult, RoleGenerators};
use crate::config::Config;
use crate::error::{CritiqueParseError, GenerationError, WorkflowError};
use crate::events::EventCollector;
use crate::interaction::InteractionLog;
use crate::llm::DynGenerator;
use crate::metrics::record_run;
use crate::prompts::PromptStore;
use crate::retry::RetryPolicy;

/// Loop parameters resolved from `[workflow]` and `[retry]`.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub max_iterations: u32,
    pub score_threshold: u8,
    pub preview_chars: usize,
    pub retry: RetryPolicy,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.workflow.max_iterations,
            score_threshold: config.workflow.score_threshold,
            preview_chars: config.workflow.preview_chars,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub query: String,
    pub final_response: String,
    pub quality_score: u8,
    pub critique: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_parse_error: Option<CritiqueParseError>,
    pub iterations: u32,
    /// Wall time in seconds, two decimals.
    pub time_taken: f64,
    pub interaction_log: InteractionLog,
}

enum RunState {
    Retrieving,
    Synthesizing {
        material: String,
    },
    Critiquing {
        candidate: String,
    },
    Refining {
        candidate: String,
        critique: CritiqueResult,
    },
    Done {
        candidate: String,
        critique: CritiqueResult,
    },
}

pub struct Workflow {
    agents: AgentSet,
    settings: WorkflowSettings,
    events: Option<EventCollector>,
}

impl Workflow {
    pub fn new(agents: AgentSet, settings: WorkflowSettings) -> Self {
        Self {
            agents,
            settings,
            events: None,
        }
    }

    /// Assemble all three agents around one shared generator.
    pub fn from_config(config: &Config, generator: DynGenerator, prompts: &PromptStore) -> Self {
        let agents = AgentSet::build(
            RoleGenerators::shared(generator),
            prompts,
            &AgentSettings::from_config(config),
            config.workflow.default_score,
        );
        Self::new(agents, WorkflowSettings::from_config(config))
    }

    pub fn with_events(mut self, events: EventCollector) -> Self {
        self.events = Some(events);
        self
    }

    pub fn agents(&self) -> &AgentSet {
        &self.agents
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Run with the configured iteration cap.
    pub async fn run(&self, query: &str) -> Result<WorkflowResult, WorkflowError> {
        self.run_with_iterations(query, self.settings.max_iterations)
            .await
    }

    /// Final answer only.
    pub async fn run_simple(&self, query: &str) -> Result<String, WorkflowError> {
        Ok(self.run(query).await?.final_response)
    }

    /// Run with an explicit iteration cap; values below 1 are treated as 1.
    #[instrument(name = "workflow.run", skip(self, query), fields(run_id = tracing::field::Empty))]
    pub async fn run_with_iterations(
        &self,
        query: &str,
        max_iterations: u32,
    ) -> Result<WorkflowResult, WorkflowError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started = Instant::now();
        let max_iterations = max_iterations.max(1);

        match self.drive(query, max_iterations).await {
            Ok((final_response, critique, iterations, interaction_log)) => {
                record_run("completed", iterations);
                if let Some(events) = &self.events {
                    events.completed(critique.score, iterations);
                }
                let time_taken = round_secs(started.elapsed().as_secs_f64());
                info!(
                    score = critique.score,
                    iterations,
                    time_taken,
                    "workflow completed"
                );
                Ok(WorkflowResult {
                    run_id,
                    query: query.to_string(),
                    final_response,
                    quality_score: critique.score,
                    critique: critique.critique,
                    score_parse_error: critique.parse_error,
                    iterations,
                    time_taken,
                    interaction_log,
                })
            }
            Err(err) => {
                record_run("failed", err.iteration());
                tracing::error!(error = %err, "workflow aborted");
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        query: &str,
        max_iterations: u32,
    ) -> Result<(String, CritiqueResult, u32, InteractionLog), WorkflowError> {
        let preview_chars = self.settings.preview_chars;
        let mut log = InteractionLog::new();
        let mut iteration = 1;
        let mut state = RunState::Retrieving;

        loop {
            state = match state {
                RunState::Retrieving => {
                    let material = self
                        .step(AgentRole::Retriever, iteration, || {
                            self.agents.retriever.search(query, None)
                        })
                        .await?;
                    log.record_text(AgentRole::Retriever, iteration, &material, preview_chars);
                    RunState::Synthesizing { material }
                }
                RunState::Synthesizing { material } => {
                    let candidate = self
                        .step(AgentRole::Synthesizer, iteration, || {
                            self.agents.synthesizer.synthesize(query, &material)
                        })
                        .await?;
                    log.record_text(AgentRole::Synthesizer, iteration, &candidate, preview_chars);
                    RunState::Critiquing { candidate }
                }
                RunState::Critiquing { candidate } => {
                    let critique = self
                        .step(AgentRole::Critic, iteration, || {
                            self.agents.critic.critique(query, &candidate)
                        })
                        .await?;
                    log.record_critique(iteration, critique.clone());

                    if critique.meets(self.settings.score_threshold) || iteration >= max_iterations
                    {
                        RunState::Done {
                            candidate,
                            critique,
                        }
                    } else {
                        RunState::Refining {
                            candidate,
                            critique,
                        }
                    }
                }
                RunState::Refining {
                    candidate,
                    critique,
                } => {
                    info!(iteration, score = critique.score, "score below threshold, refining");
                    if let Some(events) = &self.events {
                        events.refining(iteration, critique.score);
                    }
                    iteration += 1;
                    RunState::Synthesizing {
                        material: format!("{candidate}\n\nCritique: {}", critique.critique),
                    }
                }
                RunState::Done {
                    candidate,
                    critique,
                } => return Ok((candidate, critique, iteration, log)),
            };
        }
    }

    /// One agent call with retry, events and stage classification.
    async fn step<T, F, Fut>(
        &self,
        role: AgentRole,
        iteration: u32,
        operation: F,
    ) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        if let Some(events) = &self.events {
            events.step_started(role, iteration);
        }
        let started = Instant::now();

        match self.settings.retry.run(role.stage().as_str(), operation).await {
            Ok(value) => {
                if let Some(events) = &self.events {
                    events.step_finished(role, iteration, started.elapsed().as_millis() as u64);
                }
                Ok(value)
            }
            Err(source) => {
                if let Some(events) = &self.events {
                    events.failed(role.stage(), source.to_string());
                }
                Err(WorkflowError::Generation {
                    stage: role.stage(),
                    iteration,
                    source,
                })
            }
        }
    }
}

pub(crate) fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;
    use std::sync::Arc;

    fn workflow_with(
        retriever: &Arc<ScriptedGenerator>,
        synthesizer: &Arc<ScriptedGenerator>,
        critic: &Arc<ScriptedGenerator>,
    ) -> Workflow {
        let generators = RoleGenerators {
            retriever: retriever.clone(),
            synthesizer: synthesizer.clone(),
            critic: critic.clone(),
        };
        let agents = AgentSet::build(
            generators,
            &PromptStore::new(),
            &AgentSettings::default(),
            5,
        );
        let settings = WorkflowSettings {
            retry: RetryPolicy::none(),
            ..WorkflowSettings::default()
        };
        Workflow::new(agents, settings)
    }

    #[tokio::test]
    async fn zero_iterations_still_runs_once() {
        let retriever = Arc::new(ScriptedGenerator::new("m"));
        let synthesizer = Arc::new(ScriptedGenerator::new("m").with_replies(["only answer"]));
        let critic = Arc::new(ScriptedGenerator::new("m").with_replies([r#"{"score": 2}"#]));
        let workflow = workflow_with(&retriever, &synthesizer, &critic);

        let result = workflow.run_with_iterations("q", 0).await.unwrap();
        assert_eq!(result.iterations, 1);
        assert_eq!(result.final_response, "only answer");
        assert_eq!(critic.call_count(), 1);
    }

    #[tokio::test]
    async fn unparsed_score_is_surfaced_on_result() {
        let retriever = Arc::new(ScriptedGenerator::new("m"));
        let synthesizer = Arc::new(ScriptedGenerator::new("m"));
        let critic = Arc::new(ScriptedGenerator::new("m").with_fallback("No opinion."));
        let workflow = workflow_with(&retriever, &synthesizer, &critic);

        let result = workflow.run_with_iterations("q", 1).await.unwrap();
        assert_eq!(result.quality_score, 5);
        assert_eq!(result.critique, "No opinion.");
        assert_eq!(result.score_parse_error, Some(CritiqueParseError::NoScore));
    }

    #[tokio::test]
    async fn transient_failure_is_retried_within_step() {
        let retriever = Arc::new(
            ScriptedGenerator::new("m")
                .with_error(GenerationError::RateLimited("429".into()))
                .with_replies(["facts"]),
        );
        let synthesizer = Arc::new(ScriptedGenerator::new("m"));
        let critic = Arc::new(ScriptedGenerator::new("m").with_replies([r#"{"score": 9}"#]));
        let mut workflow = workflow_with(&retriever, &synthesizer, &critic);
        workflow.settings.retry = RetryPolicy {
            max_retries: 1,
            initial_backoff: std::time::Duration::from_millis(1),
            max_backoff: std::time::Duration::from_millis(1),
        };

        let result = workflow.run("q").await.unwrap();
        assert_eq!(retriever.call_count(), 2);
        assert!(synthesizer.calls()[0].user_prompt.contains("Retrieved information:\nfacts"));
        assert_eq!(result.quality_score, 9);
    }

    #[test]
    fn seconds_round_to_two_places() {
        assert_eq!(round_secs(1.23456), 1.23);
        assert_eq!(round_secs(2.0), 2.0);
    }
}
