//! Side-by-side evaluation of the multi-agent workflow against the baseline.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::baseline::SingleAgentBaseline;
use crate::workflow::Workflow;

pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationTask {
    pub id: String,
    pub query: String,
    pub kind: String,
}

impl EvaluationTask {
    pub fn new(id: impl Into<String>, query: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            kind: kind.into(),
        }
    }
}

pub fn builtin_tasks() -> Vec<EvaluationTask> {
    vec![
        EvaluationTask::new(
            "task_1",
            "Explain the difference between supervised and unsupervised learning in machine learning.",
            "explanation",
        ),
        EvaluationTask::new(
            "task_2",
            "What are the main advantages and disadvantages of electric vehicles compared to gasoline cars?",
            "comparison",
        ),
        EvaluationTask::new(
            "task_3",
            "Create a step-by-step plan for someone who wants to learn web development from scratch.",
            "planning",
        ),
        EvaluationTask::new(
            "task_4",
            "Explain how photosynthesis works and why it's important for life on Earth.",
            "explanation",
        ),
        EvaluationTask::new(
            "task_5",
            "What are the key considerations when choosing between SQL and NoSQL databases for a new project?",
            "analysis",
        ),
    ]
}

/// Whitespace-delimited word count.
pub fn word_count(response: &str) -> usize {
    response.split_whitespace().count()
}

/// Share of distinct lowercase query terms that also appear in the response.
pub fn completeness(response: &str, query: &str) -> f64 {
    let query_terms: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if query_terms.is_empty() {
        return 0.0;
    }
    let response_terms: HashSet<String> =
        response.split_whitespace().map(str::to_lowercase).collect();
    let overlap = query_terms.intersection(&response_terms).count();
    (overlap as f64 / query_terms.len() as f64).min(1.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiAgentRecord {
    pub task_id: String,
    pub query: String,
    pub response: String,
    pub score: u8,
    pub time: f64,
    pub iterations: u32,
    pub word_count: usize,
    pub completeness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub task_id: String,
    pub query: String,
    pub response: String,
    pub time: f64,
    pub word_count: usize,
    pub completeness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task_id: String,
    pub system: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_quality_score: Option<f64>,
    pub avg_time: f64,
    pub avg_word_count: f64,
    pub avg_completeness: f64,
}

/// Relative differences in percent, multi-agent over baseline, computed only
/// over tasks both systems completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Tasks that contributed to the percentages below.
    pub paired_tasks: usize,
    pub time_overhead: Option<f64>,
    pub response_length_diff: Option<f64>,
    pub completeness_improvement: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub multi_agent: SystemSummary,
    pub single_agent: SystemSummary,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub multi_agent: Vec<MultiAgentRecord>,
    pub single_agent: Vec<BaselineRecord>,
    pub failures: Vec<TaskFailure>,
    pub summary: EvaluationSummary,
}

impl EvaluationReport {
    fn summarize(&mut self) {
        let ma = &self.multi_agent;
        let sa = &self.single_agent;

        let ma_time = mean(ma.iter().map(|r| r.time));
        let ma_words = mean(ma.iter().map(|r| r.word_count as f64));
        let ma_complete = mean(ma.iter().map(|r| r.completeness));
        let sa_time = mean(sa.iter().map(|r| r.time));
        let sa_words = mean(sa.iter().map(|r| r.word_count as f64));
        let sa_complete = mean(sa.iter().map(|r| r.completeness));

        self.summary = EvaluationSummary {
            multi_agent: SystemSummary {
                avg_quality_score: (!ma.is_empty())
                    .then(|| round_to(mean(ma.iter().map(|r| f64::from(r.score))), 2)),
                avg_time: round_to(ma_time, 2),
                avg_word_count: ma_words.round(),
                avg_completeness: round_to(ma_complete, 2),
            },
            single_agent: SystemSummary {
                avg_quality_score: None,
                avg_time: round_to(sa_time, 2),
                avg_word_count: sa_words.round(),
                avg_completeness: round_to(sa_complete, 2),
            },
            comparison: compare_paired(ma, sa),
        };
    }

    /// Write the report as `evaluation_<unix-ts>.json` under `dir`.
    pub fn persist(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        let path = dir.join(format!("evaluation_{}.json", chrono::Utc::now().timestamp()));
        let body = serde_json::to_string_pretty(self).context("failed to encode report")?;
        fs::write(&path, body)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        Ok(path)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Percentages over the task ids present in both record sets, so a task one
/// system failed does not skew the other side's average.
fn compare_paired(ma: &[MultiAgentRecord], sa: &[BaselineRecord]) -> Comparison {
    let completed: HashSet<&str> = sa.iter().map(|r| r.task_id.as_str()).collect();
    let ma: Vec<&MultiAgentRecord> = ma
        .iter()
        .filter(|r| completed.contains(r.task_id.as_str()))
        .collect();
    let paired: HashSet<&str> = ma.iter().map(|r| r.task_id.as_str()).collect();
    let sa: Vec<&BaselineRecord> = sa
        .iter()
        .filter(|r| paired.contains(r.task_id.as_str()))
        .collect();

    Comparison {
        paired_tasks: paired.len(),
        time_overhead: relative_percent(
            mean(ma.iter().map(|r| r.time)),
            mean(sa.iter().map(|r| r.time)),
        ),
        response_length_diff: relative_percent(
            mean(ma.iter().map(|r| r.word_count as f64)),
            mean(sa.iter().map(|r| r.word_count as f64)),
        ),
        completeness_improvement: relative_percent(
            mean(ma.iter().map(|r| r.completeness)),
            mean(sa.iter().map(|r| r.completeness)),
        ),
    }
}

fn relative_percent(multi_agent: f64, baseline: f64) -> Option<f64> {
    (baseline != 0.0).then(|| round_to((multi_agent / baseline - 1.0) * 100.0, 1))
}

/// Runs tasks sequentially through both systems.
pub struct EvaluationHarness<'a> {
    workflow: &'a Workflow,
    baseline: &'a SingleAgentBaseline,
    pause: Duration,
}

impl<'a> EvaluationHarness<'a> {
    pub fn new(workflow: &'a Workflow, baseline: &'a SingleAgentBaseline) -> Self {
        Self {
            workflow,
            baseline,
            pause: DEFAULT_PAUSE,
        }
    }

    /// Delay between tasks, to stay under provider rate limits.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub async fn run(&self, tasks: &[EvaluationTask]) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        for (idx, task) in tasks.iter().enumerate() {
            info!(task_id = %task.id, kind = %task.kind, "evaluating task {}/{}", idx + 1, tasks.len());

            match self.workflow.run(&task.query).await {
                Ok(result) => report.multi_agent.push(MultiAgentRecord {
                    task_id: task.id.clone(),
                    query: task.query.clone(),
                    word_count: word_count(&result.final_response),
                    completeness: completeness(&result.final_response, &task.query),
                    response: result.final_response,
                    score: result.quality_score,
                    time: result.time_taken,
                    iterations: result.iterations,
                }),
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "multi-agent run failed");
                    report.failures.push(TaskFailure {
                        task_id: task.id.clone(),
                        system: "multi_agent".into(),
                        error: err.to_string(),
                    });
                }
            }

            match self.baseline.run(&task.query).await {
                Ok(result) => report.single_agent.push(BaselineRecord {
                    task_id: task.id.clone(),
                    query: task.query.clone(),
                    word_count: word_count(&result.response),
                    completeness: completeness(&result.response, &task.query),
                    response: result.response,
                    time: result.time_taken,
                }),
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "baseline run failed");
                    report.failures.push(TaskFailure {
                        task_id: task.id.clone(),
                        system: "single_agent".into(),
                        error: err.to_string(),
                    });
                }
            }

            if idx + 1 < tasks.len() && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        report.summarize();
        report
    }
}
