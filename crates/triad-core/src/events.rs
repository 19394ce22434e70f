//! Progress events emitted while a workflow runs.
//!
//! Consumers (the CLI, tests) hold the receiving half; the workflow never
//! blocks on delivery and ignores a dropped receiver.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

use crate::agents::AgentRole;
use crate::error::WorkflowStage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StepStarted {
        timestamp: u64,
        role: AgentRole,
        iteration: u32,
    },
    StepFinished {
        timestamp: u64,
        role: AgentRole,
        iteration: u32,
        duration_ms: u64,
    },
    Refining {
        timestamp: u64,
        iteration: u32,
        score: u8,
    },
    Completed {
        timestamp: u64,
        score: u8,
        iterations: u32,
    },
    Failed {
        timestamp: u64,
        stage: WorkflowStage,
        reason: String,
    },
}

impl WorkflowEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            WorkflowEvent::StepStarted { timestamp, .. }
            | WorkflowEvent::StepFinished { timestamp, .. }
            | WorkflowEvent::Refining { timestamp, .. }
            | WorkflowEvent::Completed { timestamp, .. }
            | WorkflowEvent::Failed { timestamp, .. } => *timestamp,
        }
    }
}

#[derive(Clone)]
pub struct EventCollector {
    sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl EventCollector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn step_started(&self, role: AgentRole, iteration: u32) {
        self.emit(WorkflowEvent::StepStarted {
            timestamp: current_timestamp(),
            role,
            iteration,
        });
    }

    pub fn step_finished(&self, role: AgentRole, iteration: u32, duration_ms: u64) {
        self.emit(WorkflowEvent::StepFinished {
            timestamp: current_timestamp(),
            role,
            iteration,
            duration_ms,
        });
    }

    pub fn refining(&self, iteration: u32, score: u8) {
        self.emit(WorkflowEvent::Refining {
            timestamp: current_timestamp(),
            iteration,
            score,
        });
    }

    pub fn completed(&self, score: u8, iterations: u32) {
        self.emit(WorkflowEvent::Completed {
            timestamp: current_timestamp(),
            score,
            iterations,
        });
    }

    pub fn failed(&self, stage: WorkflowStage, reason: String) {
        self.emit(WorkflowEvent::Failed {
            timestamp: current_timestamp(),
            stage,
            reason,
        });
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::trace!(error = %e, "workflow event dropped; receiver closed");
        }
    }
}

/// Current Unix timestamp in milliseconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
