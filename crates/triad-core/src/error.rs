use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Setup and configuration errors for Triad.
#[derive(Debug, Error)]
pub enum TriadError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TriadError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }
}

/// Failure of a single text-generation call.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GenerationError {
    #[error("rate limited by provider: {0}")]
    RateLimited(String),
    #[error("generation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl GenerationError {
    /// Rate limits, timeouts and transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::InvalidResponse(_))
    }
}

/// Raised while loading the prompt table. Never surfaced past the prompt store.
#[derive(Debug, Error)]
pub enum PromptResolutionError {
    #[error("failed to read prompt file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse prompt file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// The critic's output did not carry a usable score.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CritiqueParseError {
    #[error("no score found in critique output")]
    NoScore,
    #[error("score {0} is outside the 1-10 range")]
    OutOfRange(i64),
}

/// Pipeline stage in which a workflow run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Retrieve,
    Synthesize,
    Critique,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::Retrieve => "retrieve",
            WorkflowStage::Synthesize => "synthesize",
            WorkflowStage::Critique => "critique",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workflow run that was aborted instead of producing a result.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{stage} step failed in iteration {iteration}: {source}")]
    Generation {
        stage: WorkflowStage,
        iteration: u32,
        #[source]
        source: GenerationError,
    },
}

impl WorkflowError {
    pub fn stage(&self) -> WorkflowStage {
        match self {
            WorkflowError::Generation { stage, .. } => *stage,
        }
    }

    pub fn iteration(&self) -> u32 {
        match self {
            WorkflowError::Generation { iteration, .. } => *iteration,
        }
    }

    pub fn generation_error(&self) -> &GenerationError {
        match self {
            WorkflowError::Generation { source, .. } => source,
        }
    }
}

/// The single-agent baseline failed to produce a response.
#[derive(Debug, Error)]
#[error("baseline generation failed: {0}")]
pub struct BaselineError(#[from] pub GenerationError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_response_is_terminal() {
        assert!(!GenerationError::InvalidResponse("garbled".into()).is_retryable());
        assert!(GenerationError::RateLimited("429".into()).is_retryable());
        assert!(GenerationError::Timeout { after_ms: 10 }.is_retryable());
        assert!(GenerationError::Unavailable("refused".into()).is_retryable());
    }

    #[test]
    fn workflow_error_names_stage() {
        let err = WorkflowError::Generation {
            stage: WorkflowStage::Retrieve,
            iteration: 1,
            source: GenerationError::Timeout { after_ms: 250 },
        };
        assert_eq!(err.stage(), WorkflowStage::Retrieve);
        assert_eq!(
            err.to_string(),
            "retrieve step failed in iteration 1: generation timed out after 250ms"
        );
    }
}
