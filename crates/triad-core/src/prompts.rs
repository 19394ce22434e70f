use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::PromptResolutionError;

/// Role-to-system-prompt table, loaded once at startup.
///
/// The file is TOML with one table per role:
///
/// ```toml
/// [critic]
/// system_prompt = "You are a meticulous reviewer..."
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    prompts: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RoleEntry {
    system_prompt: Option<String>,
}

impl PromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load prompts from `path`. A missing or malformed file degrades to an
    /// empty store so every role resolves to the generic fallback.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => {
                debug!(path = %path.display(), roles = store.prompts.len(), "loaded prompt table");
                store
            }
            Err(err) => {
                warn!(error = %err, "prompt table unavailable; using fallback prompts");
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, PromptResolutionError> {
        let raw = fs::read_to_string(path).map_err(|source| PromptResolutionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|reason| PromptResolutionError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let table: HashMap<String, RoleEntry> =
            toml::from_str(raw).map_err(|err| err.to_string())?;
        let prompts = table
            .into_iter()
            .filter_map(|(role, entry)| {
                entry
                    .system_prompt
                    .filter(|prompt| !prompt.trim().is_empty())
                    .map(|prompt| (role, prompt))
            })
            .collect();
        Ok(Self { prompts })
    }

    pub fn with_prompt(mut self, role: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.prompts.insert(role.into(), prompt.into());
        self
    }

    /// System prompt for `role`; never fails.
    pub fn lookup(&self, role: &str) -> String {
        self.prompts
            .get(role)
            .cloned()
            .unwrap_or_else(|| fallback_prompt(role))
    }
}

pub fn fallback_prompt(role: &str) -> String {
    format!("You are a {role} agent in a multi-agent system.")
}
