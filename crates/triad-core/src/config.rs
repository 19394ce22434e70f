use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::TriadError;

const DEFAULT_CONFIG_PATH: &str = "triad.toml";
const CONFIG_PATH_ENV: &str = "TRIAD_CONFIG";

/// Top-level configuration, read once at startup and passed down by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub workflow: WorkflowConfig,
    pub history: HistoryConfig,
    pub retry: RetryConfig,
    pub prompts: PromptConfig,
    pub logging: LoggingConfig,
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `TRIAD_CONFIG` environment variable.
    /// 3. `triad.toml` in the current working directory, if present.
    /// 4. Built-in defaults.
    ///
    /// The legacy `MODEL_NAME`, `TEMPERATURE`, `MAX_TOKENS` and `DEBUG_MODE`
    /// variables override the file afterwards.
    pub fn load(path: Option<PathBuf>) -> Result<Config, TriadError> {
        let mut config = match resolve_path(path) {
            Some(candidate) => Self::from_file(&candidate)?,
            None => Config::default(),
        };

        apply_overrides(&mut config, |key| env::var(key).ok())?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config, TriadError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| TriadError::config_io(path.to_path_buf(), err))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Config, TriadError> {
        toml::from_str(raw).map_err(|err| TriadError::InvalidConfiguration(err.to_string()))
    }

    pub fn validate(config: &Config) -> Result<(), TriadError> {
        let llm = &config.llm;
        if !(0.0..=2.0).contains(&llm.temperature) {
            return invalid(format!(
                "llm.temperature must be within [0, 2], got {}",
                llm.temperature
            ));
        }
        if llm.max_tokens == 0 {
            return invalid("llm.max_tokens must be positive".into());
        }
        if llm.timeout_ms == 0 {
            return invalid("llm.timeout_ms must be positive".into());
        }
        if llm.model.trim().is_empty() {
            return invalid("llm.model must not be empty".into());
        }

        let workflow = &config.workflow;
        if workflow.max_iterations == 0 {
            return invalid("workflow.max_iterations must be at least 1".into());
        }
        if !(1..=10).contains(&workflow.score_threshold) {
            return invalid("workflow.score_threshold must be within 1..=10".into());
        }
        if !(1..=10).contains(&workflow.default_score) {
            return invalid("workflow.default_score must be within 1..=10".into());
        }
        if config.history.window == 0 {
            return invalid("history.window must be positive".into());
        }
        if config.history.max_retained == Some(0) {
            return invalid("history.max_retained must be positive when set".into());
        }
        Ok(())
    }
}

fn invalid(reason: String) -> Result<(), TriadError> {
    Err(TriadError::InvalidConfiguration(reason))
}

fn resolve_path(path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return Some(PathBuf::from(from_env));
        }
    }

    let default = Path::new(DEFAULT_CONFIG_PATH);
    default.exists().then(|| default.to_path_buf())
}

/// Apply the legacy environment overrides using `lookup` as the variable source.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), TriadError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(model) = lookup("MODEL_NAME").filter(|value| !value.trim().is_empty()) {
        config.llm.model = model;
    }
    if let Some(value) = lookup("TEMPERATURE") {
        config.llm.temperature = parse_override("TEMPERATURE", &value)?;
    }
    if let Some(value) = lookup("MAX_TOKENS") {
        config.llm.max_tokens = parse_override("MAX_TOKENS", &value)?;
    }
    if let Some(value) = lookup("DEBUG_MODE") {
        config.logging.debug = matches!(value.trim(), "True" | "true" | "1");
    }
    Ok(())
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, TriadError> {
    value.trim().parse::<T>().map_err(|_| {
        TriadError::InvalidConfiguration(format!("{key} has an unparseable value: {value:?}"))
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_ms: u64,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_iterations: u32,
    pub score_threshold: u8,
    pub preview_chars: usize,
    pub default_score: u8,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            score_threshold: 7,
            preview_chars: 200,
            default_score: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub window: usize,
    pub max_retained: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: 10,
            max_retained: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub path: PathBuf,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("prompts/agents.toml"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            debug: false,
        }
    }
}
