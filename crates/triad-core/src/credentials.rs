//! Provider API keys.

use std::fmt;

use crate::TriadError;

/// API key for the model endpoint. Formatting never prints the key itself,
/// only the variable it came from and its last four characters.
#[derive(Clone)]
pub struct ApiKey {
    value: String,
    source: Option<String>,
}

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: None,
        }
    }

    /// Read the key named by `[llm].api_key_env` from the process environment.
    pub fn from_env(var: &str) -> Result<Self, TriadError> {
        Self::resolve(var, |name| std::env::var(name).ok())
    }

    /// Like [`ApiKey::from_env`] with an explicit variable source. Blank
    /// values count as missing.
    pub fn resolve<F>(var: &str, lookup: F) -> Result<Self, TriadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = lookup(var)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| TriadError::MissingSecret(var.to_string()))?;
        Ok(Self {
            value,
            source: Some(var.to_string()),
        })
    }

    /// Raw key, for the `Authorization` header only.
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn masked(&self) -> String {
        let chars: Vec<char> = self.value.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("source", &self.source)
            .field("value", &self.masked())
            .finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(var) => write!(f, "${var} ({})", self.masked()),
            None => f.write_str(&self.masked()),
        }
    }
}
