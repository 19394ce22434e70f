use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CritiqueParseError;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("invalid fence regex"));

static LABELLED_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:quality\s+)?(?:score|rating)"?\s*(?:\(?\s*1\s*-\s*10\s*\)?)?\s*(?:is|of)?\s*[:=\-]?\s*\**\s*"?(\d{1,3}(?:\.\d+)?)\s*(?:/\s*10)?"#,
    )
    .expect("invalid labelled score regex")
});

static FRACTION_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}(?:\.\d+)?)\s*/\s*10\b").expect("invalid fraction regex")
});

/// Outcome of a critic evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueResult {
    /// Quality score in 1..=10; the configured default when parsing failed.
    pub score: u8,
    pub critique: String,
    pub issues: Vec<String>,
    pub improvements: Vec<String>,
    /// Unmodified model output.
    pub raw: String,
    /// Set when `score` is the fallback rather than a value the critic emitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<CritiqueParseError>,
}

impl CritiqueResult {
    /// Interpret raw critic output, falling back to `default_score` when no
    /// in-range score can be found.
    pub fn parse(raw: &str, default_score: u8) -> Self {
        let structured = structured_payload(raw);
        let extracted = structured
            .as_ref()
            .and_then(|payload| payload.get("score"))
            .and_then(numeric_score)
            .or_else(|| labelled_score(raw))
            .map(round_score);

        let (score, parse_error) = match extracted {
            Some(value) if (1..=10).contains(&value) => (value as u8, None),
            Some(value) => (default_score, Some(CritiqueParseError::OutOfRange(value))),
            None => (default_score, Some(CritiqueParseError::NoScore)),
        };

        let raw_trimmed = raw.trim().to_string();
        let (critique, issues, improvements) = match &structured {
            Some(payload) => (
                payload
                    .get("critique")
                    .and_then(Value::as_str)
                    .filter(|text| !text.trim().is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| raw_trimmed.clone()),
                string_list(payload.get("issues")),
                string_list(payload.get("improvements")),
            ),
            None => (raw_trimmed.clone(), Vec::new(), Vec::new()),
        };

        Self {
            score,
            critique,
            issues,
            improvements,
            raw: raw.to_string(),
            parse_error,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parse_error.is_none()
    }

    pub fn meets(&self, threshold: u8) -> bool {
        self.score >= threshold
    }
}

/// First JSON object found in `raw`: the whole reply, a fenced block, or the
/// outermost brace span.
fn structured_payload(raw: &str) -> Option<Value> {
    let object = |text: &str| {
        serde_json::from_str::<Value>(text)
            .ok()
            .filter(Value::is_object)
    };

    if let Some(payload) = object(raw.trim()) {
        return Some(payload);
    }
    if let Some(payload) = FENCED_JSON.captures(raw).and_then(|caps| object(&caps[1])) {
        return Some(payload);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    object(&raw[start..=end])
}

/// A JSON score given as a number, `"8"`, `"8.5"` or `"8/10"`.
fn numeric_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_number(text.split('/').next()?),
        _ => None,
    }
}

fn labelled_score(raw: &str) -> Option<f64> {
    LABELLED_SCORE
        .captures(raw)
        .or_else(|| FRACTION_SCORE.captures(raw))
        .and_then(|caps| parse_number(&caps[1]))
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Half-up rounding shared by every extraction path.
fn round_score(value: f64) -> i64 {
    value.round() as i64
}

/// Lenient list field: null or missing is empty, a lone string is one item,
/// non-string items are kept as compact JSON.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let render = |item: &Value| match item {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    };
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(render).collect(),
        Some(item) => render(item).into_iter().collect(),
        None => Vec::new(),
    }
}
