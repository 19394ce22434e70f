//! Per-run log of agent invocations.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::agents::{AgentRole, CritiqueResult};
use crate::redact::preview;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum InteractionOutput {
    /// Truncated text produced by a retriever or synthesizer call.
    Text(String),
    /// Full structured critic result.
    Critique(CritiqueResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub agent: AgentRole,
    pub iteration: u32,
    pub output: InteractionOutput,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionLog {
    entries: Vec<InteractionEntry>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_text(&mut self, agent: AgentRole, iteration: u32, text: &str, max_chars: usize) {
        self.entries.push(InteractionEntry {
            agent,
            iteration,
            output: InteractionOutput::Text(preview(text, max_chars)),
        });
    }

    pub fn record_critique(&mut self, iteration: u32, result: CritiqueResult) {
        self.entries.push(InteractionEntry {
            agent: AgentRole::Critic,
            iteration,
            output: InteractionOutput::Critique(result),
        });
    }

    pub fn entries(&self) -> &[InteractionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render_markdown(&self) -> String {
        if self.entries.is_empty() {
            return "No interactions recorded.".to_string();
        }
        let mut output = String::from("### Interaction Log\n");
        for (idx, entry) in self.entries.iter().enumerate() {
            let summary = match &entry.output {
                InteractionOutput::Text(text) => text.replace('\n', " "),
                InteractionOutput::Critique(result) => {
                    let mut line = format!("score {}/10: {}", result.score, result.critique);
                    if let Some(err) = &result.parse_error {
                        let _ = write!(line, " (score defaulted: {err})");
                    }
                    line.replace('\n', " ")
                }
            };
            let _ = writeln!(
                output,
                "{}. [iteration {}] {} -> {}",
                idx + 1,
                entry.iteration,
                entry.agent,
                summary
            );
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_entries_are_truncated() {
        let mut log = InteractionLog::new();
        log.record_text(AgentRole::Retriever, 1, &"x".repeat(300), 200);
        match &log.entries()[0].output {
            InteractionOutput::Text(text) => assert_eq!(text.chars().count(), 203),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn markdown_lists_steps_in_order() {
        let mut log = InteractionLog::new();
        log.record_text(AgentRole::Retriever, 1, "Photosynthesis facts", 200);
        log.record_text(AgentRole::Synthesizer, 1, "Plants turn\nlight into sugar", 200);
        log.record_critique(1, CritiqueResult::parse(r#"{"score": 8, "critique": "Clear."}"#, 5));
        log.record_critique(2, CritiqueResult::parse("meh", 5));

        insta::assert_snapshot!(log.render_markdown().trim_end(), @r###"
        ### Interaction Log
        1. [iteration 1] retriever -> Photosynthesis facts
        2. [iteration 1] synthesizer -> Plants turn light into sugar
        3. [iteration 1] critic -> score 8/10: Clear.
        4. [iteration 2] critic -> score 5/10: meh (score defaulted: no score found in critique output)
        "###);
    }

    #[test]
    fn empty_log_has_placeholder() {
        assert_eq!(InteractionLog::new().render_markdown(), "No interactions recorded.");
    }
}
