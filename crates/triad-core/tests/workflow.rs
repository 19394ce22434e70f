use std::sync::Arc;

use triad_core::{
    AgentSet, AgentSettings, Config, EventCollector, GenerationError, InteractionOutput, PromptStore,
    RetryPolicy, RoleGenerators, ScriptedGenerator, SingleAgentBaseline, Workflow, WorkflowEvent,
    WorkflowSettings, WorkflowStage,
};

struct Doubles {
    retriever: Arc<ScriptedGenerator>,
    synthesizer: Arc<ScriptedGenerator>,
    critic: Arc<ScriptedGenerator>,
}

impl Doubles {
    fn new(critic_replies: &[&str]) -> Self {
        Self {
            retriever: Arc::new(ScriptedGenerator::new("gpt-test").with_replies(["Background facts."])),
            synthesizer: Arc::new(
                ScriptedGenerator::new("gpt-test").with_replies(["First draft.", "Second draft."]),
            ),
            critic: Arc::new(
                ScriptedGenerator::new("gpt-test").with_replies(critic_replies.iter().copied()),
            ),
        }
    }

    fn workflow(&self) -> Workflow {
        let generators = RoleGenerators {
            retriever: self.retriever.clone(),
            synthesizer: self.synthesizer.clone(),
            critic: self.critic.clone(),
        };
        let agents = AgentSet::build(generators, &PromptStore::new(), &AgentSettings::default(), 5);
        let settings = WorkflowSettings {
            retry: RetryPolicy::none(),
            ..WorkflowSettings::default()
        };
        Workflow::new(agents, settings)
    }
}

fn score(value: u8) -> String {
    format!(r#"{{"score": {value}, "critique": "Scored {value}."}}"#)
}

#[tokio::test]
async fn low_then_high_score_refines_once() {
    let (low, high) = (score(5), score(8));
    let doubles = Doubles::new(&[low.as_str(), high.as_str()]);
    let result = doubles
        .workflow()
        .run_with_iterations("What is photosynthesis?", 2)
        .await
        .expect("workflow should succeed");

    assert_eq!(result.iterations, 2);
    assert_eq!(result.final_response, "Second draft.");
    assert_eq!(result.quality_score, 8);
    assert_eq!(result.critique, "Scored 8.");
    assert_eq!(result.query, "What is photosynthesis?");
    assert_eq!(doubles.critic.call_count(), 2);
    // retriever + 2 syntheses + 2 critiques
    assert_eq!(result.interaction_log.len(), 5);
}

#[tokio::test]
async fn refinement_feeds_back_candidate_and_critique() {
    let (low, high) = (score(4), score(9));
    let doubles = Doubles::new(&[low.as_str(), high.as_str()]);
    doubles.workflow().run("q").await.unwrap();

    let synth_calls = doubles.synthesizer.calls();
    assert_eq!(synth_calls.len(), 2);
    assert!(synth_calls[0].user_prompt.contains("Retrieved information:\nBackground facts."));
    assert!(
        synth_calls[1]
            .user_prompt
            .contains("Retrieved information:\nFirst draft.\n\nCritique: Scored 4.")
    );
    // no second retrieval
    assert_eq!(doubles.retriever.call_count(), 1);
}

#[tokio::test]
async fn high_first_score_stops_after_one_iteration() {
    let high = score(9);
    let doubles = Doubles::new(&[high.as_str()]);
    let result = doubles
        .workflow()
        .run_with_iterations("q", 5)
        .await
        .unwrap();

    assert_eq!(result.iterations, 1);
    assert_eq!(result.final_response, "First draft.");
    assert_eq!(doubles.synthesizer.call_count(), 1);
}

#[tokio::test]
async fn critique_count_never_exceeds_cap() {
    for cap in 1..=4u32 {
        let lows: Vec<String> = (0..6).map(|_| score(3)).collect();
        let refs: Vec<&str> = lows.iter().map(String::as_str).collect();
        let doubles = Doubles::new(&refs);
        let result = doubles.workflow().run_with_iterations("q", cap).await.unwrap();

        assert_eq!(result.iterations, cap);
        assert_eq!(doubles.critic.call_count(), cap as usize);
        assert_eq!(result.quality_score, 3);
    }
}

#[tokio::test]
async fn retrieval_failure_aborts_before_synthesis() {
    let doubles = Doubles {
        retriever: Arc::new(
            ScriptedGenerator::new("gpt-test").with_error(GenerationError::Timeout { after_ms: 100 }),
        ),
        ..Doubles::new(&[])
    };

    let err = doubles.workflow().run("q").await.unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::Retrieve);
    assert_eq!(err.iteration(), 1);
    assert_eq!(err.generation_error(), &GenerationError::Timeout { after_ms: 100 });
    assert_eq!(doubles.synthesizer.call_count(), 0);
    assert_eq!(doubles.critic.call_count(), 0);
}

#[tokio::test]
async fn critic_failure_in_refinement_names_iteration() {
    let low = score(2);
    let doubles = Doubles {
        critic: Arc::new(
            ScriptedGenerator::new("gpt-test")
                .with_replies([low.as_str()])
                .with_error(GenerationError::InvalidResponse("truncated".into())),
        ),
        ..Doubles::new(&[])
    };

    let err = doubles.workflow().run("q").await.unwrap_err();
    assert_eq!(err.stage(), WorkflowStage::Critique);
    assert_eq!(err.iteration(), 2);
}

#[tokio::test]
async fn events_follow_step_order() {
    let (low, high) = (score(6), score(7));
    let doubles = Doubles::new(&[low.as_str(), high.as_str()]);
    let (collector, mut receiver) = EventCollector::new();
    let workflow = doubles.workflow().with_events(collector);

    workflow.run("q").await.unwrap();
    drop(workflow);

    let mut kinds = Vec::new();
    while let Some(event) = receiver.recv().await {
        kinds.push(match event {
            WorkflowEvent::StepStarted { role, iteration, .. } => format!("start {role} {iteration}"),
            WorkflowEvent::StepFinished { role, iteration, .. } => format!("done {role} {iteration}"),
            WorkflowEvent::Refining { iteration, score, .. } => format!("refine {iteration} {score}"),
            WorkflowEvent::Completed { score, iterations, .. } => {
                format!("completed {score} {iterations}")
            }
            WorkflowEvent::Failed { stage, .. } => format!("failed {stage}"),
        });
    }

    assert_eq!(
        kinds,
        vec![
            "start retriever 1",
            "done retriever 1",
            "start synthesizer 1",
            "done synthesizer 1",
            "start critic 1",
            "done critic 1",
            "refine 1 6",
            "start synthesizer 2",
            "done synthesizer 2",
            "start critic 2",
            "done critic 2",
            "completed 7 2",
        ]
    );
}

#[tokio::test]
async fn interaction_log_keeps_structured_critiques() {
    let high = score(10);
    let doubles = Doubles::new(&[high.as_str()]);
    let result = doubles.workflow().run("q").await.unwrap();

    let entries = result.interaction_log.entries();
    assert_eq!(entries.len(), 3);
    match &entries[2].output {
        InteractionOutput::Critique(critique) => assert_eq!(critique.score, 10),
        other => panic!("expected critique entry, got {other:?}"),
    }

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["quality_score"], 10);
    assert!(json.get("score_parse_error").is_none());
}

#[tokio::test]
async fn workflow_and_baseline_run_concurrently() {
    let high = score(8);
    let doubles = Doubles::new(&[high.as_str()]);
    let workflow = doubles.workflow();
    let baseline_generator =
        Arc::new(ScriptedGenerator::new("gpt-test").with_replies(["Direct answer."]));
    let baseline = SingleAgentBaseline::from_config(&Config::default(), baseline_generator);

    let (multi, single) = tokio::join!(workflow.run("q"), baseline.run("q"));
    assert_eq!(multi.unwrap().final_response, "First draft.");
    assert_eq!(single.unwrap().response, "Direct answer.");
}

#[tokio::test]
async fn run_simple_returns_answer_text() {
    let high = score(7);
    let doubles = Doubles::new(&[high.as_str()]);
    let answer = doubles.workflow().run_simple("q").await.unwrap();
    assert_eq!(answer, "First draft.");
}
