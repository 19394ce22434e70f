use std::sync::Arc;

use triad_core::llm::OpenAiGenerator;
use triad_core::{
    ApiKey, ConfigLoader, GenerationError, PromptStore, SingleAgentBaseline, Workflow,
};

fn completion(content: &str) -> String {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

fn config_for(base_url: &str) -> triad_core::Config {
    ConfigLoader::from_toml(&format!(
        r#"
        [llm]
        base_url = "{base_url}"
        model = "gpt-test"
        timeout_ms = 5000

        [retry]
        max_retries = 2
        initial_backoff_ms = 1
        max_backoff_ms = 2
        "#
    ))
    .expect("test config parses")
}

#[tokio::test]
async fn workflow_runs_against_http_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(r#"{"score": 9, "critique": "Thorough."}"#))
        .expect(3)
        .create_async()
        .await;

    let config = config_for(&format!("{}/v1", server.url()));
    let generator = Arc::new(OpenAiGenerator::new(&config.llm, ApiKey::new("sk-test")).unwrap());
    let workflow = Workflow::from_config(&config, generator, &PromptStore::new());

    let result = workflow.run("What is Rust?").await.unwrap();
    mock.assert_async().await;
    assert_eq!(result.iterations, 1);
    assert_eq!(result.quality_score, 9);
    assert_eq!(result.critique, "Thorough.");
}

#[tokio::test]
async fn baseline_retries_rate_limits_then_gives_up() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body("slow down")
        .expect(3)
        .create_async()
        .await;

    let config = config_for(&format!("{}/v1", server.url()));
    let generator = Arc::new(OpenAiGenerator::new(&config.llm, ApiKey::new("sk-test")).unwrap());
    let baseline = SingleAgentBaseline::from_config(&config, generator);

    let err = baseline.run("q").await.unwrap_err();
    mock.assert_async().await;
    assert!(matches!(err.0, GenerationError::RateLimited(_)));
}
