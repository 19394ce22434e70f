use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use triad_core::{
    Config, ConfigLoader, DynGenerator, EvaluationHarness, EvaluationReport, EventCollector,
    PromptStore, SingleAgentBaseline, TelemetryOptions, Workflow, WorkflowEvent, WorkflowResult,
    build_generator, builtin_tasks, init_telemetry, metrics,
};

#[derive(Parser, Debug)]
#[command(
    name = "triad",
    version,
    about = "Retrieve, synthesize and critique with a bounded refinement loop"
)]
struct Cli {
    /// Configuration file (defaults to $TRIAD_CONFIG, then ./triad.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer one query with the multi-agent workflow.
    Run(RunArgs),
    /// Run the workflow and the single-agent baseline side by side.
    Compare(CompareArgs),
    /// Run the built-in evaluation tasks through both systems.
    Eval(EvalArgs),
    /// Read queries from stdin until `quit`.
    Interactive,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    query: String,

    /// Override `[workflow].max_iterations`.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,

    /// Print the interaction log after the answer.
    #[arg(long)]
    trace: bool,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[arg(long)]
    query: String,

    /// Write both results as JSON to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvalArgs {
    /// Directory receiving `evaluation_<timestamp>.json`.
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Pause between tasks in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pause_ms: u64,
}

/// Everything a subcommand needs, built once from config.
struct App {
    config: Config,
    generator: DynGenerator,
    prompts: PromptStore,
}

impl App {
    fn workflow(&self) -> Workflow {
        Workflow::from_config(&self.config, self.generator.clone(), &self.prompts)
    }

    fn baseline(&self) -> SingleAgentBaseline {
        SingleAgentBaseline::from_config(&self.config, self.generator.clone())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(cli.config.clone())?;

    init_telemetry(TelemetryOptions::from_logging(&config.logging))?;
    metrics::init_metrics_from_env("triad")?;

    let generator = build_generator(&config.llm)?;
    let prompts = PromptStore::load(&config.prompts.path);
    let app = App {
        config,
        generator,
        prompts,
    };

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(&app, args).await,
            Command::Compare(args) => compare_command(&app, args).await,
            Command::Eval(args) => eval_command(&app, args).await,
            Command::Interactive => interactive_command(&app).await,
        }
    })
}

async fn run_command(app: &App, args: RunArgs) -> Result<()> {
    info!(model = %app.config.llm.model, "starting workflow");
    let (collector, receiver) = EventCollector::new();
    let progress = tokio::spawn(print_progress(receiver));

    let workflow = app.workflow().with_events(collector);
    let max_iterations = args
        .max_iterations
        .unwrap_or(app.config.workflow.max_iterations);
    let outcome = workflow.run_with_iterations(&args.query, max_iterations).await;
    drop(workflow);
    progress.await.ok();

    let result = outcome.context("workflow run failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    if args.trace {
        println!("\n{}", result.interaction_log.render_markdown());
    }
    Ok(())
}

async fn compare_command(app: &App, args: CompareArgs) -> Result<()> {
    let workflow = app.workflow();
    let baseline = app.baseline();

    let (multi, single) = tokio::join!(workflow.run(&args.query), baseline.run(&args.query));
    let multi = multi.context("multi-agent workflow failed")?;
    let single = single.context("single-agent baseline failed")?;

    println!("=== Multi-agent ({}s) ===", multi.time_taken);
    print_result(&multi);
    println!("\n=== Single agent ({}s) ===", single.time_taken);
    println!("{}", single.response);

    if single.time_taken > 0.0 {
        let overhead = (multi.time_taken / single.time_taken - 1.0) * 100.0;
        println!("\nTime overhead: {overhead:.1}%");
    }

    if let Some(path) = args.output {
        let body = serde_json::json!({
            "query": args.query,
            "multi_agent": multi,
            "single_agent": single,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&body)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved comparison to {}", path.display());
    }
    Ok(())
}

async fn eval_command(app: &App, args: EvalArgs) -> Result<()> {
    let workflow = app.workflow();
    let baseline = app.baseline();
    let tasks = builtin_tasks();

    let report = EvaluationHarness::new(&workflow, &baseline)
        .with_pause(Duration::from_millis(args.pause_ms))
        .run(&tasks)
        .await;

    print_report(&report);
    let path = report.persist(&args.output_dir)?;
    println!("\nResults saved to: {}", path.display());

    if !report.failures.is_empty() {
        anyhow::bail!("{} evaluation run(s) failed", report.failures.len());
    }
    Ok(())
}

async fn interactive_command(app: &App) -> Result<()> {
    let workflow = app.workflow();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Type a question, or 'quit' to exit.");
    loop {
        stdout.write_all(b"\nEnter your query: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }

        match workflow.run(query).await {
            Ok(result) => print_result(&result),
            Err(err) => eprintln!("error: {err}"),
        }
    }
    Ok(())
}

async fn print_progress(mut receiver: UnboundedReceiver<WorkflowEvent>) {
    while let Some(event) = receiver.recv().await {
        match event {
            WorkflowEvent::StepStarted {
                role, iteration, ..
            } => eprintln!("[{iteration}] {role} ..."),
            WorkflowEvent::StepFinished {
                role,
                iteration,
                duration_ms,
                ..
            } => eprintln!("[{iteration}] {role} done in {duration_ms}ms"),
            WorkflowEvent::Refining {
                iteration, score, ..
            } => eprintln!("[{iteration}] score {score}/10 below threshold, refining"),
            WorkflowEvent::Completed {
                score, iterations, ..
            } => eprintln!("completed with score {score}/10 after {iterations} iteration(s)"),
            WorkflowEvent::Failed { stage, reason, .. } => {
                eprintln!("{stage} step failed: {reason}")
            }
        }
    }
}

fn print_result(result: &WorkflowResult) {
    println!("{}\n", result.final_response);
    println!("Quality score: {}/10", result.quality_score);
    if let Some(err) = &result.score_parse_error {
        println!("  (critic score unreadable: {err}; raw critique below)");
    }
    println!("Critique: {}", result.critique);
    println!("Iterations: {}", result.iterations);
    println!("Time taken: {}s", result.time_taken);
}

fn print_report(report: &EvaluationReport) {
    println!(
        "{:<10} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Task", "MA Score", "MA Time", "SA Time", "MA Words", "SA Words"
    );
    for ma in &report.multi_agent {
        let sa = report.single_agent.iter().find(|sa| sa.task_id == ma.task_id);
        println!(
            "{:<10} {:>9} {:>9} {:>9} {:>9} {:>9}",
            ma.task_id,
            format!("{}/10", ma.score),
            format!("{}s", ma.time),
            sa.map(|sa| format!("{}s", sa.time)).unwrap_or_else(|| "-".into()),
            ma.word_count,
            sa.map(|sa| sa.word_count.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    for failure in &report.failures {
        println!("{:<10} {} failed: {}", failure.task_id, failure.system, failure.error);
    }

    let summary = &report.summary;
    let percent = |value: Option<f64>| {
        value
            .map(|v| format!("{v}%"))
            .unwrap_or_else(|| "n/a".into())
    };
    println!("\nSummary:");
    if let Some(score) = summary.multi_agent.avg_quality_score {
        println!("Multi-agent average quality score: {score}/10");
    }
    println!(
        "Compared over {} task(s) both systems completed",
        summary.comparison.paired_tasks
    );
    println!("Time overhead: {}", percent(summary.comparison.time_overhead));
    println!(
        "Response length difference: {}",
        percent(summary.comparison.response_length_diff)
    );
    println!(
        "Completeness improvement: {}",
        percent(summary.comparison.completeness_improvement)
    );
}
