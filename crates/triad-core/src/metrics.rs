use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

struct TriadMetrics {
    runs: Counter<u64>,
    iterations: Histogram<u64>,
    generation_ms: Histogram<f64>,
}

static METRICS: OnceCell<TriadMetrics> = OnceCell::new();

fn handles() -> &'static TriadMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("triad.workflow");
        TriadMetrics {
            runs: meter
                .u64_counter("triad_runs_total")
                .with_description("Workflow runs by final status")
                .init(),
            iterations: meter
                .u64_histogram("triad_run_iterations")
                .with_description("Critique iterations used per workflow run")
                .init(),
            generation_ms: meter
                .f64_histogram("triad_generation_duration_ms")
                .with_description("Latency of single generation calls in milliseconds")
                .init(),
        }
    })
}

/// Log a hint when an OTEL metrics endpoint is configured; exporter wiring is
/// left to the deployment.
pub fn init_metrics_from_env(service_name: &str) -> Result<()> {
    if std::env::var("TRIAD_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "TRIAD_OTEL_METRICS_ENDPOINT detected for {service_name}. Install an OTLP meter provider to export workflow metrics."
        );
    }
    Ok(())
}

/// Record one generation call (no-op without an installed meter provider).
pub fn record_generation(role: &str, status: &str, duration_ms: u64) {
    let attrs = [
        KeyValue::new("role", role.to_string()),
        KeyValue::new("status", status.to_string()),
    ];
    handles().generation_ms.record(duration_ms as f64, &attrs);
}

/// Record a finished workflow run.
pub fn record_run(status: &str, iterations: u32) {
    let metrics = handles();
    let attrs = [KeyValue::new("status", status.to_string())];
    metrics.runs.add(1, &attrs);
    metrics.iterations.record(u64::from(iterations), &attrs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_provider_is_a_no_op() {
        record_generation("critic", "ok", 12);
        record_run("completed", 2);
        assert!(init_metrics_from_env("triad-test").is_ok());
    }
}
