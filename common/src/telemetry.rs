use anyhow::{Result, anyhow};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer};
use std::env;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber: env filter, compact fmt output, and an
/// OpenTelemetry layer. OTLP/HTTP is used when `OTEL_TRACES_EXPORTER=otlp`,
/// the stdout exporter otherwise.
pub fn init_telemetry(service_name: &'static str) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let tracer = if otlp_requested() {
        let endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4318/v1/traces".to_string());

        match otlp_tracer(&endpoint, service_name) {
            Ok(tracer) => tracer,
            Err(e) => {
                eprintln!("{service_name}: OTLP exporter unavailable ({e}), using stdout");
                stdout_tracer(service_name)
            }
        }
    } else {
        stdout_tracer(service_name)
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .with(OpenTelemetryLayer::new(tracer))
        .try_init();
}

fn otlp_requested() -> bool {
    env::var("OTEL_TRACES_EXPORTER")
        .map(|v| v == "otlp")
        .unwrap_or(false)
}

fn otlp_tracer(endpoint: &str, service_name: &'static str) -> Result<Tracer> {
    use opentelemetry_otlp::WithExportConfig;

    // Only the HTTP transport is wired; gRPC collectors listen on 4317.
    if endpoint.contains(":4317") {
        return Err(anyhow!("gRPC OTLP endpoint {endpoint} is not supported"));
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .build();

    Ok(provider.tracer(service_name))
}

fn stdout_tracer(service_name: &'static str) -> Tracer {
    SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build()
        .tracer(service_name)
}
