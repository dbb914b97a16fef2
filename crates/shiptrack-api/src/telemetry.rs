//! Tracing subscriber setup.
//!
//! Logs are always JSON on stdout, filtered by `RUST_LOG` (default `info`).
//! When an OTLP endpoint is configured, spans are also exported over gRPC.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::AppError;

const SERVICE_NAME: &str = "shiptrack-api";

/// Keeps the span exporter alive; flushes pending spans on drop.
#[derive(Debug, Default)]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            tracing::warn!(error = %e, "failed to flush spans");
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns `AppError::Config` if the OTLP exporter cannot be built.
pub fn init(otlp_endpoint: Option<&str>) -> Result<TelemetryGuard, AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json());

    let Some(endpoint) = otlp_endpoint else {
        registry.init();
        return Ok(TelemetryGuard::default());
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Config(format!("invalid OTLP exporter settings: {e}")))?;
    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();
    let tracer = provider.tracer(SERVICE_NAME);

    registry
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}
