use crate::config::TelemetryConfig;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::CONTENT_LENGTH;
use actix_web::Error;
use anyhow::Context;
use opentelemetry::sdk::trace::Tracer;
use opentelemetry::sdk::Resource;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use tonic::metadata::MetadataMap;
use tracing::Span;
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder, TracingLogger};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

pub struct ExpenseRootSpanBuilder;

impl RootSpanBuilder for ExpenseRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        let span = tracing_actix_web::root_span!(
            request,
            entity_id = tracing::field::Empty,
            content_length = tracing::field::Empty
        );
        if let Some(content_length) = content_length(request) {
            span.record("content_length", content_length);
        }
        span
    }

    fn on_request_end<B: actix_web::body::MessageBody>(
        span: Span,
        outcome: &Result<ServiceResponse<B>, Error>,
    ) {
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}

fn content_length(request: &ServiceRequest) -> Option<u64> {
    request
        .headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

pub fn create_middleware() -> TracingLogger<ExpenseRootSpanBuilder> {
    TracingLogger::<ExpenseRootSpanBuilder>::new()
}

/// Exports spans over OTLP/gRPC. The API key, when present, is sent as the
/// `x-honeycomb-team` header.
pub fn create_opentelemetry_layer<S>(
    default_service_name: &'static str,
    config: &TelemetryConfig,
) -> Result<OpenTelemetryLayer<S, Tracer>, anyhow::Error>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    let mut metadata_map = MetadataMap::with_capacity(1);
    if let Some(api_key) = &config.api_key {
        metadata_map.insert(
            "x-honeycomb-team",
            api_key.parse().context("Unable to use telemetry API key")?,
        );
    }
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.endpoint.clone())
        .with_metadata(metadata_map);

    let service_name = config
        .service_name
        .clone()
        .unwrap_or_else(|| default_service_name.to_string());
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_trace_config(
            opentelemetry::sdk::trace::config().with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                service_name,
            )])),
        )
        .with_exporter(exporter)
        .install_simple()
        .context("Unable to create tracer")?;
    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    Ok(telemetry_layer)
}
