use std::fmt;
use std::sync::OnceLock;

use common::configuration::Tracing;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::{propagation::TraceContextPropagator, Resource};
use time::macros::format_description;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format, time::FormatTime, FmtContext, FormatEvent, FormatFields, FormattedFields,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "codeshift";

struct BracketedTime;

impl FormatTime for BracketedTime {
    fn format_time(&self, w: &mut format::Writer<'_>) -> fmt::Result {
        let now = time::OffsetDateTime::now_utc();
        let formatted = now
            .format(&format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .map_err(|_| fmt::Error)?;
        write!(w, "[{}]", formatted)
    }
}

/// `[time][level] request_id=.. fields`, with the request id lifted from the
/// closest enclosing span that carries one.
struct BracketedFormatter;

impl<S, N> FormatEvent<S, N> for BracketedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        BracketedTime.format_time(&mut writer)?;

        write!(
            writer,
            "[{}]",
            event.metadata().level().to_string().to_lowercase()
        )?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if let Some(request_id) = request_id_field(fields.fields.as_str()) {
                        write!(writer, " request_id={}", request_id)?;
                        break;
                    }
                }
            }
        }

        write!(writer, " ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn request_id_field(fields: &str) -> Option<&str> {
    const KEY: &str = "request_id=";
    let start = fields.find(KEY)? + KEY.len();
    let rest = &fields[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn sampler(random_sampling: u32) -> Sampler {
    Sampler::TraceIdRatioBased(f64::from(random_sampling.min(100)) / 100.0)
}

fn otlp_provider(endpoint: &str, random_sampling: u32) -> Option<SdkTracerProvider> {
    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(err) => {
            eprintln!("failed to create OTLP span exporter, tracing disabled: {}", err);
            return None;
        }
    };

    let resource = Resource::builder_empty()
        .with_service_name(SERVICE_NAME)
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(sampler(random_sampling))
            .with_resource(resource)
            .build(),
    )
}

static INIT_LOGGER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Installs the global subscriber once. Spans are exported over OTLP only when
/// both a collector endpoint and a non-zero sampling rate are configured.
pub fn init_tracer(tracing_config: Option<&Tracing>) -> &'static SdkTracerProvider {
    INIT_LOGGER.get_or_init(|| {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let otel_endpoint = tracing_config.and_then(|t| t.opentracing_grpc_endpoint.clone());
        let random_sampling = tracing_config.and_then(|t| t.random_sampling).unwrap_or(0);

        eprintln!(
            "initializing tracing: otel_endpoint={:?}, random_sampling={}",
            otel_endpoint, random_sampling
        );

        let exporting = match otel_endpoint {
            Some(endpoint) if random_sampling > 0 => otlp_provider(&endpoint, random_sampling),
            _ => None,
        };

        // absent when spans are not exported; Option<L> is itself a layer
        let telemetry_layer = exporting.as_ref().map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
        });
        let provider = exporting.unwrap_or_else(|| SdkTracerProvider::builder().build());
        global::set_tracer_provider(provider.clone());

        // no ANSI so span fields stay parseable
        let fmt_layer = tracing_subscriber::fmt::layer()
            .event_format(BracketedFormatter)
            .fmt_fields(format::DefaultFields::new())
            .with_ansi(false);

        if let Err(err) = tracing_subscriber::registry()
            .with(telemetry_layer)
            .with(env_filter())
            .with(fmt_layer)
            .try_init()
        {
            eprintln!("tracing subscriber already installed: {}", err);
        }

        provider
    })
}
