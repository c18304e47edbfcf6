use crate::{
    cli::telemetry::shutdown_tracer,
    collectors::{config::ScraperSet, exporter::ExporterMetrics, source::StatusSource},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::{Next, from_fn},
    response::Response,
    routing::get,
};
use opentelemetry::global;
use opentelemetry::trace::{TraceContextExt, TraceId};
use opentelemetry_http::HeaderExtractor;
use secrecy::{ExposeSecret, SecretString};
use sqlx::mysql::MySqlPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use ulid::Ulid;

mod handlers;
mod shutdown;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

/// Everything a running exporter needs, shared by all requests.
#[derive(Clone)]
pub struct ExporterState {
    pub source: Arc<dyn StatusSource>,
    pub scrapers: ScraperSet,
    pub metrics: ExporterMetrics,
    /// Seconds subtracted from the Prometheus scrape timeout.
    pub timeout_offset: f64,
    pub metrics_path: Arc<str>,
}

#[derive(Debug)]
pub struct ExporterOptions {
    pub listen_address: String,
    pub metrics_path: String,
    pub timeout_offset: f64,
    pub dsn: SecretString,
    pub collectors: Vec<String>,
}

pub async fn new(options: ExporterOptions) -> Result<()> {
    let scrapers = ScraperSet::from_names(&options.collectors)?;
    if scrapers.is_empty() {
        warn!("no scrapers enabled, only exporter metrics will be served");
    }
    let scraper_names = scrapers.names();

    // Lazy: an unreachable server shows up as mysql_up 0, not as a failed start
    let pool = MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(3)
        .max_lifetime(Duration::from_secs(60 * 2))
        .acquire_timeout(Duration::from_secs(5))
        .test_before_acquire(true)
        .connect_lazy(options.dsn.expose_secret())
        .context("Invalid database connection string")?;

    let state = ExporterState {
        source: Arc::new(pool),
        scrapers,
        metrics: ExporterMetrics::new(env!("CARGO_PKG_VERSION"), GIT_COMMIT_HASH)?,
        timeout_offset: options.timeout_offset,
        metrics_path: Arc::from(options.metrics_path.as_str()),
    };

    let app = router(state);

    let listener = TcpListener::bind(&options.listen_address)
        .await
        .with_context(|| format!("Failed to bind to {}", options.listen_address))?;

    let bind_addr = listener
        .local_addr()
        .map_or_else(|_| options.listen_address.clone(), |a| a.to_string());

    println!(
        "{} {} - Listening on {bind_addr}{}\n\nEnabled scrapers:\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        options.metrics_path,
        format_list(&scraper_names),
    );

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
    {
        error!(error=%e, "server error");
    }

    info!("shutting down");

    shutdown_tracer();

    Ok(())
}

/// Builds the HTTP application: landing page, metrics path and health check.
pub fn router(state: ExporterState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(make_span)
        .on_response(on_response);

    let metrics_path = state.metrics_path.to_string();

    Router::new()
        .route("/", get(handlers::landing))
        .route(&metrics_path, get(handlers::metrics))
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(trace_layer)
                .layer(from_fn(add_trace_headers))
                .layer(Extension(state)),
        )
}

// Helper to format a list of items with a leading dash and indentation for the
// start up message
fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn make_span(request: &Request<Body>) -> Span {
    let parent_cx =
        global::get_text_map_propagator(|prop| prop.extract(&HeaderExtractor(request.headers())));

    let method = request.method().as_str();

    let path = request.uri().path();

    let target = request.uri().to_string();

    let scheme = request.uri().scheme_str().unwrap_or("http");

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");

    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let span = info_span!(
        "http.server.request",
        otel.kind = "server",
        otel.status_code = tracing::field::Empty,
        http.method = method,
        http.route = path,
        http.target = target,
        http.scheme = scheme,
        http.user_agent = user_agent,
        request_id = request_id,
    );

    let _ = span.set_parent(parent_cx);

    span
}

fn on_response<B>(response: &axum::http::Response<B>, latency: Duration, span: &Span) {
    if response.status().is_server_error() {
        span.record("otel.status_code", "ERROR");
    } else {
        span.record("otel.status_code", "OK");
    }

    let cx = span.context();
    let trace_id = cx.span().span_context().trace_id();
    let elapsed_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);

    if trace_id == TraceId::INVALID {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms,
            "request completed"
        );
    } else {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms,
            trace_id = %trace_id,
            "request completed"
        );
    }
}

async fn add_trace_headers(req: Request<Body>, next: Next) -> Response {
    let mut res = next.run(req).await;

    let span = Span::current();

    let cx = span.context();

    // CLONE the SpanContext to avoid borrowing a temporary
    let span_context = cx.span().span_context().clone();

    if span_context.is_valid()
        && let Ok(val) = HeaderValue::from_str(&span_context.trace_id().to_string())
    {
        res.headers_mut()
            .insert(HeaderName::from_static("x-trace-id"), val);
    }

    res
}
