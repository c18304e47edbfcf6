use crate::collectors::{
    exposition::encode_text,
    registry::RequestRegistry,
    scope::{SCRAPE_TIMEOUT_HEADER, ScrapeScope, negotiate_budget},
};
use crate::exporter::ExporterState;
use axum::{
    extract::{Extension, RawQuery},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use prometheus::Registry;
use tracing::{debug, error, warn};

/// Query parameter selecting scrapers, may be repeated.
const COLLECT_PARAM: &str = "collect[]";

/// Extracts every `collect[]` value from a raw query string.
pub(crate) fn collect_params(query: Option<&str>) -> Vec<String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .filter(|(key, _)| key == COLLECT_PARAM)
                .map(|(_, value)| value.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn timeout_hint(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(SCRAPE_TIMEOUT_HEADER)?;
    match value.to_str() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, "ignoring non-ascii scrape timeout header");
            None
        }
    }
}

pub async fn metrics(
    Extension(state): Extension<ExporterState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        "content-type",
        HeaderValue::from_static(prometheus::TEXT_FORMAT),
    );

    let selectors = collect_params(query.as_deref());
    debug!(collect = ?selectors, "collect[] params");

    let budget = negotiate_budget(timeout_hint(&headers), state.timeout_offset);
    let scope = ScrapeScope::from_budget(budget);

    let registry = RequestRegistry::new(state.scrapers.select(&selectors));
    debug!(scrapers = ?registry.scraper_names(), budget = ?budget, "running scrapers");
    let results = registry
        .collect(state.source.as_ref(), &scope, &state.metrics)
        .await;

    let request_registry = Registry::new();
    if let Err(e) = request_registry.register(Box::new(results)) {
        error!(error = %e, "failed to register scrape results");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            response_headers,
            format!("Error collecting metrics: {e}"),
        );
    }

    let mut families = state.metrics.gather();
    families.extend(request_registry.gather());

    match encode_text(&families) {
        Ok(body) => (StatusCode::OK, response_headers, body),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                response_headers,
                format!("Error encoding metrics: {e}"),
            )
        }
    }
}
