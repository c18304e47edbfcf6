use anyhow::Result;
use common::{Answer, FakeServer, GLOBAL_STATUS, GLOBAL_VARIABLES};
use std::time::{Duration, Instant};

mod common;

const ALL: &[&str] = &["global_status", "global_variables"];

async fn scrape(base: &str, query: &str) -> Result<reqwest::Response> {
    Ok(reqwest::Client::new()
        .get(format!("{base}/metrics{query}"))
        .send()
        .await?)
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() -> Result<()> {
    let (base, handle) = common::serve(common::state(FakeServer::healthy(), ALL)?).await?;

    let response = scrape(&base, "").await?;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some(prometheus::TEXT_FORMAT)
    );

    let body = response.text().await?;

    assert!(body.contains("# TYPE mysql_global_status_commands_total counter"));
    assert!(body.contains("mysql_global_status_commands_total{command=\"select\"} 42"));
    assert!(body.contains("mysql_global_status_commands_total{command=\"insert\"} 7"));
    assert!(body.contains("mysql_global_status_handlers_total{handler=\"read_first\"} 3"));
    assert!(body.contains("mysql_global_status_buffer_pool_pages{state=\"free\"} 1024"));
    assert!(body.contains("# TYPE mysql_global_status_uptime untyped"));
    assert!(body.contains("mysql_global_status_uptime 3600"));
    assert!(body.contains("mysql_global_variables_max_connections 151"));
    assert!(body.contains("mysql_global_variables_read_only 0"));
    assert!(body.contains("mysql_up 1"));
    assert!(body.contains("mysql_exporter_last_scrape_error 0"));
    assert!(body.contains("mysql_exporter_build_info{"));

    // textual values never become samples
    assert!(!body.contains("wsrep_local_state_uuid"));
    assert!(!body.contains("mysql_global_variables_version "));
    assert!(!body.contains("ssl_cipher"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_collect_params_filter_scrapers() -> Result<()> {
    let (base, handle) = common::serve(common::state(FakeServer::healthy(), ALL)?).await?;

    let body = scrape(&base, "?collect[]=global_variables").await?.text().await?;
    assert!(body.contains("mysql_global_variables_max_connections 151"));
    assert!(!body.contains("mysql_global_status_"));

    // repeated and unknown selectors
    let body = scrape(
        &base,
        "?collect[]=global_status&collect[]=global_status&collect[]=nope",
    )
    .await?
    .text()
    .await?;
    assert!(body.contains("mysql_global_status_commands_total{command=\"select\"} 42"));
    assert!(!body.contains("mysql_global_variables_"));

    // only unknown selectors: nothing scraped, self metrics still served
    let response = scrape(&base, "?collect[]=nope").await?;
    assert_eq!(response.status(), 200);
    let body = response.text().await?;
    assert!(!body.contains("mysql_global_"));
    assert!(body.contains("mysql_up 1"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_failing_scraper_does_not_hide_others() -> Result<()> {
    let source = FakeServer::new()
        .answer(GLOBAL_STATUS, Answer::Fail)
        .answer(
            GLOBAL_VARIABLES,
            Answer::Rows(vec![("max_connections", "151")]),
        );
    let (base, handle) = common::serve(common::state(source, ALL)?).await?;

    let response = scrape(&base, "").await?;
    assert_eq!(response.status(), 200);

    let body = response.text().await?;
    assert!(body.contains("mysql_global_variables_max_connections 151"));
    assert!(body.contains("mysql_exporter_last_scrape_error 1"));
    assert!(body.contains("mysql_exporter_scrape_errors_total{collector=\"global_status\"} 1"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_server_down_reports_up_zero() -> Result<()> {
    let (base, handle) = common::serve(common::state(FakeServer::down(), ALL)?).await?;

    let response = scrape(&base, "").await?;
    assert_eq!(response.status(), 200);

    let body = response.text().await?;
    assert!(body.contains("mysql_up 0"));
    assert!(body.contains("mysql_exporter_last_scrape_error 1"));
    assert!(!body.contains("mysql_global_"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_scrape_timeout_header_bounds_request() -> Result<()> {
    let source = FakeServer::healthy().answer(GLOBAL_STATUS, Answer::Hang);
    let (base, handle) = common::serve(common::state(source, ALL)?).await?;

    let started = Instant::now();
    let response = reqwest::Client::new()
        .get(format!("{base}/metrics"))
        .header("X-Prometheus-Scrape-Timeout-Seconds", "0.5")
        .timeout(Duration::from_secs(5))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert!(started.elapsed() < Duration::from_secs(3));

    let body = response.text().await?;
    assert!(body.contains("mysql_up 1"));
    assert!(body.contains("mysql_exporter_last_scrape_error 1"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_malformed_timeout_header_is_ignored() -> Result<()> {
    let (base, handle) = common::serve(common::state(FakeServer::healthy(), ALL)?).await?;

    let response = reqwest::Client::new()
        .get(format!("{base}/metrics"))
        .header("X-Prometheus-Scrape-Timeout-Seconds", "soon")
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body = response.text().await?;
    assert!(body.contains("mysql_global_status_commands_total{command=\"select\"} 42"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_scrapes_total_counts_requests() -> Result<()> {
    let (base, handle) = common::serve(common::state(FakeServer::healthy(), ALL)?).await?;

    scrape(&base, "").await?;
    let body = scrape(&base, "").await?.text().await?;
    assert!(body.contains("mysql_exporter_scrapes_total 2"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_landing_page_links_metrics() -> Result<()> {
    let (base, handle) = common::serve(common::state(FakeServer::healthy(), ALL)?).await?;

    let response = reqwest::get(format!("{base}/")).await?;
    assert_eq!(response.status(), 200);

    let body = response.text().await?;
    assert!(body.contains("<a href='/metrics'>Metrics</a>"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_response_carries_request_id() -> Result<()> {
    let (base, handle) = common::serve(common::state(FakeServer::healthy(), ALL)?).await?;

    let response = scrape(&base, "").await?;
    assert!(response.headers().contains_key("x-request-id"));

    let response = reqwest::Client::new()
        .get(format!("{base}/metrics"))
        .header("x-request-id", "fixed-id")
        .send()
        .await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("fixed-id")
    );

    handle.abort();

    Ok(())
}
