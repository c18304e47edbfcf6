//! Exporter self-monitoring
//!
//! These metrics describe the exporter rather than the MySQL server. They
//! live in a process-wide registry, are updated by every request and are
//! gathered next to the per-request scraper output:
//!
//! - `mysql_up`: whether the last connection ping succeeded
//! - `mysql_exporter_scrapes_total`: requests served on the metrics path
//! - `mysql_exporter_scrape_errors_total{collector}`: failed scraper runs
//! - `mysql_exporter_last_scrape_error`: 1 if any scraper of the last request failed
//! - `mysql_exporter_collector_duration_seconds{collector}`: last run time per scraper
//! - `mysql_exporter_build_info{version,revision}`: constant 1
//!
//! ```promql
//! # scrapers failing over the last five minutes
//! sum by (collector) (rate(mysql_exporter_scrape_errors_total[5m])) > 0
//! ```
mod scraper;

pub use scraper::ScrapeTimer;

use anyhow::Result;
use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};
use prometheus::proto::MetricFamily;

#[derive(Clone)]
pub struct ExporterMetrics {
    registry: Registry,
    up: Gauge,
    scrapes_total: IntCounter,
    scrape_errors_total: IntCounterVec,
    last_scrape_error: Gauge,
    collector_duration_seconds: GaugeVec,
}

impl ExporterMetrics {
    pub fn new(version: &str, revision: &str) -> Result<Self> {
        let registry = Registry::new();

        let up = Gauge::with_opts(Opts::new(
            "mysql_up",
            "Whether the MySQL server is up.",
        ))?;

        let scrapes_total = IntCounter::with_opts(Opts::new(
            "mysql_exporter_scrapes_total",
            "Total number of times MySQL was scraped for metrics.",
        ))?;

        let scrape_errors_total = IntCounterVec::new(
            Opts::new(
                "mysql_exporter_scrape_errors_total",
                "Total number of times an error occurred scraping a MySQL.",
            ),
            &["collector"],
        )?;

        let last_scrape_error = Gauge::with_opts(Opts::new(
            "mysql_exporter_last_scrape_error",
            "Whether the last scrape of metrics from MySQL resulted in an error (1 for error, 0 for success).",
        ))?;

        let collector_duration_seconds = GaugeVec::new(
            Opts::new(
                "mysql_exporter_collector_duration_seconds",
                "Collector time duration.",
            ),
            &["collector"],
        )?;

        let build_info = IntGaugeVec::new(
            Opts::new(
                "mysql_exporter_build_info",
                "A metric with a constant '1' value labeled by version and revision of the exporter.",
            ),
            &["version", "revision"],
        )?;
        build_info.with_label_values(&[version, revision]).set(1);

        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(scrape_errors_total.clone()))?;
        registry.register(Box::new(last_scrape_error.clone()))?;
        registry.register(Box::new(collector_duration_seconds.clone()))?;
        registry.register(Box::new(build_info))?;

        Ok(Self {
            registry,
            up,
            scrapes_total,
            scrape_errors_total,
            last_scrape_error,
            collector_duration_seconds,
        })
    }

    /// Start timing one scraper run
    #[must_use]
    pub fn start_scrape(&self, collector: &'static str) -> ScrapeTimer {
        ScrapeTimer::new(collector, self.clone())
    }

    pub fn begin_request(&self) {
        self.scrapes_total.inc();
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(if up { 1.0 } else { 0.0 });
    }

    pub fn set_last_scrape_error(&self, failed: bool) {
        self.last_scrape_error.set(if failed { 1.0 } else { 0.0 });
    }

    fn record(&self, collector: &str, seconds: f64, ok: bool) {
        self.collector_duration_seconds
            .with_label_values(&[collector])
            .set(seconds);

        if !ok {
            self.scrape_errors_total.with_label_values(&[collector]).inc();
        }
    }

    #[must_use]
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}
