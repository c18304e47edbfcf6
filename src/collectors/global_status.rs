use crate::collectors::{
    MetricSink, ScrapeError, Scraper,
    classifier::{Classification, ClassificationRule, MetricKind, StatusClassifier},
    scope::ScrapeScope,
    source::StatusSource,
};
use anyhow::Result;
use futures::StreamExt;
use prometheus::core::Desc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info_span, instrument};
use tracing_futures::Instrument as _;

const GLOBAL_STATUS_QUERY: &str = "SHOW GLOBAL STATUS";

const GLOBAL_STATUS: &str = "global_status";

const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        prefix: "com",
        kind: MetricKind::Counter,
        family: "commands_total",
        label: "command",
        help: "Total number of executed MySQL commands.",
    },
    ClassificationRule {
        prefix: "handler",
        kind: MetricKind::Counter,
        family: "handlers_total",
        label: "handler",
        help: "Total number of executed MySQL handlers.",
    },
    ClassificationRule {
        prefix: "connection_errors",
        kind: MetricKind::Counter,
        family: "connection_errors_total",
        label: "error",
        help: "Total number of MySQL connection errors.",
    },
    ClassificationRule {
        prefix: "innodb_buffer_pool_pages",
        kind: MetricKind::Counter,
        family: "buffer_pool_pages",
        label: "state",
        help: "Innodb buffer pool pages by state.",
    },
    ClassificationRule {
        prefix: "innodb_rows",
        kind: MetricKind::Counter,
        family: "innodb_row_ops_total",
        label: "operation",
        help: "Total number of MySQL InnoDB row operations.",
    },
    ClassificationRule {
        prefix: "performance_schema",
        kind: MetricKind::Counter,
        family: "performance_schema_lost_total",
        label: "instrumentation",
        help: "Total number of MySQL instrumentations that could not be loaded or created due to memory constraints.",
    },
];

/// Galera identifiers reported through `SHOW GLOBAL STATUS`.
const TEXT_KEYS: &[&str] = &[
    "wsrep_local_state_uuid",
    "wsrep_cluster_state_uuid",
    "wsrep_provider_version",
    "wsrep_evs_repl_latency",
];

/// Scrapes `SHOW GLOBAL STATUS`
#[derive(Clone, Debug)]
pub struct GlobalStatusScraper {
    classifier: StatusClassifier,
}

impl GlobalStatusScraper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            classifier: StatusClassifier::new(
                GLOBAL_STATUS,
                RULES,
                TEXT_KEYS,
                "Generic metric from SHOW GLOBAL STATUS.",
            )?,
        })
    }
}

impl Scraper for GlobalStatusScraper {
    fn name(&self) -> &'static str {
        GLOBAL_STATUS
    }

    fn help(&self) -> &'static str {
        "Collect from SHOW GLOBAL STATUS"
    }

    fn version(&self) -> f64 {
        5.7
    }

    fn enabled_by_default(&self) -> bool {
        true
    }

    fn descriptors(&self) -> Vec<Arc<Desc>> {
        self.classifier.descriptors()
    }

    #[instrument(
        skip_all,
        level = "info",
        err,
        fields(scraper = GLOBAL_STATUS, otel.kind = "internal")
    )]
    async fn scrape(
        &self,
        scope: &ScrapeScope,
        source: &dyn StatusSource,
        sink: &mut MetricSink,
    ) -> Result<(), ScrapeError> {
        let query_span = info_span!(
            "db.query",
            otel.kind = "client",
            db.system = "mysql",
            db.operation = "SHOW",
            db.statement = GLOBAL_STATUS_QUERY
        );

        let mut rows = source.query_rows(GLOBAL_STATUS_QUERY);
        let mut text = BTreeMap::new();
        let mut emitted = 0usize;

        while let Some(row) = scope
            .bound(rows.next())
            .instrument(query_span.clone())
            .await?
        {
            match self.classifier.classify_row(&row?) {
                Classification::Metric(metric) => {
                    sink.push(metric);
                    emitted += 1;
                }
                Classification::Text { key, value } => {
                    text.insert(key, value);
                }
                Classification::Dropped => {}
            }
        }

        if !text.is_empty() {
            debug!(context = ?text, "captured textual status variables");
        }
        debug!(metrics = emitted, "global status scraped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::source::testing::{Canned, CannedSource};
    use std::time::Duration;

    fn source(answer: Canned) -> CannedSource {
        CannedSource::default().with(GLOBAL_STATUS_QUERY, answer)
    }

    #[test]
    fn test_metadata() {
        let scraper = GlobalStatusScraper::new().unwrap();
        assert_eq!(scraper.name(), "global_status");
        assert_eq!(scraper.help(), "Collect from SHOW GLOBAL STATUS");
        assert!((scraper.version() - 5.7).abs() < f64::EPSILON);
        assert!(scraper.enabled_by_default());
        assert_eq!(scraper.descriptors().len(), RULES.len());
    }

    #[tokio::test]
    async fn test_scrape_classifies_rows() -> Result<()> {
        let scraper = GlobalStatusScraper::new()?;
        let source = source(Canned::Rows(vec![
            ("Com_select", "42"),
            ("Handler_commit", "3"),
            ("Innodb_buffer_pool_pages_free", "512"),
            ("Uptime", "3600"),
            ("wsrep_cluster_state_uuid", "7e6a3f3e-0000"),
            ("Ssl_cipher", "AES256-SHA"),
            ("Slave_running", "OFF"),
        ]));
        let mut sink = MetricSink::new();

        scraper
            .scrape(&ScrapeScope::unbounded(), &source, &mut sink)
            .await?;

        let metrics = sink.metrics();
        assert_eq!(metrics.len(), 5);

        let first = &metrics[0];
        assert_eq!(first.desc.fq_name, "mysql_global_status_commands_total");
        assert_eq!(first.label_values, vec!["select".to_string()]);
        assert!((first.value - 42.0).abs() < f64::EPSILON);
        assert_eq!(first.kind, MetricKind::Counter);

        assert_eq!(metrics[1].desc.fq_name, "mysql_global_status_handlers_total");
        assert_eq!(metrics[2].desc.fq_name, "mysql_global_status_buffer_pool_pages");
        assert_eq!(metrics[2].label_values, vec!["free".to_string()]);
        assert_eq!(metrics[3].desc.fq_name, "mysql_global_status_uptime");
        assert_eq!(metrics[3].kind, MetricKind::Untyped);
        assert_eq!(metrics[4].desc.fq_name, "mysql_global_status_slave_running");
        assert!(metrics[4].value.abs() < f64::EPSILON);

        // textual identifiers never become metrics
        assert!(
            !metrics
                .iter()
                .any(|m| m.desc.fq_name.contains("wsrep_cluster_state_uuid"))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_scrape_processes_every_row() -> Result<()> {
        let scraper = GlobalStatusScraper::new()?;
        let source = source(Canned::Rows(vec![
            ("Com_insert", "1"),
            ("Com_update", "2"),
            ("Com_delete", "3"),
        ]));
        let mut sink = MetricSink::new();

        scraper
            .scrape(&ScrapeScope::unbounded(), &source, &mut sink)
            .await?;

        let labels: Vec<&str> = sink
            .metrics()
            .iter()
            .map(|m| m.label_values[0].as_str())
            .collect();
        assert_eq!(labels, vec!["insert", "update", "delete"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_scrape_skips_non_utf8_value() -> Result<()> {
        let scraper = GlobalStatusScraper::new()?;
        const INVALID_UTF8: &[u8] = &[0xff, 0xfe];
        let source = source(Canned::Bytes(vec![
            ("Com_select", &b"7"[..]),
            ("Rpl_semi_sync_master_status", INVALID_UTF8),
            ("Com_update", &b"9"[..]),
        ]));
        let mut sink = MetricSink::new();

        scraper
            .scrape(&ScrapeScope::unbounded(), &source, &mut sink)
            .await?;

        let labels: Vec<&str> = sink
            .metrics()
            .iter()
            .map(|m| m.label_values[0].as_str())
            .collect();
        assert_eq!(labels, vec!["select", "update"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_scrape_query_error() {
        let scraper = GlobalStatusScraper::new().unwrap();
        let source = source(Canned::Error);
        let mut sink = MetricSink::new();

        let result = scraper
            .scrape(&ScrapeScope::unbounded(), &source, &mut sink)
            .await;

        assert!(matches!(result, Err(ScrapeError::Query(_))));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_scrape_keeps_rows_before_failure() {
        let scraper = GlobalStatusScraper::new().unwrap();
        let source = source(Canned::RowsThenError(vec![("Com_select", "1")]));
        let mut sink = MetricSink::new();

        let result = scraper
            .scrape(&ScrapeScope::unbounded(), &source, &mut sink)
            .await;

        assert!(result.is_err());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_observes_deadline() {
        let scraper = GlobalStatusScraper::new().unwrap();
        let source = source(Canned::Hang);
        let mut sink = MetricSink::new();
        let scope = ScrapeScope::with_budget(Duration::from_millis(250));

        let result = scraper.scrape(&scope, &source, &mut sink).await;

        assert!(matches!(result, Err(ScrapeError::DeadlineExceeded)));
    }
}
