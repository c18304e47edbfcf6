use crate::collectors::{
    MetricSink, ScrapeError, Scraper,
    classifier::{Classification, StatusClassifier},
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

const GLOBAL_VARIABLES_QUERY: &str = "SHOW GLOBAL VARIABLES";

const GLOBAL_VARIABLES: &str = "global_variables";

const TEXT_KEYS: &[&str] = &[
    "innodb_version",
    "transaction_isolation",
    "tx_isolation",
    "version",
    "version_comment",
    "wsrep_cluster_name",
    "wsrep_provider_options",
];

/// Scrapes `SHOW GLOBAL VARIABLES`. Variables have no typed families, every
/// numeric one is exported as an untyped gauge-like value.
#[derive(Clone, Debug)]
pub struct GlobalVariablesScraper {
    classifier: StatusClassifier,
}

impl GlobalVariablesScraper {
    pub fn new() -> Result<Self> {
        Ok(Self {
            classifier: StatusClassifier::new(
                GLOBAL_VARIABLES,
                &[],
                TEXT_KEYS,
                "Generic gauge metric from SHOW GLOBAL VARIABLES.",
            )?,
        })
    }
}

impl Scraper for GlobalVariablesScraper {
    fn name(&self) -> &'static str {
        GLOBAL_VARIABLES
    }

    fn help(&self) -> &'static str {
        "Collect from SHOW GLOBAL VARIABLES"
    }

    fn version(&self) -> f64 {
        5.1
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
        fields(scraper = GLOBAL_VARIABLES, otel.kind = "internal")
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
            db.statement = GLOBAL_VARIABLES_QUERY
        );

        let mut rows = source.query_rows(GLOBAL_VARIABLES_QUERY);
        let mut text = BTreeMap::new();

        while let Some(row) = scope
            .bound(rows.next())
            .instrument(query_span.clone())
            .await?
        {
            match self.classifier.classify_row(&row?) {
                Classification::Metric(metric) => sink.push(metric),
                Classification::Text { key, value } => {
                    text.insert(key, value);
                }
                Classification::Dropped => {}
            }
        }

        if let Some(version) = text.get("version") {
            debug!(version = %version, "server version");
        }

        Ok(())
    }
}
