use crate::collectors::{
    classifier::ClassifiedMetric, scope::ScrapeScope, source::StatusSource,
};
use anyhow::Result;
use prometheus::core::Desc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[macro_use]
mod register_macro;

/// Errors a single scraper can hit. They never escape the request registry.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("scrape deadline exceeded")]
    DeadlineExceeded,
}

/// Collects the metrics produced during one request.
///
/// Metrics pushed before a scraper fails stay in the sink and are exposed.
#[derive(Debug, Default)]
pub struct MetricSink {
    metrics: Vec<ClassifiedMetric>,
}

impl MetricSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metric: ClassifiedMetric) {
        self.metrics.push(metric);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.metrics.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &[ClassifiedMetric] {
        &self.metrics
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<ClassifiedMetric> {
        self.metrics
    }
}

pub trait Scraper {
    /// Unique name, used as metric subsystem and as `collect[]` token.
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str;

    /// Minimum server version the query is valid for. Informational only,
    /// it is not checked against the live server.
    fn version(&self) -> f64;

    fn enabled_by_default(&self) -> bool;

    /// Fixed descriptors this scraper may emit. Ad-hoc untyped metrics are
    /// not known ahead of time and are not listed.
    fn descriptors(&self) -> Vec<Arc<Desc>>;

    /// Runs exactly one query against `source` and pushes every classified
    /// row onto `sink`. The source is borrowed: a scraper never closes it.
    fn scrape(
        &self,
        scope: &ScrapeScope,
        source: &dyn StatusSource,
        sink: &mut MetricSink,
    ) -> impl std::future::Future<Output = Result<(), ScrapeError>> + Send;
}

// Every scraper is declared here; the module name is the scraper name.
register_scrapers! {
    global_status => GlobalStatusScraper,
    global_variables => GlobalVariablesScraper,
}

pub mod classifier;
pub mod config;
pub mod exporter;
pub mod exposition;
pub mod registry;
pub mod scope;
pub mod source;
