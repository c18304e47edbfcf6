//! Per-request aggregate of the selected scrapers.
//!
//! A [`RequestRegistry`] is built for every HTTP request and dropped with it.
//! Running it yields a [`ScrapeResults`] that satisfies the `prometheus`
//! crate's two-phase collector contract, so it can be registered in a fresh
//! `prometheus::Registry` and gathered like any other collector.

use crate::collectors::{
    MetricSink, Scraper, ScraperType,
    classifier::{ClassifiedMetric, MetricKind},
    exporter::ExporterMetrics,
    scope::ScrapeScope,
    source::StatusSource,
};
use prometheus::core::{Collector, Desc};
use prometheus::proto::{LabelPair, Metric, MetricFamily};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct RequestRegistry {
    scrapers: Vec<Arc<ScraperType>>,
}

impl RequestRegistry {
    /// Assembles the registry. A scraper whose name is already taken is
    /// skipped with a warning, since two of them would share a namespace.
    #[must_use]
    pub fn new(scrapers: Vec<Arc<ScraperType>>) -> Self {
        let mut seen = HashSet::new();
        let scrapers = scrapers
            .into_iter()
            .filter(|s| {
                let fresh = seen.insert(s.name());
                if !fresh {
                    warn!(scraper = s.name(), "skipping duplicate scraper");
                }
                fresh
            })
            .collect();

        Self { scrapers }
    }

    #[must_use]
    pub fn scraper_names(&self) -> Vec<&'static str> {
        self.scrapers.iter().map(|s| s.name()).collect()
    }

    /// Describe phase: every fixed descriptor the scrapers may emit.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Arc<Desc>> {
        self.scrapers.iter().flat_map(|s| s.descriptors()).collect()
    }

    /// Collect phase: runs every scraper in turn under the shared scope.
    ///
    /// A failing scraper is logged and counted; it never stops the others,
    /// and whatever it pushed before failing is kept. When the server does
    /// not answer a ping no scraper runs at all.
    #[instrument(skip_all, level = "info", fields(scrapers = self.scrapers.len()))]
    pub async fn collect(
        &self,
        source: &dyn StatusSource,
        scope: &ScrapeScope,
        exporter: &ExporterMetrics,
    ) -> ScrapeResults {
        exporter.begin_request();
        let mut sink = MetricSink::new();

        let up = match scope.bound(source.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "error pinging mysqld");
                false
            }
            Err(e) => {
                warn!(error = %e, "ping did not finish before the scrape deadline");
                false
            }
        };
        exporter.set_up(up);

        let mut failed = !up;
        if up {
            for scraper in &self.scrapers {
                let timer = exporter.start_scrape(scraper.name());
                match scraper.scrape(scope, source, &mut sink).await {
                    Ok(()) => {
                        debug!(scraper = scraper.name(), "scrape finished");
                        timer.finish(true);
                    }
                    Err(e) => {
                        warn!(scraper = scraper.name(), error = %e, "error from scraper");
                        timer.finish(false);
                        failed = true;
                    }
                }
            }
        }
        exporter.set_last_scrape_error(failed);

        ScrapeResults {
            descriptors: self.descriptors(),
            metrics: sink.into_inner(),
        }
    }
}

/// Everything one request produced, ready to be gathered.
#[derive(Debug, Default)]
pub struct ScrapeResults {
    descriptors: Vec<Arc<Desc>>,
    metrics: Vec<ClassifiedMetric>,
}

#[cfg(test)]
impl ScrapeResults {
    pub(crate) fn metrics(&self) -> &[ClassifiedMetric] {
        &self.metrics
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Collector for ScrapeResults {
    fn desc(&self) -> Vec<&Desc> {
        self.descriptors.iter().map(AsRef::as_ref).collect()
    }

    /// Groups samples into families, keeping the order in which families
    /// were first seen.
    fn collect(&self) -> Vec<MetricFamily> {
        let mut families: Vec<MetricFamily> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for sample in &self.metrics {
            let name = sample.desc.fq_name.as_str();
            let slot = *index.entry(name).or_insert_with(|| {
                let mut family = MetricFamily::new();
                family.set_name(sample.desc.fq_name.clone());
                family.set_help(sample.desc.help.clone());
                family.set_type(sample.kind.metric_type());
                families.push(family);
                families.len() - 1
            });

            if let Some(family) = families.get_mut(slot) {
                family.metric.push(to_proto(sample));
            }
        }

        families
    }
}

fn to_proto(sample: &ClassifiedMetric) -> Metric {
    let mut metric = Metric::new();

    metric.label = sample
        .desc
        .const_label_pairs
        .iter()
        .cloned()
        .chain(
            sample
                .desc
                .variable_labels
                .iter()
                .zip(&sample.label_values)
                .map(|(name, value)| {
                    let mut pair = LabelPair::new();
                    pair.set_name(name.clone());
                    pair.set_value(value.clone());
                    pair
                }),
        )
        .collect();

    match sample.kind {
        MetricKind::Counter => {
            metric.counter.mut_or_insert_default().set_value(sample.value);
        }
        MetricKind::Untyped => {
            metric.untyped.mut_or_insert_default().set_value(sample.value);
        }
    }

    metric
}
