use super::ExporterMetrics;
use std::time::Instant;

/// Times one scraper run.
///
/// Call [`ScrapeTimer::finish`] with the outcome. A timer dropped without
/// finishing (the request was cancelled) still records its duration, but
/// counts as an error.
pub struct ScrapeTimer {
    collector: &'static str,
    start: Instant,
    metrics: ExporterMetrics,
    finished: bool,
}

impl ScrapeTimer {
    pub(super) fn new(collector: &'static str, metrics: ExporterMetrics) -> Self {
        Self {
            collector,
            start: Instant::now(),
            metrics,
            finished: false,
        }
    }

    pub fn finish(mut self, ok: bool) {
        self.finished = true;
        self.metrics
            .record(self.collector, self.start.elapsed().as_secs_f64(), ok);
    }
}

impl Drop for ScrapeTimer {
    fn drop(&mut self) {
        if !self.finished {
            self.metrics
                .record(self.collector, self.start.elapsed().as_secs_f64(), false);
        }
    }
}
