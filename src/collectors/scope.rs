//! Deadline negotiation for one scrape request.
//!
//! Prometheus announces its own scrape timeout in the
//! `X-Prometheus-Scrape-Timeout-Seconds` header. We shave a configured
//! offset off it so the response still has time to travel back, and every
//! scraper of the request races against the same deadline.

use crate::collectors::ScrapeError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::warn;

pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

/// Computes the time budget for a request.
///
/// Returns `None` when no deadline should be imposed: either no hint was
/// sent or it could not be parsed. When the offset would eat the whole
/// budget it is ignored and the raw hint is used.
#[must_use]
pub fn negotiate_budget(hint: Option<&str>, offset: f64) -> Option<Duration> {
    let hint = hint?;

    let seconds = match hint.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v,
        Ok(v) => {
            warn!(hint = %hint, value = v, "ignoring out of range scrape timeout header");
            return None;
        }
        Err(e) => {
            warn!(hint = %hint, error = %e, "failed to parse timeout from Prometheus header");
            return None;
        }
    };

    let budget = if offset >= seconds {
        warn!(
            offset,
            timeout = seconds,
            "timeout offset should be lower than prometheus scrape timeout"
        );
        seconds
    } else {
        seconds - offset
    };

    Duration::try_from_secs_f64(budget).ok()
}

/// Cancellable execution scope shared by all scrapers of a request.
///
/// Cancellation is cooperative: work is raced against the deadline with
/// [`ScrapeScope::bound`], and whatever was produced before expiry stays
/// valid. A client disconnect drops the whole request future, which cancels
/// the scope as well.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScrapeScope {
    deadline: Option<Instant>,
}

impl ScrapeScope {
    /// A scope without an induced deadline.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { deadline: None }
    }

    #[must_use]
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(budget),
        }
    }

    #[must_use]
    pub fn from_budget(budget: Option<Duration>) -> Self {
        budget.map_or_else(Self::unbounded, Self::with_budget)
    }

    #[cfg(test)]
    pub(crate) const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Awaits `fut` unless the deadline passes first. Once the scope has
    /// expired nothing is polled any more.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, ScrapeError> {
        if self.is_expired() {
            return Err(ScrapeError::DeadlineExceeded);
        }

        match self.deadline {
            Some(deadline) => timeout_at(deadline, fut)
                .await
                .map_err(|_| ScrapeError::DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Duration, b: f64) -> bool {
        (a.as_secs_f64() - b).abs() < 1e-9
    }

    #[test]
    fn test_no_hint_no_budget() {
        assert_eq!(negotiate_budget(None, 0.25), None);
    }

    #[test]
    fn test_offset_subtracted() {
        let budget = negotiate_budget(Some("5"), 0.25).unwrap();
        assert!(approx(budget, 4.75));
    }

    #[test]
    fn test_offset_ignored_when_too_large() {
        let budget = negotiate_budget(Some("0.1"), 0.25).unwrap();
        assert!(approx(budget, 0.1));

        // equal offset is ignored too, never a zero budget from subtraction
        let budget = negotiate_budget(Some("0.25"), 0.25).unwrap();
        assert!(approx(budget, 0.25));
    }

    #[test]
    fn test_malformed_hint_ignored() {
        assert_eq!(negotiate_budget(Some("soon"), 0.25), None);
        assert_eq!(negotiate_budget(Some(""), 0.25), None);
        assert_eq!(negotiate_budget(Some("NaN"), 0.25), None);
        assert_eq!(negotiate_budget(Some("-3"), 0.25), None);
        assert_eq!(negotiate_budget(Some("inf"), 0.25), None);
    }

    #[test]
    fn test_hint_whitespace_tolerated() {
        let budget = negotiate_budget(Some(" 10 "), 0.5).unwrap();
        assert!(approx(budget, 9.5));
    }

    #[tokio::test]
    async fn test_unbounded_scope_never_expires() {
        let scope = ScrapeScope::unbounded();
        assert!(scope.deadline().is_none());
        assert!(!scope.is_expired());
        assert_eq!(scope.bound(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_times_out() {
        let scope = ScrapeScope::with_budget(Duration::from_millis(100));
        let result = scope.bound(futures::future::pending::<()>()).await;

        assert!(matches!(result, Err(ScrapeError::DeadlineExceeded)));
        assert!(scope.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_completes_within_budget() {
        let scope = ScrapeScope::from_budget(Some(Duration::from_secs(1)));
        let result = scope
            .bound(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                "done"
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert!(!scope.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_scope_rejects_ready_work() {
        let scope = ScrapeScope::with_budget(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = scope.bound(async { 1 }).await;
        assert!(matches!(result, Err(ScrapeError::DeadlineExceeded)));
    }
}
