//! Turns raw status rows into typed metrics.
//!
//! Known counter families (`Com_*`, `Handler_*`, ...) are matched by a single
//! prefix regex and land on a fixed, labelled descriptor. Every other numeric
//! status variable falls through to an untyped metric named after the
//! variable itself, so new server versions need no code changes.

use crate::collectors::source::StatusRow;
use anyhow::Result;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use prometheus::core::Desc;
use prometheus::proto::MetricType;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Metric namespace shared by everything this exporter emits.
pub const NAMESPACE: &str = "mysql";

/// Descriptors for ad-hoc (unmatched) status variables, keyed by fully
/// qualified name. Lives for the whole process: registering a second,
/// identical descriptor for the same name would be rejected by the registry.
static DYNAMIC_DESCRIPTORS: Lazy<Mutex<HashMap<String, Arc<Desc>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Untyped,
}

impl MetricKind {
    #[must_use]
    pub const fn metric_type(self) -> MetricType {
        match self {
            Self::Counter => MetricType::COUNTER,
            Self::Untyped => MetricType::UNTYPED,
        }
    }
}

/// One typed family recognised by its key prefix.
#[derive(Clone, Copy, Debug)]
pub struct ClassificationRule {
    pub prefix: &'static str,
    pub kind: MetricKind,
    /// Family name below the scraper subsystem, e.g. `commands_total`.
    pub family: &'static str,
    pub label: &'static str,
    pub help: &'static str,
}

/// A single sample ready for exposition.
#[derive(Clone, Debug)]
pub struct ClassifiedMetric {
    pub desc: Arc<Desc>,
    pub kind: MetricKind,
    pub value: f64,
    pub label_values: Vec<String>,
}

/// What a status row turned into.
#[derive(Debug)]
pub enum Classification {
    Metric(ClassifiedMetric),
    /// A known textual variable, kept as context only.
    Text { key: String, value: String },
    Dropped,
}

#[derive(Clone, Debug)]
struct Family {
    desc: Arc<Desc>,
    kind: MetricKind,
}

/// Classifier bound to one scraper subsystem.
#[derive(Clone, Debug)]
pub struct StatusClassifier {
    subsystem: &'static str,
    generic_help: &'static str,
    pattern: Option<Regex>,
    families: HashMap<&'static str, Family>,
    text_keys: &'static [&'static str],
}

impl StatusClassifier {
    /// Builds the classifier and the fixed descriptors of every rule.
    ///
    /// Rules are combined into one `^(p1|p2|...)_(.*)$` pattern; prefixes must
    /// be disjoint so that at most one family matches a key.
    pub fn new(
        subsystem: &'static str,
        rules: &[ClassificationRule],
        text_keys: &'static [&'static str],
        generic_help: &'static str,
    ) -> Result<Self> {
        let pattern = if rules.is_empty() {
            None
        } else {
            let alternatives = rules
                .iter()
                .map(|rule| regex::escape(rule.prefix))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!("^({alternatives})_(.*)$"))?)
        };

        let mut families = HashMap::with_capacity(rules.len());
        for rule in rules {
            let desc = Desc::new(
                fq_name(subsystem, rule.family),
                rule.help.to_string(),
                vec![rule.label.to_string()],
                HashMap::new(),
            )?;
            families.insert(
                rule.prefix,
                Family {
                    desc: Arc::new(desc),
                    kind: rule.kind,
                },
            );
        }

        Ok(Self {
            subsystem,
            generic_help,
            pattern,
            families,
            text_keys,
        })
    }

    /// Fixed descriptors, one per rule.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Arc<Desc>> {
        self.families.values().map(|f| Arc::clone(&f.desc)).collect()
    }

    /// Classifies an already parsed value.
    pub fn classify(&self, key: &str, value: f64) -> Option<ClassifiedMetric> {
        let key = sanitize_name(key);

        if let Some(captures) = self.pattern.as_ref().and_then(|re| re.captures(&key))
            && let (Some(prefix), Some(suffix)) = (captures.get(1), captures.get(2))
            && let Some(family) = self.families.get(prefix.as_str())
        {
            return Some(ClassifiedMetric {
                desc: Arc::clone(&family.desc),
                kind: family.kind,
                value,
                label_values: vec![suffix.as_str().to_string()],
            });
        }

        let desc = generic_descriptor(&fq_name(self.subsystem, &key), self.generic_help)?;
        Some(ClassifiedMetric {
            desc,
            kind: MetricKind::Untyped,
            value,
            label_values: Vec::new(),
        })
    }

    /// Classifies a raw row: numeric values become metrics, known textual
    /// variables become context, anything else is dropped.
    pub fn classify_row(&self, row: &StatusRow) -> Classification {
        let key = sanitize_name(&row.key);

        if let Some(value) = parse_status(&row.raw_value) {
            return self
                .classify(&key, value)
                .map_or(Classification::Dropped, Classification::Metric);
        }

        if self.text_keys.contains(&key.as_str()) {
            return Classification::Text {
                key,
                value: String::from_utf8_lossy(&row.raw_value).into_owned(),
            };
        }

        trace!(key = %key, "dropping non-numeric status value");
        Classification::Dropped
    }
}

fn fq_name(subsystem: &str, name: &str) -> String {
    format!("{NAMESPACE}_{subsystem}_{name}")
}

/// Looks up or lazily creates the process-wide descriptor for `fq_name`.
fn generic_descriptor(fq_name: &str, help: &str) -> Option<Arc<Desc>> {
    let mut cache = match DYNAMIC_DESCRIPTORS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(desc) = cache.get(fq_name) {
        return Some(Arc::clone(desc));
    }

    match Desc::new(fq_name.to_string(), help.to_string(), Vec::new(), HashMap::new()) {
        Ok(desc) => {
            let desc = Arc::new(desc);
            cache.insert(fq_name.to_string(), Arc::clone(&desc));
            Some(desc)
        }
        Err(e) => {
            debug!(metric = %fq_name, error = %e, "skipping status variable with unusable name");
            None
        }
    }
}

/// Lower-cases `name` and collapses every run of characters outside
/// `[a-z0-9_]` into a single underscore.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }

    out
}

/// Parses a raw status value into a number.
///
/// Besides plain floats this understands the switch-like words MySQL uses
/// (`ON`, `OFF`, `Primary`, ...) and the two timestamp layouts found in
/// status output, which become unix seconds.
#[must_use]
pub fn parse_status(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?.trim();

    match text.to_ascii_lowercase().as_str() {
        "yes" | "on" | "primary" => return Some(1.0),
        "no" | "off" | "disabled" | "connecting" | "non-primary" | "disconnected" => {
            return Some(0.0);
        }
        _ => {}
    }

    // e.g. Ssl_server_not_after: "Apr 26 10:15:18 2031 GMT"
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%b %d %H:%M:%S %Y %Z") {
        #[allow(clippy::cast_precision_loss)]
        return Some(ts.and_utc().timestamp() as f64);
    }

    if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        #[allow(clippy::cast_precision_loss)]
        return Some(ts.and_utc().timestamp() as f64);
    }

    text.parse::<f64>().ok()
}
