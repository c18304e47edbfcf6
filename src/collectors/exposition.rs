//! Text exposition of gathered metric families.
//!
//! `prometheus::TextEncoder` does not write untyped families, so those are
//! rendered here in the same text format and everything else goes through
//! the encoder. Family order is preserved.

use prometheus::proto::{LabelPair, MetricFamily, MetricType};
use prometheus::{Result, TextEncoder};
use std::borrow::Cow;
use std::fmt::Write as _;

/// Renders `families` in the Prometheus text format.
///
/// # Errors
///
/// Fails like [`TextEncoder::encode_utf8`] does, for a family without a name
/// or without samples.
pub fn encode_text(families: &[MetricFamily]) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut out = String::new();

    for family in families {
        if family.type_() == MetricType::UNTYPED {
            write_untyped(family, &mut out)?;
        } else {
            encoder.encode_utf8(std::slice::from_ref(family), &mut out)?;
        }
    }

    Ok(out)
}

fn write_untyped(family: &MetricFamily, out: &mut String) -> Result<()> {
    let name = family.name();
    if name.is_empty() || family.metric.is_empty() {
        return Err(prometheus::Error::Msg(format!(
            "untyped family {name:?} has no name or no samples"
        )));
    }

    let help = family.help();
    if !help.is_empty() {
        push_line(out, format_args!("# HELP {name} {}", escape(help, false)));
    }
    push_line(out, format_args!("# TYPE {name} untyped"));

    for metric in &family.metric {
        out.push_str(name);
        write_labels(&metric.label, out);
        out.push(' ');
        out.push_str(&metric.untyped.value().to_string());

        let timestamp = metric.timestamp_ms();
        if timestamp != 0 {
            out.push(' ');
            out.push_str(&timestamp.to_string());
        }
        out.push('\n');
    }

    Ok(())
}

fn push_line(out: &mut String, line: std::fmt::Arguments<'_>) {
    // writing into a String cannot fail
    let _ = out.write_fmt(line);
    out.push('\n');
}

fn write_labels(labels: &[LabelPair], out: &mut String) {
    let mut separator = '{';
    for pair in labels {
        out.push(separator);
        out.push_str(pair.name());
        out.push_str("=\"");
        out.push_str(&escape(pair.value(), true));
        out.push('"');
        separator = ',';
    }

    if !labels.is_empty() {
        out.push('}');
    }
}

fn escape(value: &str, quotes: bool) -> Cow<'_, str> {
    let needs_escape = |c: char| c == '\\' || c == '\n' || (quotes && c == '"');
    if !value.contains(needs_escape) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '"' if quotes => escaped.push_str("\\\""),
            _ => escaped.push(c),
        }
    }

    Cow::Owned(escaped)
}
