//! Prometheus text exposition lines, as accepted by VictoriaMetrics'
//! `/api/v1/import/prometheus` endpoint.
//!
//! One point renders as `name{k1="v1", k2="v2"} value timestamp_ms`. The
//! label block is omitted when there are no labels. A body is the points
//! joined by `\n` with no trailing newline.

use std::fmt::Write as _;

use halflife_types::ExportPoint;

/// Render a single point.
pub fn format_point(point: &ExportPoint) -> String {
    let mut line = point.metric_name.clone();

    if !point.labels.is_empty() {
        line.push('{');
        for (i, (key, value)) in point.labels.iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            line.push_str(key);
            line.push('=');
            line.push_str(&quote(value));
        }
        line.push('}');
    }

    let _ = write!(line, " {} {}", format_value(point.value), point.timestamp_ms);
    line
}

/// Render a request body from `points`.
pub fn format_body(points: &[ExportPoint]) -> String {
    points
        .iter()
        .map(format_point)
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON string quoting: wraps in `"` and escapes quotes, backslashes, and
/// control characters.
fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// Shortest round-trip decimal, with Prometheus spellings for the
/// non-finite values.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        let sign = if value.is_sign_positive() { '+' } else { '-' };
        format!("{sign}Inf")
    } else {
        value.to_string()
    }
}
