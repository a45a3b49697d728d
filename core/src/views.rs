//! Read-only projections of the record collection: the trend chart, summary
//! statistics, and the history search. Everything here is recomputed from the
//! current records on each call.

use chrono::{DateTime, TimeZone};

use crate::models::{Category, ChartPoint, GlucoseRange, Overview, Record, SummaryStats};

/// How many of the most recent records the chart shows.
pub const CHART_WINDOW: usize = 15;

/// Guide lines on the mg/dL scale.
pub const LOW_THRESHOLD_MG_DL: f64 = 70.0;
pub const HIGH_THRESHOLD_MG_DL: f64 = 180.0;

#[must_use]
pub fn classify(reference_value: f64) -> GlucoseRange {
    if reference_value < LOW_THRESHOLD_MG_DL {
        GlucoseRange::Low
    } else if reference_value > HIGH_THRESHOLD_MG_DL {
        GlucoseRange::High
    } else {
        GlucoseRange::InRange
    }
}

/// Last `CHART_WINDOW` records in chronological order, values on the mg/dL scale.
pub fn chart_series<Tz>(records: &[Record], tz: &Tz) -> Vec<ChartPoint>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);
    let skip = sorted.len().saturating_sub(CHART_WINDOW);

    sorted
        .into_iter()
        .skip(skip)
        .map(|r| {
            let value = r.reference_value();
            ChartPoint {
                id: r.id.clone(),
                timestamp: r.timestamp,
                label: chart_label(r.timestamp, tz),
                value,
                original_value: r.value,
                original_unit: r.unit,
                category: r.category,
                range: classify(value),
            }
        })
        .collect()
}

/// Count, mean, max and min over every record, on the mg/dL scale.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summary_stats(records: &[Record]) -> SummaryStats {
    if records.is_empty() {
        return SummaryStats::default();
    }

    let normalized: Vec<f64> = records.iter().map(Record::reference_value).collect();
    let sum: f64 = normalized.iter().sum();
    let avg = sum / normalized.len() as f64;
    let high = normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = normalized.iter().copied().fold(f64::INFINITY, f64::min);

    SummaryStats {
        avg: avg.round() as i64,
        high: high.round() as i64,
        low: low.round() as i64,
        count: records.len(),
    }
}

pub fn overview<Tz>(records: &[Record], tz: &Tz) -> Overview
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    Overview {
        stats: summary_stats(records),
        chart: chart_series(records, tz),
    }
}

/// History search, newest first.
///
/// A record matches when its category equals `category` (if given) and the
/// query is either a case-sensitive substring of its date label or a
/// case-insensitive substring of its notes. An empty query matches every date.
pub fn search<Tz>(
    records: &[Record],
    query: &str,
    category: Option<Category>,
    tz: &Tz,
) -> Vec<Record>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let needle = query.to_lowercase();
    let mut hits: Vec<Record> = records
        .iter()
        .filter(|r| category.is_none_or(|c| r.category == c))
        .filter(|r| {
            date_label(r.timestamp, tz).contains(query)
                || (!r.notes.is_empty() && r.notes.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();
    hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    hits
}

fn at<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.timestamp_millis_opt(timestamp_ms).single()
}

/// Short date, e.g. "3/7/2024".
pub fn date_label<Tz>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at(timestamp_ms, tz).map_or_else(
        || "Invalid Date".to_string(),
        |dt| dt.format("%-m/%-d/%Y").to_string(),
    )
}

/// Date and time, e.g. "3/7/2024, 8:05:00 AM".
pub fn datetime_label<Tz>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at(timestamp_ms, tz).map_or_else(
        || "Invalid Date".to_string(),
        |dt| dt.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
    )
}

/// Chart axis label, e.g. "Mar 7, 08:05".
pub fn chart_label<Tz>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at(timestamp_ms, tz).map_or_else(
        || "Invalid Date".to_string(),
        |dt| dt.format("%b %-d, %H:%M").to_string(),
    )
}
