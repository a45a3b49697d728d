use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use sugartrack_core::models::Record;
use sugartrack_core::units::{format_value, secondary_display};
use sugartrack_core::views::datetime_label;

/// Parse a user-supplied reading time into epoch milliseconds, defaulting to now.
/// Accepts "YYYY-MM-DD HH:MM", "YYYY-MM-DDTHH:MM", RFC 3339, or a bare date
/// (midnight). Naive forms are read in local time.
pub(crate) fn parse_timestamp(at: Option<&str>) -> Result<i64> {
    match at {
        None => Ok(Utc::now().timestamp_millis()),
        Some(s) => parse_timestamp_in(s, &Local),
    }
}

pub(crate) fn parse_timestamp_in<Tz: TimeZone>(s: &str, tz: &Tz) -> Result<i64> {
    let s = s.trim();
    if s == "now" {
        return Ok(Utc::now().timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }

    let naive = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });

    let Some(naive) = naive else {
        bail!("Invalid time '{s}'. Use 'YYYY-MM-DD HH:MM', 'YYYY-MM-DD' or RFC 3339");
    };

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .with_context(|| format!("Time '{s}' does not exist in the local time zone"))
}

pub(crate) fn print_records_table(records: &[Record]) {
    #[derive(Tabled)]
    struct RecordRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "When")]
        when: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Alt")]
        alt: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<RecordRow> = records
        .iter()
        .map(|r| RecordRow {
            id: short_id(&r.id).to_string(),
            when: datetime_label(r.timestamp, &Local),
            value: format_value(r.value, r.unit),
            alt: secondary_display(r.value, r.unit),
            category: r.category.to_string(),
            notes: truncate(&r.notes, 30),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Leading segment of a UUID, enough to pick a record out of a listing.
pub(crate) fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

/// Resolve a full id from either the full id or a unique short prefix.
/// A blank id matches nothing.
pub(crate) fn resolve_id<'a>(records: &'a [Record], id: &str) -> Result<Option<&'a Record>> {
    let id = id.trim();
    if id.is_empty() {
        return Ok(None);
    }
    if let Some(r) = records.iter().find(|r| r.id == id) {
        return Ok(Some(r));
    }
    let mut matches = records.iter().filter(|r| r.id.starts_with(id));
    let first = matches.next();
    if first.is_some() && matches.next().is_some() {
        bail!("Id prefix '{id}' matches more than one record");
    }
    Ok(first)
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
