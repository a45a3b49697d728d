use anyhow::Result;
use chrono::TimeZone;
use tracing::warn;

use crate::models::Record;
use crate::views::datetime_label;

/// Fewer records than this and no request is made.
pub const MIN_RECORDS: usize = 3;
/// At most this many of the most recent records go into the prompt.
pub const RECORD_LIMIT: usize = 20;

pub const NOT_ENOUGH_DATA: &str =
    "Not enough data. Please add at least 3 records to generate insights.";
pub const UNAVAILABLE: &str =
    "Unable to generate analysis. Please ensure the API service is available.";
pub const EMPTY_RESPONSE: &str = "No analysis generated.";

/// One bullet per record, newest first, capped at `RECORD_LIMIT`.
pub fn format_records<Tz>(records: &[Record], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut recent: Vec<&Record> = records.iter().collect();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    recent
        .into_iter()
        .take(RECORD_LIMIT)
        .map(|r| {
            let when = datetime_label(r.timestamp, tz);
            let mut line = format!("- {when}: {} {} ({})", r.value, r.unit, r.category);
            if !r.notes.is_empty() {
                line.push_str(" Note: ");
                line.push_str(&r.notes);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt<Tz>(records: &[Record], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let data = format_records(records, tz);
    format!(
        "You are a helpful medical assistant AI. Analyze the following blood sugar logs.

Data:
{data}

Please provide:
1. A brief summary of trends (e.g., high mornings, stable post-meals).
2. Any specific outliers based on the time categories.
3. Three non-medical lifestyle tips that might help based on these specific patterns.

Disclaimer: Start your response with \"I am an AI, not a doctor. Please consult a medical professional.\"
Keep the tone encouraging and professional.
"
    )
}

/// The prompt to send, or the message to show instead when there is too
/// little data to ask.
pub fn prepare<Tz>(records: &[Record], tz: &Tz) -> Result<String, &'static str>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if records.len() < MIN_RECORDS {
        return Err(NOT_ENOUGH_DATA);
    }
    Ok(build_prompt(records, tz))
}

/// Turn the collaborator's answer into the text shown to the user.
pub fn resolve(response: Result<String>) -> String {
    match response {
        Ok(text) if text.trim().is_empty() => EMPTY_RESPONSE.to_string(),
        Ok(text) => text,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "insight request failed");
            UNAVAILABLE.to_string()
        }
    }
}
