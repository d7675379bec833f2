use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate};
use chrono_english::{parse_date_string, Dialect};
use clap::CommandFactory;
use now::DateTimeNow;

use super::Args;

/// Resolves the `DAY` argument of the day based commands. Missing means today, a non-negative
/// integer counts days back from today, anything else is read as a date such as `yesterday` or
/// `15/03/2025` (day/month/year).
pub fn parse_day(input: Option<&str>, now: DateTime<Local>) -> Result<NaiveDate> {
    let Some(input) = input.map(str::trim) else {
        return Ok(now.date_naive());
    };

    if let Ok(offset) = input.parse::<i64>() {
        if offset < 0 {
            return Err(validation_error(format!(
                "Day offset must not be negative, got {offset}"
            )));
        }
        return Ok((now.beginning_of_day() - Duration::days(offset)).date_naive());
    }

    match parse_date_string(input, now, Dialect::Uk) {
        Ok(date) => Ok(date.date_naive()),
        Err(e) => Err(validation_error(format!("Failed to parse day '{input}': {e}"))),
    }
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}
