use std::{collections::HashMap, fmt::Write};

use chrono::{Duration, NaiveDate};

use crate::{
    storage::entities::TimeInterval,
    utils::time::{format_clock, format_duration},
};

#[derive(Debug, PartialEq, Eq)]
pub struct ActivityTotal {
    pub label: String,
    pub duration: Duration,
}

/// Sums closed intervals per label, longest first. Open intervals have no length yet and are left
/// out.
pub fn summarize(intervals: &[TimeInterval]) -> Vec<ActivityTotal> {
    let mut map = HashMap::<&str, Duration>::new();
    for interval in intervals {
        if let Some(duration) = interval.duration() {
            *map.entry(interval.label.as_str()).or_insert_with(Duration::zero) += duration;
        }
    }

    let mut totals = map
        .into_iter()
        .map(|(label, duration)| ActivityTotal {
            label: label.to_string(),
            duration,
        })
        .collect::<Vec<_>>();
    totals.sort_by(|a, b| b.duration.cmp(&a.duration).then_with(|| a.label.cmp(&b.label)));
    totals
}

/// The listing printed by `log` and after reconciliation: every interval of the day followed by
/// per-activity totals.
pub fn render_day_report(day: NaiveDate, intervals: &[TimeInterval]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Activities for {day}:");
    for interval in intervals {
        let end = interval
            .end
            .map(format_clock)
            .unwrap_or_else(|| "...".to_string());
        let _ = writeln!(
            out,
            "{:<20}: {} - {}",
            interval.label,
            format_clock(interval.start),
            end
        );
    }

    let _ = writeln!(out, "\nTotal duration for each activity:");
    for total in summarize(intervals) {
        let _ = writeln!(out, "{:<20}: {}", total.label, format_duration(total.duration));
    }
    out.push('\n');
    out
}
