use std::{collections::BTreeMap, fmt::Write};

use chrono::{Duration, NaiveDate};

use crate::{
    storage::entities::{SessionEntry, TaskTotal},
    utils::time::{date_to_record_name, format_duration, STORAGE_FORMAT},
};

/// Output of `total`.
pub fn render_totals(totals: &[TaskTotal]) -> String {
    let mut out = String::new();
    for total in totals {
        let _ = writeln!(
            out,
            "{:<10}: {}",
            total.task_name,
            format_duration(total.duration)
        );
    }
    out
}

/// Output of `sessions`: every logged session of the day followed by the focus time per start
/// date.
pub fn render_sessions(day: NaiveDate, sessions: &[SessionEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Sessions for {day}:");
    for session in sessions {
        let _ = writeln!(
            out,
            "{:<10}: {} - {}, {}",
            session.task_name,
            session.start.format(STORAGE_FORMAT),
            session.end.format(STORAGE_FORMAT),
            format_duration(session.duration())
        );
    }

    let mut per_date = BTreeMap::<NaiveDate, Duration>::new();
    for session in sessions {
        *per_date
            .entry(session.start.date())
            .or_insert_with(Duration::zero) += session.duration();
    }
    for (date, duration) in per_date {
        let _ = writeln!(
            out,
            "{}: {}",
            date_to_record_name(date),
            format_duration(duration)
        );
    }
    out
}
