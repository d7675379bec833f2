use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, instrument, warn};

use crate::{
    storage::{entities::{SessionEntry, TimeInterval}, SessionLog, TimelineStore},
    utils::time::{day_last_minute, day_start, truncate_to_minute},
};

use super::error::ReconcileError;

/// A gap of at most this length after a full focus session is a break.
const BREAK_MAX_GAP: Duration = Duration::minutes(10);
/// Shortest focus interval that counts as a full session.
const FULL_SESSION: Duration = Duration::minutes(20);
/// Gaps shorter than this after a focus interval are distractions.
const DISTRACTION_MAX_GAP: Duration = Duration::minutes(30);

pub fn break_label(focus_label: &str) -> String {
    format!("{focus_label}_break")
}

pub fn distraction_label(focus_label: &str) -> String {
    format!("{focus_label}_distraction")
}

/// Turns a session from the timer log into a focus interval of `day`. Parts before or after the
/// day are cut at 00:00 and 23:59, and both ends are truncated to the minute. Sessions that don't
/// span a minute boundary give no interval.
pub fn session_to_interval(
    session: &SessionEntry,
    day: NaiveDate,
    focus_label: &str,
) -> Option<TimeInterval> {
    let start = if session.start.date() != day {
        day_start(day)
    } else {
        session.start
    };
    let end = if session.end.date() != day {
        day_last_minute(day)
    } else {
        session.end
    };
    let interval =
        TimeInterval::closed(focus_label, truncate_to_minute(start), truncate_to_minute(end));
    (!interval.is_empty()).then_some(interval)
}

/// Copies the day's finished focus sessions into the timeline. Sessions already present (same
/// start) are skipped.
#[instrument(skip(sessions, store))]
pub fn fold_sessions(
    sessions: &dyn SessionLog,
    store: &dyn TimelineStore,
    day: NaiveDate,
    focus_label: &str,
) -> Result<usize, ReconcileError> {
    let mut inserted = 0;
    for session in sessions.sessions_for_day(day)? {
        let Some(interval) = session_to_interval(&session, day, focus_label) else {
            debug!("Session {} is shorter than a minute on the timeline", session.id);
            continue;
        };
        if store.insert_if_absent(&interval)? {
            inserted += 1;
        }
    }
    debug!("Folded {inserted} session(s) into the timeline");
    Ok(inserted)
}

/// Walks a chronologically ordered timeline and classifies the gap in front of every focus
/// interval that follows another focus interval:
///  1. gap <= 10 minutes and the previous one lasted at least 20 minutes: a break.
///  2. otherwise gap < 30 minutes: a distraction.
///  3. otherwise nothing.
///
/// Only strictly positive gaps are classified. Open and empty intervals are ignored.
pub fn infer_gap_intervals(intervals: &[TimeInterval], focus_label: &str) -> Vec<TimeInterval> {
    let mut inferred = Vec::new();
    let mut last_end: Option<NaiveDateTime> = None;
    let mut last_label: &str = "";
    let mut last_duration = Duration::zero();

    for interval in intervals.iter().filter(|interval| !interval.is_empty()) {
        let Some(end) = interval.end else {
            warn!("Skipping open interval {interval:?}");
            continue;
        };

        if let Some(gap_start) = last_end.filter(|_| interval.label == focus_label) {
            let gap = interval.start - gap_start;
            let after_focus = last_label == focus_label;
            if gap > Duration::zero() && after_focus {
                if gap <= BREAK_MAX_GAP && last_duration >= FULL_SESSION {
                    inferred.push(TimeInterval::closed(
                        break_label(focus_label),
                        gap_start,
                        interval.start,
                    ));
                } else if gap < DISTRACTION_MAX_GAP {
                    inferred.push(TimeInterval::closed(
                        distraction_label(focus_label),
                        gap_start,
                        interval.start,
                    ));
                }
            }
        }

        last_end = Some(end);
        last_label = interval.label.as_str();
        last_duration = end - interval.start;
    }

    inferred
}

/// Persists the breaks and distractions inferred for `day`. Running it again inserts nothing new.
#[instrument(skip(store))]
pub fn insert_inferred_intervals(
    store: &dyn TimelineStore,
    day: NaiveDate,
    focus_label: &str,
) -> Result<usize, ReconcileError> {
    let timeline = store.intervals_for_day(day)?;
    let mut inserted = 0;
    for interval in infer_gap_intervals(&timeline, focus_label) {
        if store.insert_if_absent(&interval)? {
            debug!("Inferred {interval:?}");
            inserted += 1;
        }
    }
    Ok(inserted)
}
