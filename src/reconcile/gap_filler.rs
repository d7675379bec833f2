use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use crate::{
    storage::{entities::TimeInterval, TimelineStore},
    utils::{
        clock::Clock,
        time::{day_last_minute, day_start, format_clock, format_duration, truncate_to_minute},
    },
};

use super::{
    error::ReconcileError,
    prompt::{choose_label, parse_range, read_answer, Console},
};

/// Uncovered spans up to this length are tolerated.
const GAP_TOLERANCE: Duration = Duration::minutes(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// The gap runs up to the end of the covered part of the day rather than to a known interval.
    pub trailing: bool,
}

/// Where coverage of `day` has to reach: the current minute for today, 23:59 for any other day.
pub fn effective_day_end(day: NaiveDate, now: NaiveDateTime) -> NaiveDateTime {
    if now.date() == day {
        truncate_to_minute(now)
    } else {
        day_last_minute(day)
    }
}

/// Finds the earliest gap longer than a minute in an ordered timeline, between `from` and `to`.
/// Open intervals cover everything up to `to`, empty ones cover nothing.
pub fn first_gap(intervals: &[TimeInterval], from: NaiveDateTime, to: NaiveDateTime) -> Option<Gap> {
    let mut cursor = from;
    for interval in intervals.iter().filter(|interval| !interval.is_empty()) {
        if interval.start - cursor > GAP_TOLERANCE {
            return Some(Gap {
                start: cursor,
                end: interval.start,
                trailing: false,
            });
        }
        cursor = cursor.max(interval.end.unwrap_or(to));
    }

    (to - cursor > GAP_TOLERANCE).then_some(Gap {
        start: cursor,
        end: to,
        trailing: true,
    })
}

/// Asks the operator to label `gap` and stores the answer. Returns whether explicit bounds were
/// entered, in which case the gap may only be partially covered.
///
/// An empty interval starting where the answer starts is replaced. Any other interval with that
/// start is reported back for an explicit range and is an error for the default one, since the
/// same gap would come up again.
fn prompt_for_gap(
    store: &dyn TimelineStore,
    console: &mut dyn Console,
    timeline: &[TimeInterval],
    gap: Gap,
    default_label: &str,
) -> Result<bool, ReconcileError> {
    console.write(&format!(
        "[{} - {}], total {} \n",
        format_clock(gap.start),
        format_clock(gap.end),
        format_duration(gap.end - gap.start)
    ))?;

    let labels = store.distinct_labels()?;
    let label = choose_label(console, &labels, default_label)?;

    console.write("enter [hhmm-hhmm] or leave blank to use default: ")?;
    let range = parse_range(&read_answer(console)?)?;

    let date = gap.start.date();
    let start = range.start.map_or(gap.start, |time| date.and_time(time));
    let end = range.end.map_or(gap.end, |time| date.and_time(time));
    if end < start {
        return Err(ReconcileError::EndBeforeStart { start, end });
    }

    for empty in timeline
        .iter()
        .filter(|interval| interval.start == start && interval.is_empty())
    {
        info!("Replacing empty {empty:?}");
        store.remove_interval(empty.start, &empty.label)?;
    }

    let interval = TimeInterval::closed(label, start, end);
    if store.insert_if_absent(&interval)? {
        info!("Filled gap with {interval:?}");
    } else if range.is_explicit() {
        warn!("An interval starting at {start} already exists");
        console.write(&format!(
            "Another activity already starts at {}\n",
            format_clock(start)
        ))?;
    } else {
        return Err(ReconcileError::StartTaken(start));
    }
    Ok(range.is_explicit())
}

/// Prompts for every uncovered span of `day` until the timeline reaches from midnight to the
/// effective day end. The timeline is read again after each answer because an entered range can
/// change which gap comes first. Returns the number of prompts shown.
#[instrument(skip(store, console, clock))]
pub fn fill_gaps(
    store: &dyn TimelineStore,
    console: &mut dyn Console,
    clock: &dyn Clock,
    day: NaiveDate,
    default_label: &str,
) -> Result<usize, ReconcileError> {
    console.write(&format!("\n{day}  "))?;
    let from = day_start(day);
    let to = effective_day_end(day, clock.now());

    let mut prompts = 0;
    loop {
        let timeline = store.intervals_for_day(day)?;
        let Some(gap) = first_gap(&timeline, from, to) else {
            break;
        };

        debug!("Found gap {gap:?}");
        prompts += 1;
        let explicit = prompt_for_gap(store, console, &timeline, gap, default_label)?;
        if gap.trailing && !explicit {
            break;
        }
    }

    Ok(prompts)
}
