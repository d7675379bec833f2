use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::{
    storage::TimelineStore,
    utils::{
        clock::Clock,
        time::{format_clock, truncate_to_minute},
    },
};

use super::{
    error::ReconcileError,
    prompt::{parse_hhmm, read_answer, Console},
};

/// Asks for an end time for every open interval of `day` and persists it. A blank answer closes
/// the interval at the current minute, `hhmm` closes it at that time on the interval's start
/// date. Returns how many intervals were closed.
#[instrument(skip(store, console, clock))]
pub fn close_open_intervals(
    store: &dyn TimelineStore,
    console: &mut dyn Console,
    clock: &dyn Clock,
    day: NaiveDate,
) -> Result<usize, ReconcileError> {
    let open = store
        .intervals_for_day(day)?
        .into_iter()
        .filter(|interval| interval.is_open())
        .collect::<Vec<_>>();

    for interval in &open {
        console.write(&format!(
            "Enter end time for {}, which start time is {}: ",
            interval.label,
            format_clock(interval.start)
        ))?;
        let answer = read_answer(console)?;

        let end = if answer.is_empty() {
            truncate_to_minute(clock.now())
        } else {
            interval.start.date().and_time(parse_hhmm(&answer)?)
        };
        if end < interval.start {
            return Err(ReconcileError::EndBeforeStart {
                start: interval.start,
                end,
            });
        }

        store.update_interval(interval.start, &interval.label, end)?;
        info!("Closed '{}' {} - {}", interval.label, interval.start, end);
    }

    Ok(open.len())
}
