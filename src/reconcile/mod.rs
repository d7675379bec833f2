//! Reconciliation turns the partial, possibly gappy timeline of a day into a complete one.
//!
//! The steps of [Reconciler::complete_day] are:
//!  1. [closer] asks for the end of every interval that is still open.
//!  2. [inference::fold_sessions] copies finished focus sessions into the timeline.
//!  3. [inference] labels short gaps between focus intervals as breaks or distractions.
//!  4. [gap_filler] asks the operator to label whatever is still uncovered.
//!
//! Every write is an insert-if-absent keyed by start time or an update of an open interval, so a
//! failed or interrupted run can simply be repeated.

pub mod closer;
pub mod error;
pub mod gap_filler;
pub mod inference;
pub mod prompt;
pub mod summary;

use chrono::NaiveDate;
use tracing::info;

use crate::{
    config::LabelConfig,
    storage::{entities::TimeInterval, SessionLog, TimelineStore},
    utils::{clock::Clock, time::truncate_to_minute},
};

use error::ReconcileError;
use prompt::{choose_label, Console};

pub struct Reconciler<'a> {
    timeline: &'a dyn TimelineStore,
    sessions: &'a dyn SessionLog,
    clock: &'a dyn Clock,
    labels: &'a LabelConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        timeline: &'a dyn TimelineStore,
        sessions: &'a dyn SessionLog,
        clock: &'a dyn Clock,
        labels: &'a LabelConfig,
    ) -> Self {
        Self {
            timeline,
            sessions,
            clock,
            labels,
        }
    }

    /// Runs every reconciliation step for `day`, printing the timeline before and after the
    /// interactive gap filling.
    pub fn complete_day(
        &self,
        console: &mut dyn Console,
        day: NaiveDate,
    ) -> Result<(), ReconcileError> {
        info!("Reconciling {day}");
        closer::close_open_intervals(self.timeline, console, self.clock, day)?;
        inference::fold_sessions(self.sessions, self.timeline, day, &self.labels.focus)?;
        inference::insert_inferred_intervals(self.timeline, day, &self.labels.focus)?;

        self.report_day(console, day)?;
        gap_filler::fill_gaps(
            self.timeline,
            console,
            self.clock,
            day,
            &self.labels.adhoc_default,
        )?;
        self.report_day(console, day)
    }

    pub fn report_day(
        &self,
        console: &mut dyn Console,
        day: NaiveDate,
    ) -> Result<(), ReconcileError> {
        let intervals = self.timeline.intervals_for_day(day)?;
        console.write(&summary::render_day_report(day, &intervals))?;
        Ok(())
    }

    /// Opens a new interval starting at the current minute, labeled through the label menu.
    pub fn start_activity(
        &self,
        console: &mut dyn Console,
    ) -> Result<TimeInterval, ReconcileError> {
        let labels = self.timeline.distinct_labels()?;
        let label = choose_label(console, &labels, &self.labels.adhoc_default)?;
        let interval = TimeInterval::open(label, truncate_to_minute(self.clock.now()));
        if self.timeline.insert_if_absent(&interval)? {
            info!("Started {interval:?}");
        }
        Ok(interval)
    }
}
