//!  Storage is organized through [sqlite::SqliteStorage].
//!  The basic idea is:
//!   - `daily_trackers` holds the labeled daily timeline.
//!   - `time_entries` is the raw log of finished focus sessions.
//!   - `tasks` mirrors the remote task tracker.
//!   - Rows are soft removed through `deleted_at` and never deleted by the application.

pub mod entities;
pub mod sqlite;

use chrono::{NaiveDate, NaiveDateTime};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use entities::{SessionEntry, TaskRecord, TaskTotal, TimeInterval};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid timestamp '{value}' in column {column}")]
    Timestamp { column: &'static str, value: String },
    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// The daily timeline.
#[cfg_attr(test, automock)]
pub trait TimelineStore {
    /// Creates the interval unless one with the exact same start already exists. Returns whether
    /// a row was written.
    fn insert_if_absent(&self, interval: &TimeInterval) -> Result<bool, StorageError>;

    /// Every interval whose start or end falls on `day`, ordered by start.
    fn intervals_for_day(&self, day: NaiveDate) -> Result<Vec<TimeInterval>, StorageError>;

    /// Sets the end of the interval identified by its start and label.
    fn update_interval(
        &self,
        start: NaiveDateTime,
        label: &str,
        end: NaiveDateTime,
    ) -> Result<(), StorageError>;

    /// Soft removes the interval identified by its start and label.
    fn remove_interval(&self, start: NaiveDateTime, label: &str) -> Result<(), StorageError>;

    /// Every label used so far, sorted.
    fn distinct_labels(&self) -> Result<Vec<String>, StorageError>;
}

/// Log of finished focus sessions.
#[cfg_attr(test, automock)]
pub trait SessionLog {
    fn record_session(&self, entry: &SessionEntry) -> Result<(), StorageError>;

    /// Sessions whose start or end falls on `day`, ordered by start.
    fn sessions_for_day(&self, day: NaiveDate) -> Result<Vec<SessionEntry>, StorageError>;

    fn total_by_task(&self) -> Result<Vec<TaskTotal>, StorageError>;
}

pub trait TaskStore {
    fn tasks(&self) -> Result<Vec<TaskRecord>, StorageError>;

    /// Inserts new tasks and overwrites the fields of known ones.
    fn upsert_tasks(&self, tasks: &[TaskRecord]) -> Result<(), StorageError>;
}
