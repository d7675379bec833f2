use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Labeled span of the daily timeline. An interval without an end is an activity that was
/// started and not yet closed.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct TimeInterval {
    pub label: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
}

impl TimeInterval {
    pub fn closed(label: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            label: label.into(),
            start,
            end: Some(end),
        }
    }

    pub fn open(label: impl Into<String>, start: NaiveDateTime) -> Self {
        Self {
            label: label.into(),
            start,
            end: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// A closed interval that covers no time at all.
    pub fn is_empty(&self) -> bool {
        self.end.is_some_and(|end| end <= self.start)
    }

    /// Length of a closed interval. Open intervals have no duration yet.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }
}

/// One finished focus session from the timer log.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SessionEntry {
    pub id: String,
    pub task_id: String,
    pub task_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SessionEntry {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Task mirrored from the remote tracker.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct TaskRecord {
    pub task_id: String,
    pub name: String,
    pub status: String,
    pub parent_task_id: Option<String>,
    pub project_name: String,
}

impl TaskRecord {
    pub fn is_main_task(&self) -> bool {
        self.parent_task_id.is_none()
    }
}

/// Total time logged against a task name.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TaskTotal {
    pub task_name: String,
    pub duration: Duration,
}
