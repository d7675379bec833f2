use std::io;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid time '{0}', expected hhmm")]
    InvalidTime(String),
    #[error("end time {end} is before start time {start}")]
    EndBeforeStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("another activity already starts at {0}")]
    StartTaken(NaiveDateTime),
    #[error("failed to use the console: {0}")]
    Input(#[from] io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReconcileError {
    /// Operator mistakes end the process. Storage failures only abort the running command, the
    /// day can be reconciled again later.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReconcileError::Storage(_))
    }
}
