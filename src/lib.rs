//! Pomodoro timer that also keeps a complete timeline of the day.
//! Focus sessions are logged against tasks synced from ClickUp, and `complete` turns the sessions,
//! manually started activities and the operator's answers into a gapless labeled timeline.
//!

pub mod cache;
pub mod cli;
pub mod clickup;
pub mod config;
pub mod reconcile;
pub mod storage;
pub mod tasks;
pub mod timer;
pub mod utils;
