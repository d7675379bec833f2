//! The focus timer behind the default `run` command.
//!
//! A session counts down in one second ticks until either the configured time passes or the
//! operator presses Enter. Stop requests arrive through a [CancellationToken] armed by the caller,
//! usually by [listen_for_enter]. Afterwards the session is logged against the selected task,
//! today's timeline is reconciled and, for a session that ran to the end, a break countdown
//! follows.

pub mod render;

use std::{io::BufRead, time::Duration};

use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    cache::SelectedTaskCache,
    config::Configuration,
    reconcile::{prompt::Console, Reconciler},
    storage::{entities::SessionEntry, SessionLog},
    utils::clock::Clock,
};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub focus: Duration,
    /// Sessions not longer than this are thrown away.
    pub stop_in_first: Duration,
    pub break_time: Duration,
}

impl From<&Configuration> for TimerConfig {
    fn from(config: &Configuration) -> Self {
        Self {
            focus: Duration::from_secs(u64::from(config.pomodoro_time) * 60),
            stop_in_first: Duration::from_secs(u64::from(config.stop_in_first)),
            break_time: Duration::from_secs(u64::from(config.break_time) * 60),
        }
    }
}

/// Arms a token that is cancelled once a line is read from stdin.
///
/// A plain thread is used instead of the blocking pool so that a listener still waiting for
/// input doesn't hold up runtime shutdown.
pub fn listen_for_enter() -> CancellationToken {
    let token = CancellationToken::new();
    let stop = token.clone();
    std::thread::spawn(move || {
        let mut line = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
            warn!("Failed to read stdin {e:?}");
        }
        stop.cancel();
    });
    token
}

/// Ticks from `start` until `total` has passed or `stop` is cancelled. `on_tick` receives the
/// elapsed time after every tick that didn't end the countdown.
pub async fn countdown(
    clock: &dyn Clock,
    start: Instant,
    total: Duration,
    stop: &CancellationToken,
    mut on_tick: impl FnMut(Duration),
) -> Outcome {
    let mut next_tick = start;
    loop {
        next_tick += TICK;
        tokio::select! {
            biased;
            _ = stop.cancelled() => return Outcome::Interrupted,
            _ = clock.sleep_until(next_tick) => ()
        }

        let elapsed = clock.instant().saturating_duration_since(start);
        if elapsed >= total {
            return Outcome::Finished;
        }
        on_tick(elapsed);
    }
}

/// Writes a countdown line. Only the first failed write of a countdown is logged.
fn draw_tick(console: &mut dyn Console, line: &str, failed: &mut bool) {
    if let Err(e) = console.write(line) {
        if !std::mem::replace(failed, true) {
            warn!("Failed to draw the countdown {e:?}");
        }
    }
}

/// Runs blocking console work. On a multi threaded runtime the worker is handed off first so
/// tasks queued on it keep running. A current thread runtime can't hand off and runs `f` in place.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

pub struct SessionTimer<'a> {
    clock: &'a dyn Clock,
    sessions: &'a dyn SessionLog,
    cache: &'a dyn SelectedTaskCache,
    config: TimerConfig,
}

impl<'a> SessionTimer<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        sessions: &'a dyn SessionLog,
        cache: &'a dyn SelectedTaskCache,
        config: TimerConfig,
    ) -> Self {
        Self {
            clock,
            sessions,
            cache,
            config,
        }
    }

    /// Logs the session against the selected task. Returns `None` for sessions too short to keep.
    pub async fn finish_session(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Option<SessionEntry>> {
        let length = (end - start).to_std().unwrap_or_default();
        if length <= self.config.stop_in_first {
            info!("Discarding session of {length:?}");
            return Ok(None);
        }

        let task = self.cache.get().await?;
        if task.task_id.is_empty() {
            warn!("No task selected, logging session without a task");
        }
        let task_id = task.effective_id().to_string();
        let entry = SessionEntry {
            id: format!(
                "{task_id}-{}",
                Utc::now().timestamp_nanos_opt().unwrap_or_default()
            ),
            task_id,
            task_name: task.display_name(),
            start,
            end,
        };
        self.sessions.record_session(&entry)?;
        info!("Recorded session {entry:?}");
        Ok(Some(entry))
    }

    /// Runs a focus session and everything that follows it. `listen` arms a fresh stop token for
    /// every countdown and for the acknowledgement of a finished session.
    pub async fn run(
        &self,
        console: &mut dyn Console,
        reconciler: &Reconciler<'_>,
        mut listen: impl FnMut() -> CancellationToken,
    ) -> Result<Outcome> {
        let focus = self.config.focus;
        let stop = listen();
        let start_time = self.clock.now();
        let start = self.clock.instant();

        let mut draw_failed = false;
        let outcome = countdown(self.clock, start, focus, &stop, |elapsed| {
            draw_tick(console, &render::focus_line(focus, elapsed), &mut draw_failed);
        })
        .await;
        let finished_at = self.clock.instant();
        let elapsed = finished_at.saturating_duration_since(start);
        let end_time = start_time + chrono::Duration::from_std(elapsed)?;
        console.write("\n")?;

        let Some(entry) = self.finish_session(start_time, end_time).await? else {
            console.write(&format!(
                "pomo duration: {}s not longer than {}s, ignoring it\n",
                elapsed.as_secs(),
                self.config.stop_in_first.as_secs()
            ))?;
            return Ok(outcome);
        };

        console.write(render::BELL)?;
        if outcome == Outcome::Finished {
            console.write(&format!(
                "Session on '{}' finished. Press Enter to continue\n",
                entry.task_name
            ))?;
            stop.cancelled().await;
        }

        let today = self.clock.now().date();
        match blocking(|| reconciler.complete_day(console, today)) {
            Ok(()) => (),
            Err(e) if !e.is_fatal() => {
                error!("Failed to reconcile the day {e:?}");
                console.write(&format!("Failed to reconcile the day: {e}\n"))?;
            }
            Err(e) => return Err(e.into()),
        }

        if outcome == Outcome::Finished {
            self.run_break(console, finished_at, listen()).await?;
        }
        Ok(outcome)
    }

    /// Break countdown measured from the end of the focus session.
    async fn run_break(
        &self,
        console: &mut dyn Console,
        start: Instant,
        stop: CancellationToken,
    ) -> Result<Outcome> {
        let total = self.config.break_time;
        let mut draw_failed = false;
        let outcome = countdown(self.clock, start, total, &stop, |elapsed| {
            draw_tick(console, &render::break_line(total, elapsed), &mut draw_failed);
        })
        .await;

        if outcome == Outcome::Interrupted {
            console.write("\nBreak stopped early.\n")?;
        } else {
            console.write(&format!("{}\nBreak is over.\n", render::break_line(total, total)))?;
        }
        console.write(render::BELL)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::tempdir;
    use tokio::{
    runtime::{Handle, RuntimeFlavor},
    time::Instant,
};
    use tokio_util::sync::CancellationToken;

    use super::{blocking, countdown, draw_tick, Outcome, SessionTimer, TimerConfig};
    use crate::{
        cache::{FileTaskCache, SelectedTask, SelectedTaskCache},
        config::LabelConfig,
        reconcile::{
            error::ReconcileError,
            prompt::{testing::ScriptedConsole, Console},
            Reconciler,
        },
        storage::{sqlite::SqliteStorage, SessionLog, TimelineStore},
        utils::clock::{Clock, FixedClock},
    };

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        TEST_DATE.and_hms_opt(hour, minute, 0).unwrap()
    }

    fn config() -> TimerConfig {
        TimerConfig {
            focus: Duration::from_secs(25 * 60),
            stop_in_first: Duration::from_secs(30),
            break_time: Duration::from_secs(5 * 60),
        }
    }

    async fn selected_cache(dir: &std::path::Path) -> Result<FileTaskCache> {
        let cache = FileTaskCache::new(dir.join("selected_task.json"));
        cache
            .set(&SelectedTask {
                name: "Thesis".into(),
                task_id: "t1".into(),
                sub_name: "Chapter 1".into(),
                sub_id: "t1a".into(),
                project: "School".into(),
            })
            .await?;
        Ok(cache)
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_finishes_after_total() {
        let clock = FixedClock(at(9, 0));
        let stop = CancellationToken::new();
        let start = clock.instant();
        let mut ticks = 0;

        let outcome = countdown(&clock, start, Duration::from_secs(5), &stop, |_| ticks += 1).await;

        assert_eq!(outcome, Outcome::Finished);
        assert_eq!(ticks, 4);
        assert_eq!(Instant::now() - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_stops_on_cancel() {
        let clock = FixedClock(at(9, 0));
        let stop = CancellationToken::new();
        let start = clock.instant();
        let canceller = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let outcome = countdown(&clock, start, Duration::from_secs(60), &stop, |_| ()).await;

        assert_eq!(outcome, Outcome::Interrupted);
        assert_eq!(Instant::now() - start, Duration::from_millis(2500));
    }

    /// Terminal that went away, every write fails.
    #[derive(Default)]
    struct ClosedConsole {
        writes: usize,
    }

    impl Console for ClosedConsole {
        fn read_line(&mut self) -> std::io::Result<String> {
            Ok(String::new())
        }

        fn write(&mut self, _text: &str) -> std::io::Result<()> {
            self.writes += 1;
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_survives_failed_draws() {
        let clock = FixedClock(at(9, 0));
        let stop = CancellationToken::new();
        let mut console = ClosedConsole::default();
        let mut failed = false;

        let outcome = countdown(&clock, clock.instant(), Duration::from_secs(5), &stop, |_| {
            draw_tick(&mut console, "tick", &mut failed)
        })
        .await;

        assert_eq!(outcome, Outcome::Finished);
        assert_eq!(console.writes, 4);
        assert!(failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_work_lets_queued_tasks_run() {
        // Runs on a worker, so the inner task is queued behind it on the same worker.
        let worker = tokio::spawn(async {
            let (sender, receiver) = std::sync::mpsc::channel();
            tokio::spawn(async move { sender.send(()).unwrap() });
            blocking(|| receiver.recv_timeout(Duration::from_secs(5)))
        });

        assert!(worker.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn blocking_work_runs_in_place_on_current_thread() {
        assert_eq!(blocking(|| 4), 4);
    }

    #[tokio::test]
    async fn short_sessions_are_discarded() -> Result<()> {
        let dir = tempdir()?;
        let cache = selected_cache(dir.path()).await?;
        let store = SqliteStorage::open_in_memory()?;
        let clock = FixedClock(at(9, 0));
        let timer = SessionTimer::new(&clock, &store, &cache, config());

        let thirty_seconds = at(9, 0) + chrono::Duration::seconds(30);
        assert!(timer.finish_session(at(9, 0), thirty_seconds).await?.is_none());
        assert!(store.sessions_for_day(TEST_DATE)?.is_empty());

        let entry = timer
            .finish_session(at(9, 0), thirty_seconds + chrono::Duration::seconds(1))
            .await?
            .unwrap();
        assert!(entry.id.starts_with("t1a-"));
        assert_eq!(entry.task_id, "t1a");
        assert_eq!(entry.task_name, "Thesis Chapter 1");
        assert_eq!(store.sessions_for_day(TEST_DATE)?, vec![entry]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_session_is_logged_and_reconciled() -> Result<()> {
        let dir = tempdir()?;
        let cache = selected_cache(dir.path()).await?;
        let store = SqliteStorage::open_in_memory()?;
        let labels = LabelConfig::default();
        let clock = FixedClock(at(9, 0));
        let reconciler = Reconciler::new(&store, &store, &clock, &labels);
        let timer = SessionTimer::new(&clock, &store, &cache, config());

        let stop = CancellationToken::new();
        let canceller = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10 * 60)).await;
            canceller.cancel();
        });
        // 00:00 - 09:00 gap, label and range
        let mut console = ScriptedConsole::new(["", ""]);
        let armed = Arc::new(Mutex::new(0));
        let counter = armed.clone();

        let outcome = timer
            .run(&mut console, &reconciler, move || {
                *counter.lock().unwrap() += 1;
                stop.clone()
            })
            .await?;

        assert_eq!(outcome, Outcome::Interrupted);
        assert_eq!(*armed.lock().unwrap(), 1);
        let sessions = store.sessions_for_day(TEST_DATE)?;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].end, at(9, 10));
        assert_eq!(
            store
                .intervals_for_day(TEST_DATE)?
                .iter()
                .map(|v| v.label.as_str())
                .collect::<Vec<_>>(),
            vec!["play", "study"]
        );
        assert!(!console.output.contains("Break"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_answer_during_reconcile_fails_the_run() -> Result<()> {
        let dir = tempdir()?;
        let cache = selected_cache(dir.path()).await?;
        let store = SqliteStorage::open_in_memory()?;
        let labels = LabelConfig::default();
        let clock = FixedClock(at(9, 0));
        let reconciler = Reconciler::new(&store, &store, &clock, &labels);
        let timer = SessionTimer::new(&clock, &store, &cache, config());

        let stop = CancellationToken::new();
        let canceller = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10 * 60)).await;
            canceller.cancel();
        });
        let mut console = ScriptedConsole::new(["", "9999"]);

        let result = timer
            .run(&mut console, &reconciler, move || stop.clone())
            .await;

        let error = result.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::InvalidTime(_))
        ));
        assert_eq!(store.sessions_for_day(TEST_DATE)?.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn finished_session_runs_break() -> Result<()> {
        let dir = tempdir()?;
        let cache = selected_cache(dir.path()).await?;
        let store = SqliteStorage::open_in_memory()?;
        let labels = LabelConfig::default();
        let clock = FixedClock(at(0, 0));
        let reconciler = Reconciler::new(&store, &store, &clock, &labels);
        let timer = SessionTimer::new(&clock, &store, &cache, config());

        // Enter is pressed a minute after the session ends, the break then runs out on its own.
        let focus_stop = CancellationToken::new();
        let acknowledge = focus_stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(26 * 60)).await;
            acknowledge.cancel();
        });
        let mut tokens = vec![focus_stop, CancellationToken::new()].into_iter();
        let mut console = ScriptedConsole::default();

        let start = Instant::now();
        let outcome = timer
            .run(&mut console, &reconciler, move || {
                tokens.next().unwrap_or_default()
            })
            .await?;

        assert_eq!(outcome, Outcome::Finished);
        assert_eq!(Instant::now() - start, Duration::from_secs(30 * 60));
        assert!(console.output.contains("Press Enter to continue"));
        assert!(console.output.contains("Break is over."));
        assert_eq!(store.sessions_for_day(TEST_DATE)?[0].end, at(0, 25));
        Ok(())
    }
}
