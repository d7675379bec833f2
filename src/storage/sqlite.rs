use std::path::Path;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Row};
use tracing::{debug, trace};

use crate::utils::time::{date_to_record_name, STORAGE_FORMAT};

use super::{
    entities::{SessionEntry, TaskRecord, TaskTotal, TimeInterval},
    SessionLog, StorageError, TaskStore, TimelineStore,
};

/// The main realization of the storage traits, backed by a single SQLite file.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Opening database {path:?}");
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS daily_trackers (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                activity    TEXT NOT NULL,
                start_time  TEXT NOT NULL,
                end_time    TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                deleted_at  TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_daily_trackers_start ON daily_trackers(start_time);
            CREATE INDEX IF NOT EXISTS idx_daily_trackers_deleted ON daily_trackers(deleted_at);

            CREATE TABLE IF NOT EXISTS time_entries (
                id          TEXT PRIMARY KEY,
                task_id     TEXT NOT NULL,
                task_name   TEXT NOT NULL DEFAULT '',
                start_time  TEXT NOT NULL,
                end_time    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                deleted_at  TEXT
            );

            CREATE TABLE IF NOT EXISTS tasks (
                task_id         TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT '',
                parent_task_id  TEXT,
                project_name    TEXT NOT NULL DEFAULT '',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }
}

fn to_text(time: NaiveDateTime) -> String {
    time.format(STORAGE_FORMAT).to_string()
}

fn now_text() -> String {
    to_text(Local::now().naive_local())
}

fn parse_timestamp(column: &'static str, value: String) -> Result<NaiveDateTime, StorageError> {
    NaiveDateTime::parse_from_str(&value, STORAGE_FORMAT)
        .map_err(|_| StorageError::Timestamp { column, value })
}

fn row_to_interval(row: &Row) -> Result<TimeInterval, StorageError> {
    let start: String = row.get("start_time")?;
    let end: Option<String> = row.get("end_time")?;
    Ok(TimeInterval {
        label: row.get("activity")?,
        start: parse_timestamp("start_time", start)?,
        end: end.map(|v| parse_timestamp("end_time", v)).transpose()?,
    })
}

fn row_to_session(row: &Row) -> Result<SessionEntry, StorageError> {
    let start: String = row.get("start_time")?;
    let end: String = row.get("end_time")?;
    Ok(SessionEntry {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        task_name: row.get("task_name")?,
        start: parse_timestamp("start_time", start)?,
        end: parse_timestamp("end_time", end)?,
    })
}

fn row_to_task(row: &Row) -> Result<TaskRecord, StorageError> {
    Ok(TaskRecord {
        task_id: row.get("task_id")?,
        name: row.get("name")?,
        status: row.get("status")?,
        parent_task_id: row.get("parent_task_id")?,
        project_name: row.get("project_name")?,
    })
}

impl TimelineStore for SqliteStorage {
    fn insert_if_absent(&self, interval: &TimeInterval) -> Result<bool, StorageError> {
        let start = to_text(interval.start);
        let existing: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM daily_trackers WHERE start_time = ?1 AND deleted_at IS NULL",
            params![start],
            |row| row.get(0),
        )?;
        if existing > 0 {
            trace!("Interval starting at {start} already exists");
            return Ok(false);
        }

        let now = now_text();
        self.conn.execute(
            "INSERT INTO daily_trackers (activity, start_time, end_time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![interval.label, start, interval.end.map(to_text), now],
        )?;
        debug!("Inserted interval {interval:?}");
        Ok(true)
    }

    fn intervals_for_day(&self, day: NaiveDate) -> Result<Vec<TimeInterval>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT activity, start_time, end_time
             FROM daily_trackers
             WHERE deleted_at IS NULL AND (date(start_time) = ?1 OR date(end_time) = ?1)
             ORDER BY start_time ASC, id ASC",
        )?;
        let mut rows = stmt.query(params![date_to_record_name(day)])?;
        let mut intervals = Vec::new();
        while let Some(row) = rows.next()? {
            intervals.push(row_to_interval(row)?);
        }
        Ok(intervals)
    }

    fn update_interval(
        &self,
        start: NaiveDateTime,
        label: &str,
        end: NaiveDateTime,
    ) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE daily_trackers SET end_time = ?1, updated_at = ?2
             WHERE start_time = ?3 AND activity = ?4 AND deleted_at IS NULL",
            params![to_text(end), now_text(), to_text(start), label],
        )?;
        debug!("Closed {updated} interval(s) '{label}' starting at {start}");
        Ok(())
    }

    fn remove_interval(&self, start: NaiveDateTime, label: &str) -> Result<(), StorageError> {
        let now = now_text();
        let removed = self.conn.execute(
            "UPDATE daily_trackers SET deleted_at = ?1, updated_at = ?1
             WHERE start_time = ?2 AND activity = ?3 AND deleted_at IS NULL",
            params![now, to_text(start), label],
        )?;
        debug!("Removed {removed} interval(s) '{label}' starting at {start}");
        Ok(())
    }

    fn distinct_labels(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT activity FROM daily_trackers
             WHERE deleted_at IS NULL
             ORDER BY activity ASC",
        )?;
        let labels = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }
}

impl SessionLog for SqliteStorage {
    fn record_session(&self, entry: &SessionEntry) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO time_entries (id, task_id, task_name, start_time, end_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.task_id,
                entry.task_name,
                to_text(entry.start),
                to_text(entry.end),
                now_text()
            ],
        )?;
        debug!("Recorded session {entry:?}");
        Ok(())
    }

    fn sessions_for_day(&self, day: NaiveDate) -> Result<Vec<SessionEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, task_name, start_time, end_time
             FROM time_entries
             WHERE deleted_at IS NULL AND (date(start_time) = ?1 OR date(end_time) = ?1)
             ORDER BY start_time ASC",
        )?;
        let mut rows = stmt.query(params![date_to_record_name(day)])?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next()? {
            sessions.push(row_to_session(row)?);
        }
        Ok(sessions)
    }

    fn total_by_task(&self) -> Result<Vec<TaskTotal>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT task_name,
                    SUM(CAST(strftime('%s', end_time) AS INTEGER)
                        - CAST(strftime('%s', start_time) AS INTEGER)) AS seconds
             FROM time_entries
             WHERE deleted_at IS NULL
             GROUP BY task_name
             ORDER BY task_name ASC",
        )?;
        let totals = stmt
            .query_map([], |row| {
                Ok(TaskTotal {
                    task_name: row.get(0)?,
                    duration: Duration::seconds(row.get::<_, i64>(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(totals)
    }
}

impl TaskStore for SqliteStorage {
    fn tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT task_id, name, status, parent_task_id, project_name
             FROM tasks
             ORDER BY rowid ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(row_to_task(row)?);
        }
        Ok(tasks)
    }

    fn upsert_tasks(&self, tasks: &[TaskRecord]) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_text();
        for task in tasks {
            tx.execute(
                "INSERT INTO tasks
                    (task_id, name, status, parent_task_id, project_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(task_id) DO UPDATE SET
                    name = excluded.name,
                    status = excluded.status,
                    parent_task_id = excluded.parent_task_id,
                    project_name = excluded.project_name,
                    updated_at = excluded.updated_at",
                params![
                    task.task_id,
                    task.name,
                    task.status,
                    task.parent_task_id,
                    task.project_name,
                    now
                ],
            )?;
        }
        tx.commit()?;
        debug!("Upserted {} task(s)", tasks.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use tempfile::tempdir;

    use crate::storage::{
        entities::{SessionEntry, TaskRecord, TimeInterval},
        SessionLog, TaskStore, TimelineStore,
    };

    use super::SqliteStorage;

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        TEST_DATE.and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn insert_is_skipped_for_same_start() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        assert!(storage.insert_if_absent(&TimeInterval::closed("study", at(9, 0), at(9, 25)))?);
        assert!(!storage.insert_if_absent(&TimeInterval::closed("play", at(9, 0), at(9, 5)))?);

        let intervals = storage.intervals_for_day(TEST_DATE)?;
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].label, "study");
        Ok(())
    }

    #[test]
    fn day_query_includes_intervals_crossing_midnight() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        let previous_evening = TEST_DATE.pred_opt().unwrap().and_hms_opt(23, 0, 0).unwrap();
        storage.insert_if_absent(&TimeInterval::closed("sleep", previous_evening, at(7, 0)))?;
        storage.insert_if_absent(&TimeInterval::closed("study", at(9, 0), at(9, 25)))?;
        storage.insert_if_absent(&TimeInterval::closed(
            "study",
            at(9, 0) + Duration::days(1),
            at(10, 0) + Duration::days(1),
        ))?;

        let intervals = storage.intervals_for_day(TEST_DATE)?;
        assert_eq!(
            intervals.iter().map(|v| v.label.as_str()).collect::<Vec<_>>(),
            vec!["sleep", "study"]
        );
        Ok(())
    }

    #[test]
    fn open_interval_is_closed_by_key() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        storage.insert_if_absent(&TimeInterval::open("reading", at(13, 0)))?;
        assert!(storage.intervals_for_day(TEST_DATE)?[0].is_open());

        storage.update_interval(at(13, 0), "reading", at(13, 45))?;
        assert_eq!(
            storage.intervals_for_day(TEST_DATE)?[0],
            TimeInterval::closed("reading", at(13, 0), at(13, 45))
        );
        Ok(())
    }

    #[test]
    fn removed_interval_frees_its_start() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        storage.insert_if_absent(&TimeInterval::closed("study", at(9, 0), at(9, 0)))?;

        storage.remove_interval(at(9, 0), "study")?;

        assert!(storage.intervals_for_day(TEST_DATE)?.is_empty());
        assert!(storage.insert_if_absent(&TimeInterval::closed("play", at(9, 0), at(12, 0)))?);
        Ok(())
    }

    #[test]
    fn labels_are_distinct_and_sorted() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        storage.insert_if_absent(&TimeInterval::closed("study", at(9, 0), at(9, 25)))?;
        storage.insert_if_absent(&TimeInterval::closed("lunch", at(12, 0), at(13, 0)))?;
        storage.insert_if_absent(&TimeInterval::closed("study", at(14, 0), at(14, 25)))?;
        assert_eq!(storage.distinct_labels()?, vec!["lunch", "study"]);
        Ok(())
    }

    #[test]
    fn totals_are_grouped_by_task_name() -> Result<()> {
        let storage = SqliteStorage::open_in_memory()?;
        for (id, name, start, end) in [
            ("a-1", "write", at(9, 0), at(9, 25)),
            ("a-2", "write", at(10, 0), at(10, 20)),
            ("b-1", "review", at(11, 0), at(11, 10)),
        ] {
            storage.record_session(&SessionEntry {
                id: id.into(),
                task_id: id[..1].into(),
                task_name: name.into(),
                start,
                end,
            })?;
        }

        let totals = storage.total_by_task()?;
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].task_name, "review");
        assert_eq!(totals[0].duration, Duration::minutes(10));
        assert_eq!(totals[1].task_name, "write");
        assert_eq!(totals[1].duration, Duration::minutes(45));
        assert_eq!(storage.sessions_for_day(TEST_DATE)?.len(), 3);
        Ok(())
    }

    #[test]
    fn tasks_are_upserted_in_place() -> Result<()> {
        let dir = tempdir()?;
        let storage = SqliteStorage::open(&dir.path().join("nested").join("pomolog.db"))?;
        let mut task = TaskRecord {
            task_id: "t1".into(),
            name: "Thesis".into(),
            status: "open".into(),
            parent_task_id: None,
            project_name: "School".into(),
        };
        storage.upsert_tasks(&[task.clone()])?;
        task.status = "in progress".into();
        storage.upsert_tasks(&[task.clone()])?;

        assert_eq!(storage.tasks()?, vec![task]);
        Ok(())
    }
}
