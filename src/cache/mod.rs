//! Remembers which task the timer logs focus sessions against. The selection is a single JSON
//! document kept in a file, locked while it is read or replaced so that a running timer and a
//! `set` in another terminal never see half written content.

use std::{io::ErrorKind, path::PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedTask {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub sub_name: String,
    #[serde(default)]
    pub sub_id: String,
    #[serde(default)]
    pub project: String,
}

impl SelectedTask {
    /// Id sessions are logged under. A selected subtask wins over its main task.
    pub fn effective_id(&self) -> &str {
        if self.sub_id.is_empty() {
            &self.task_id
        } else {
            &self.sub_id
        }
    }

    /// `"<name> <subname>"`, without the trailing space when no subtask is selected.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.sub_name).trim().to_string()
    }
}

#[async_trait]
pub trait SelectedTaskCache: Send + Sync {
    /// The stored selection, or an empty one when nothing was selected yet.
    async fn get(&self) -> Result<SelectedTask>;

    async fn set(&self, task: &SelectedTask) -> Result<()>;
}

pub struct FileTaskCache {
    path: PathBuf,
}

impl FileTaskCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_locked(&self) -> Result<String, std::io::Error> {
        let mut file = File::open(&self.path).await?;
        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        result.map(|_| content)
    }
}

#[async_trait]
impl SelectedTaskCache for FileTaskCache {
    async fn get(&self) -> Result<SelectedTask> {
        let content = match self.read_locked().await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No selected task stored at {:?}", self.path);
                return Ok(SelectedTask::default());
            }
            Err(e) => Err(e)?,
        };

        if content.trim().is_empty() {
            return Ok(SelectedTask::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn set(&self, task: &SelectedTask) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec(task)?;

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;
        file.lock_exclusive()?;
        let result = async {
            file.set_len(0).await?;
            file.write_all(&data).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        result?;

        debug!("Stored selected task {task:?}");
        Ok(())
    }
}
