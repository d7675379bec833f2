//! Minimal ClickUp v2 client. Only the calls needed to mirror spaces, lists and tasks into the
//! local task table are implemented.

use futures::{stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::storage::{entities::TaskRecord, TaskStore};

pub const DEFAULT_BASE_URL: &str = "https://api.clickup.com/api/v2";

/// Lists whose tasks are fetched at the same time.
const CONCURRENT_LIST_FETCHES: usize = 4;

#[derive(Debug, Error)]
pub enum ClickUpError {
    #[error("ClickUp API error {code}: {message}")]
    Api {
        status: StatusCode,
        message: String,
        code: String,
    },
    #[error("request to ClickUp failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response from ClickUp: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    err: String,
    #[serde(rename = "ECODE", default)]
    code: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Space {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct List {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TaskStatus {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TaskInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub parent: Option<String>,
}

impl TaskInfo {
    pub fn into_record(self, project_name: &str) -> TaskRecord {
        TaskRecord {
            task_id: self.id,
            name: self.name,
            status: self.status.status,
            parent_task_id: self.parent.filter(|v| !v.is_empty()),
            project_name: project_name.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct SpacesResponse {
    spaces: Vec<Space>,
}

#[derive(Deserialize)]
struct ListsResponse {
    lists: Vec<List>,
}

#[derive(Deserialize)]
struct TasksResponse {
    tasks: Vec<TaskInfo>,
}

pub struct ClickUpClient {
    client: Client,
    base_url: String,
    token: String,
    team_id: String,
}

impl ClickUpClient {
    pub fn new(token: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, token, team_id)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            team_id: team_id.into(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ClickUpError> {
        let url = format!("{}{endpoint}", self.base_url);
        debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if status != StatusCode::OK {
            let api_error = serde_json::from_slice::<ApiErrorBody>(&body)?;
            return Err(ClickUpError::Api {
                status,
                message: api_error.err,
                code: api_error.code,
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn spaces(&self) -> Result<Vec<Space>, ClickUpError> {
        let response: SpacesResponse = self.get(&format!("/team/{}/space", self.team_id)).await?;
        Ok(response.spaces)
    }

    pub async fn lists(&self, space_id: &str) -> Result<Vec<List>, ClickUpError> {
        let response: ListsResponse = self.get(&format!("/space/{space_id}/list")).await?;
        Ok(response.lists)
    }

    /// Tasks of a list, subtasks included.
    pub async fn tasks(&self, list_id: &str) -> Result<Vec<TaskInfo>, ClickUpError> {
        let response: TasksResponse = self
            .get(&format!("/list/{list_id}/task?subtasks=true"))
            .await?;
        Ok(response.tasks)
    }
}

/// Mirrors every task of the team into `store`, tagging tasks with the name of their space.
/// Failing to list the spaces aborts the sync, a list that can't be fetched is skipped.
/// Returns the number of tasks written.
#[instrument(skip_all)]
pub async fn sync_tasks(client: &ClickUpClient, store: &dyn TaskStore) -> anyhow::Result<usize> {
    let spaces = client.spaces().await?;
    info!("Syncing {} space(s)", spaces.len());

    let mut synced = 0;
    for space in &spaces {
        let lists = match client.lists(&space.id).await {
            Ok(lists) => lists,
            Err(e) => {
                error!("Failed to fetch lists for space {}: {e}", space.id);
                continue;
            }
        };

        let fetched = stream::iter(lists)
            .map(|list| async move {
                let tasks = client.tasks(&list.id).await;
                (list, tasks)
            })
            .buffered(CONCURRENT_LIST_FETCHES)
            .collect::<Vec<_>>()
            .await;

        for (list, tasks) in fetched {
            match tasks {
                Ok(tasks) => {
                    let records = tasks
                        .into_iter()
                        .map(|task| task.into_record(&space.name))
                        .collect::<Vec<_>>();
                    store.upsert_tasks(&records)?;
                    debug!("Synced {} task(s) of list {}", records.len(), list.name);
                    synced += records.len();
                }
                Err(e) => error!("Failed to fetch tasks for list {}: {e}", list.id),
            }
        }
    }

    Ok(synced)
}
