//! Listing of synced tasks and the `N` / `N.M` selection used by `set`.

use std::fmt::Write;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::{
    cache::{SelectedTask, SelectedTaskCache},
    reconcile::prompt::{read_answer, Console},
    storage::{entities::TaskRecord, TaskStore},
};

fn main_tasks(tasks: &[TaskRecord]) -> Vec<&TaskRecord> {
    tasks.iter().filter(|task| task.is_main_task()).collect()
}

fn subtasks_of<'a>(tasks: &'a [TaskRecord], parent: &TaskRecord) -> Vec<&'a TaskRecord> {
    tasks
        .iter()
        .filter(|task| task.parent_task_id.as_deref() == Some(parent.task_id.as_str()))
        .collect()
}

/// Numbered main tasks, each followed by its numbered subtasks:
///
/// ```text
/// 1. Thesis (School):
///  [1]. Chapter 1
/// ```
pub fn render_task_list(tasks: &[TaskRecord]) -> String {
    let mut out = String::new();
    for (index, task) in main_tasks(tasks).into_iter().enumerate() {
        let _ = writeln!(out, "{}. {} ({}):", index + 1, task.name, task.project_name);
        for (sub_index, sub) in subtasks_of(tasks, task).into_iter().enumerate() {
            let _ = writeln!(out, " [{}]. {}", sub_index + 1, sub.name);
        }
    }
    out
}

/// Parses `N` or `N.M`. A missing or zero subtask number selects the main task itself.
pub fn parse_task_input(input: &str) -> Result<(usize, usize)> {
    let mut parts = input.splitn(2, '.');
    let main = parts
        .next()
        .unwrap_or_default()
        .parse::<usize>()
        .with_context(|| format!("Invalid main task number in '{input}'"))?;
    let sub = match parts.next() {
        Some(sub) => sub
            .parse::<usize>()
            .with_context(|| format!("Invalid sub task number in '{input}'"))?,
        None => 0,
    };
    Ok((main, sub))
}

/// Resolves 1-based numbers from [render_task_list] to a selection.
pub fn select_task(tasks: &[TaskRecord], main: usize, sub: usize) -> Result<SelectedTask> {
    let mains = main_tasks(tasks);
    let main_task = main
        .checked_sub(1)
        .and_then(|index| mains.get(index))
        .ok_or_else(|| anyhow!("Main task number {main} out of range"))?;

    let mut selected = SelectedTask {
        name: main_task.name.clone(),
        task_id: main_task.task_id.clone(),
        project: main_task.project_name.clone(),
        ..Default::default()
    };
    if sub == 0 {
        return Ok(selected);
    }

    let subs = subtasks_of(tasks, main_task);
    let Some(sub_task) = subs.get(sub - 1) else {
        bail!("Sub task number {sub} out of range");
    };
    selected.sub_name = sub_task.name.clone();
    selected.sub_id = sub_task.task_id.clone();
    if !sub_task.project_name.is_empty() {
        selected.project = sub_task.project_name.clone();
    }
    Ok(selected)
}

/// Shows the current selection and reads a new one. A blank answer keeps the current task.
pub fn choose_task(
    console: &mut dyn Console,
    tasks: &[TaskRecord],
    current: &SelectedTask,
) -> Result<SelectedTask> {
    console.write(&format!(
        "Current task: {}\nEnter the task number (e.g., 1.1): ",
        current.display_name()
    ))?;
    let answer = read_answer(console)?;
    if answer.is_empty() {
        console.write("Using previous task\n")?;
        return Ok(current.clone());
    }

    let (main, sub) = parse_task_input(&answer)?;
    select_task(tasks, main, sub)
}

/// The `set` command: list tasks, ask for one and remember it.
pub async fn set_task(
    console: &mut dyn Console,
    store: &dyn TaskStore,
    cache: &dyn SelectedTaskCache,
) -> Result<SelectedTask> {
    let tasks = store.tasks()?;
    console.write(&render_task_list(&tasks))?;

    let current = cache.get().await?;
    let selected = choose_task(console, &tasks, &current)?;
    console.write(&format!(
        "Selected task: {}, Project: {}\n",
        selected.display_name(),
        selected.project
    ))?;
    cache.set(&selected).await?;
    info!("Selected task {selected:?}");
    Ok(selected)
}
