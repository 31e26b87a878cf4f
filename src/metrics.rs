// src/metrics.rs

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::store::{Store, StoreResult};
use crate::task::{Task, TaskStatus};

/// Derived per-project task counters. Only ever written by [`recompute`].
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetrics {
    pub tasks_total: u32,
    pub tasks_done: u32,
}

pub fn tally(tasks: &[Task]) -> ProjectMetrics {
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    ProjectMetrics {
        tasks_total: tasks.len() as u32,
        tasks_done: done as u32,
    }
}

/// Full recount from the task collection, then one write of both counters.
pub async fn recompute(store: &dyn Store, project_id: &str) -> StoreResult<ProjectMetrics> {
    let tasks = store.list_tasks(project_id).await?;
    let metrics = tally(&tasks);
    store.set_project_metrics(project_id, metrics).await?;
    debug!(
        "Metrics for project {}: {}/{} done",
        project_id, metrics.tasks_done, metrics.tasks_total
    );
    Ok(metrics)
}

/// Like [`recompute`], but a failure only leaves the counters stale.
pub async fn refresh(store: &dyn Store, project_id: &str) {
    if let Err(e) = recompute(store, project_id).await {
        error!("Failed to recompute metrics for project {}: {}", project_id, e);
    }
}
