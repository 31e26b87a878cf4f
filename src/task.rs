// src/task.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::project::load_project;
use crate::user_management::{UserDirectory, UserView};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default, with = "crate::store::bson_time::option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(with = "crate::store::bson_time")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::store::bson_time")]
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: String,
        project_id: String,
        title: String,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Task {
            id,
            project_id,
            title,
            description,
            status: TaskStatus::Todo,
            assignee: None,
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> ApiResult<()> {
        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ApiError::validation("Task title cannot be empty"));
            }
            self.title = title.to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(assignee) = patch.assignee {
            self.assignee = assignee.filter(|a| !a.trim().is_empty());
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = match due_date.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(parse_due_date(raw)?),
            };
        }
        self.updated_at = now;
        Ok(())
    }
}

/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(raw: &str) -> ApiResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| ApiError::validation(format!("Invalid dueDate: {raw}")))
}

/// Distinguishes an absent field from an explicit `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Partial update. `assignee` and `dueDate` are cleared by `null` or `""`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "present")]
    pub assignee: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assignee: Option<UserView>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskView {
    pub fn build(task: &Task, users: &UserDirectory) -> Self {
        TaskView {
            id: task.id.clone(),
            project_id: task.project_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            assignee: task.assignee.as_deref().and_then(|id| users.view(id)),
            due_date: task.due_date,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

async fn render_tasks(state: &AppState, tasks: &[Task]) -> ApiResult<Vec<TaskView>> {
    let assignees: Vec<String> = tasks.iter().filter_map(|t| t.assignee.clone()).collect();
    let users = UserDirectory::load(state.store.as_ref(), &assignees).await?;
    Ok(tasks.iter().map(|t| TaskView::build(t, &users)).collect())
}

async fn render_task(state: &AppState, task: &Task) -> ApiResult<TaskView> {
    let mut views = render_tasks(state, std::slice::from_ref(task)).await?;
    views.pop().ok_or_else(|| ApiError::NotFound("Task not found".into()))
}

/// POST /api/tasks
pub async fn create_task(
    _user: AuthUser,
    data: web::Data<AppState>,
    body: web::Json<CreateTaskRequest>,
) -> ApiResult<HttpResponse> {
    let CreateTaskRequest {
        project_id,
        title,
        description,
    } = body.into_inner();
    let title = title.trim().to_string();
    if project_id.trim().is_empty() || title.is_empty() {
        return Err(ApiError::validation("projectId and title are required"));
    }
    let project = load_project(&data, &project_id).await?;

    let task = Task::new(Uuid::new_v4().to_string(), project.id, title, description, Utc::now());
    data.store.insert_task(&task).await?;
    info!("Task {} created in project {}", task.id, task.project_id);

    metrics::refresh(data.store.as_ref(), &task.project_id).await;
    Ok(HttpResponse::Created().json(render_task(&data, &task).await?))
}

/// PATCH /api/tasks/{id}
pub async fn update_task(
    _user: AuthUser,
    data: web::Data<AppState>,
    id: web::Path<String>,
    patch: web::Json<TaskPatch>,
) -> ApiResult<HttpResponse> {
    debug!("Task {} patch: {:?}", id, patch);
    let mut task = data
        .store
        .find_task(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    let patch = patch.into_inner();
    let status_changed = patch.status.is_some();
    task.apply(patch, Utc::now())?;

    if !data.store.save_task(&task).await? {
        return Err(ApiError::NotFound("Task not found".into()));
    }
    if status_changed {
        metrics::refresh(data.store.as_ref(), &task.project_id).await;
    }
    Ok(HttpResponse::Ok().json(render_task(&data, &task).await?))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    _user: AuthUser,
    data: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let task = data
        .store
        .delete_task(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;
    info!("Task {} deleted from project {}", task.id, task.project_id);

    metrics::refresh(data.store.as_ref(), &task.project_id).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Task deleted" })))
}

/// GET /api/projects/{project_id}/tasks
pub async fn list_tasks(
    _user: AuthUser,
    data: web::Data<AppState>,
    project_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let tasks = data.store.list_tasks(&project_id).await?;
    Ok(HttpResponse::Ok().json(render_tasks(&data, &tasks).await?))
}
