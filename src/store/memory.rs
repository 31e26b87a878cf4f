use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MessageStore, ProjectStore, StoreError, StoreResult, TaskStore, UserStore};
use crate::chat::Message;
use crate::metrics::ProjectMetrics;
use crate::project::Project;
use crate::task::Task;
use crate::user_management::User;

/// In-process store with the same per-document write semantics as Mongo:
/// each save swaps a whole record under the collection lock.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    projects: RwLock<Vec<Project>>,
    tasks: RwLock<Vec<Task>>,
    messages: RwLock<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T>(items: &mut [T], matches: impl Fn(&T) -> bool, value: &T) -> bool
where
    T: Clone,
{
    match items.iter_mut().find(|item| matches(item)) {
        Some(slot) => {
            *slot = value.clone();
            true
        }
        None => false,
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("User".into()));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn find_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn save_user(&self, user: &User) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        Ok(replace(&mut users, |u| u.id == user.id, user))
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.projects.write().await.push(project.clone());
        Ok(())
    }

    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>> {
        Ok(self.projects.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        // reverse first so equal timestamps still come out newest-inserted first
        let mut projects: Vec<Project> = self.projects.read().await.iter().rev().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn save_project(&self, project: &Project) -> StoreResult<bool> {
        let mut projects = self.projects.write().await;
        Ok(replace(&mut projects, |p| p.id == project.id, project))
    }

    async fn set_project_metrics(&self, id: &str, metrics: ProjectMetrics) -> StoreResult<()> {
        let mut projects = self.projects.write().await;
        if let Some(project) = projects.iter_mut().find(|p| p.id == id) {
            project.metrics = metrics;
        }
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> StoreResult<bool> {
        let mut projects = self.projects.write().await;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        Ok(projects.len() != before)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.tasks.write().await.push(task.clone());
        Ok(())
    }

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn save_task(&self, task: &Task) -> StoreResult<bool> {
        let mut tasks = self.tasks.write().await;
        Ok(replace(&mut tasks, |t| t.id == task.id, task))
    }

    async fn delete_task(&self, id: &str) -> StoreResult<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        let removed = tasks
            .iter()
            .position(|t| t.id == id)
            .map(|idx| tasks.remove(idx));
        Ok(removed)
    }

    async fn list_tasks(&self, project_id: &str) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .iter()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn delete_tasks_for_project(&self, project_id: &str) -> StoreResult<u64> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| t.project_id != project_id);
        Ok((before - tasks.len()) as u64)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, project_id: &str) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn delete_messages_for_project(&self, project_id: &str) -> StoreResult<u64> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| m.project_id != project_id);
        Ok((before - messages.len()) as u64)
    }
}
