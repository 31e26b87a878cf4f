//! Persistence ports. Handlers only see `dyn Store`; `MongoStore` backs
//! production and `MemoryStore` backs tests and `STORAGE_BACKEND=memory`.

pub mod bson_time;
mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::chat::Message;
use crate::metrics::ProjectMetrics;
use crate::project::Project;
use crate::task::Task;
use crate::user_management::User;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database request failed: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// A unique key was violated; carries the entity name.
    #[error("duplicate {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[String]) -> StoreResult<Vec<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn save_user(&self, user: &User) -> StoreResult<bool>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;
    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>>;
    /// Newest first.
    async fn list_projects(&self) -> StoreResult<Vec<Project>>;
    /// Replaces the whole aggregate in a single write. `false` if it no longer exists.
    async fn save_project(&self, project: &Project) -> StoreResult<bool>;
    /// Overwrites both counters in a single write.
    async fn set_project_metrics(&self, id: &str, metrics: ProjectMetrics) -> StoreResult<()>;
    async fn delete_project(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: &Task) -> StoreResult<()>;
    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>>;
    async fn save_task(&self, task: &Task) -> StoreResult<bool>;
    async fn delete_task(&self, id: &str) -> StoreResult<Option<Task>>;
    /// Oldest first.
    async fn list_tasks(&self, project_id: &str) -> StoreResult<Vec<Task>>;
    async fn delete_tasks_for_project(&self, project_id: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &Message) -> StoreResult<()>;
    /// Oldest first.
    async fn list_messages(&self, project_id: &str) -> StoreResult<Vec<Message>>;
    async fn delete_messages_for_project(&self, project_id: &str) -> StoreResult<u64>;
}

pub trait Store: UserStore + ProjectStore + TaskStore + MessageStore {}

impl<T> Store for T where T: UserStore + ProjectStore + TaskStore + MessageStore {}
