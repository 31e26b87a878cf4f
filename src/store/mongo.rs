use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::info;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};

use super::{MessageStore, ProjectStore, StoreError, StoreResult, TaskStore, UserStore};
use crate::chat::Message;
use crate::metrics::ProjectMetrics;
use crate::project::Project;
use crate::task::Task;
use crate::user_management::User;

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn init(uri: &str, db_name: &str) -> StoreResult<Self> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let store = MongoStore {
            db: client.database(db_name),
        };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database {}", db_name);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users().create_index(unique_email).await?;

        let by_project = || IndexModel::builder().keys(doc! { "project_id": 1 }).build();
        self.tasks().create_index(by_project()).await?;
        self.messages().create_index(by_project()).await?;
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }

    fn tasks(&self) -> Collection<Task> {
        self.db.collection("tasks")
    }

    fn messages(&self) -> Collection<Message> {
        self.db.collection("messages")
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        match self.users().insert_one(user).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate("User".into())),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": id }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users().find_one(doc! { "email": email }).await?)
    }

    async fn find_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self.users().find(doc! { "_id": { "$in": ids.to_vec() } }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let cursor = self.users().find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn save_user(&self, user: &User) -> StoreResult<bool> {
        let res = self.users().replace_one(doc! { "_id": &user.id }, user).await?;
        Ok(res.matched_count == 1)
    }
}

#[async_trait]
impl ProjectStore for MongoStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        self.projects().insert_one(project).await?;
        Ok(())
    }

    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>> {
        Ok(self.projects().find_one(doc! { "_id": id }).await?)
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let cursor = self
            .projects()
            .find(doc! {})
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn save_project(&self, project: &Project) -> StoreResult<bool> {
        let res = self
            .projects()
            .replace_one(doc! { "_id": &project.id }, project)
            .await?;
        Ok(res.matched_count == 1)
    }

    async fn set_project_metrics(&self, id: &str, metrics: ProjectMetrics) -> StoreResult<()> {
        self.projects()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "metrics.tasksTotal": i64::from(metrics.tasks_total),
                    "metrics.tasksDone": i64::from(metrics.tasks_done),
                } },
            )
            .await?;
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> StoreResult<bool> {
        let res = self.projects().delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count == 1)
    }
}

#[async_trait]
impl TaskStore for MongoStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.tasks().insert_one(task).await?;
        Ok(())
    }

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks().find_one(doc! { "_id": id }).await?)
    }

    async fn save_task(&self, task: &Task) -> StoreResult<bool> {
        let res = self.tasks().replace_one(doc! { "_id": &task.id }, task).await?;
        Ok(res.matched_count == 1)
    }

    async fn delete_task(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks().find_one_and_delete(doc! { "_id": id }).await?)
    }

    async fn list_tasks(&self, project_id: &str) -> StoreResult<Vec<Task>> {
        let cursor = self
            .tasks()
            .find(doc! { "project_id": project_id })
            .sort(doc! { "created_at": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_tasks_for_project(&self, project_id: &str) -> StoreResult<u64> {
        let res = self.tasks().delete_many(doc! { "project_id": project_id }).await?;
        Ok(res.deleted_count)
    }
}

#[async_trait]
impl MessageStore for MongoStore {
    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.messages().insert_one(message).await?;
        Ok(())
    }

    async fn list_messages(&self, project_id: &str) -> StoreResult<Vec<Message>> {
        let cursor = self
            .messages()
            .find(doc! { "project_id": project_id })
            .sort(doc! { "created_at": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_messages_for_project(&self, project_id: &str) -> StoreResult<u64> {
        let res = self.messages().delete_many(doc! { "project_id": project_id }).await?;
        Ok(res.deleted_count)
    }
}
