#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web,
};
use async_trait::async_trait;
use serde_json::{json, Value};

use collabhub::app_state::AppState;
use collabhub::assets::{AssetError, AssetHost, CoverUpload};
use collabhub::chat::Message;
use collabhub::config::{AssetConfig, Config, StorageBackend};
use collabhub::metrics::ProjectMetrics;
use collabhub::project::Project;
use collabhub::store::{
    MemoryStore, MessageStore, ProjectStore, StoreError, StoreResult, TaskStore, UserStore,
};
use collabhub::task::Task;
use collabhub::user_management::User;

pub const SECRET: &str = "integration-secret";

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".into(),
        storage: StorageBackend::Memory,
        jwt_secret: SECRET.into(),
        token_ttl_hours: 1,
        bcrypt_cost: 4,
        frontend_origins: vec![],
        assets: AssetConfig::default(),
        max_upload_bytes: 1024,
    }
}

/// Records what the handlers asked the asset host to do.
#[derive(Default)]
pub struct StubAssets {
    pub uploads: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<String>>,
    /// Uploads answer as if the host returned a 502.
    pub reject_uploads: AtomicBool,
}

#[async_trait]
impl AssetHost for StubAssets {
    async fn upload(&self, cover: CoverUpload) -> Result<String, AssetError> {
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Err(AssetError::Rejected(502));
        }
        self.uploads.lock().unwrap().push(cover.file_name.clone());
        Ok(format!("https://assets.test/collabhub/projects/{}", cover.file_name))
    }

    async fn destroy(&self, url: &str) -> Result<(), AssetError> {
        self.destroyed.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Duplicate(format!("injected {what} failure"))
}

/// A [`MemoryStore`] whose individual writes can be switched to fail.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub fail_project_insert: AtomicBool,
    pub fail_project_delete: AtomicBool,
    pub fail_metrics: AtomicBool,
}

#[async_trait]
impl UserStore for FaultyStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_users(&self, ids: &[String]) -> StoreResult<Vec<User>> {
        self.inner.find_users(ids).await
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        self.inner.list_users().await
    }

    async fn save_user(&self, user: &User) -> StoreResult<bool> {
        self.inner.save_user(user).await
    }
}

#[async_trait]
impl ProjectStore for FaultyStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        if self.fail_project_insert.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        self.inner.insert_project(project).await
    }

    async fn find_project(&self, id: &str) -> StoreResult<Option<Project>> {
        self.inner.find_project(id).await
    }

    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        self.inner.list_projects().await
    }

    async fn save_project(&self, project: &Project) -> StoreResult<bool> {
        self.inner.save_project(project).await
    }

    async fn set_project_metrics(&self, id: &str, metrics: ProjectMetrics) -> StoreResult<()> {
        if self.fail_metrics.load(Ordering::SeqCst) {
            return Err(injected("metrics"));
        }
        self.inner.set_project_metrics(id, metrics).await
    }

    async fn delete_project(&self, id: &str) -> StoreResult<bool> {
        if self.fail_project_delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_project(id).await
    }
}

#[async_trait]
impl TaskStore for FaultyStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.inner.insert_task(task).await
    }

    async fn find_task(&self, id: &str) -> StoreResult<Option<Task>> {
        self.inner.find_task(id).await
    }

    async fn save_task(&self, task: &Task) -> StoreResult<bool> {
        self.inner.save_task(task).await
    }

    async fn delete_task(&self, id: &str) -> StoreResult<Option<Task>> {
        self.inner.delete_task(id).await
    }

    async fn list_tasks(&self, project_id: &str) -> StoreResult<Vec<Task>> {
        self.inner.list_tasks(project_id).await
    }

    async fn delete_tasks_for_project(&self, project_id: &str) -> StoreResult<u64> {
        self.inner.delete_tasks_for_project(project_id).await
    }
}

#[async_trait]
impl MessageStore for FaultyStore {
    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.inner.insert_message(message).await
    }

    async fn list_messages(&self, project_id: &str) -> StoreResult<Vec<Message>> {
        self.inner.list_messages(project_id).await
    }

    async fn delete_messages_for_project(&self, project_id: &str) -> StoreResult<u64> {
        self.inner.delete_messages_for_project(project_id).await
    }
}

pub fn fail(flag: &AtomicBool) {
    flag.store(true, Ordering::SeqCst);
}

pub struct Harness {
    pub state: web::Data<AppState>,
    pub store: Arc<FaultyStore>,
    pub assets: Arc<StubAssets>,
}

pub fn harness() -> Harness {
    let store = Arc::new(FaultyStore::default());
    let assets = Arc::new(StubAssets::default());
    let state = web::Data::new(AppState {
        store: store.clone(),
        assets: assets.clone(),
        config: test_config(),
    });
    Harness {
        state,
        store,
        assets,
    }
}

/// Mounts the real routing table behind the auth middleware.
macro_rules! init_app {
    ($harness:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(collabhub::auth::Authentication::new(common::SECRET))
                .app_data($harness.state.clone())
                .configure(collabhub::configure),
        )
        .await
    };
}

/// Runs a request and returns the status plus the body as JSON
/// (`Value::String` for non-JSON bodies, `Null` for empty ones).
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Signs a user up and returns `(token, user id)`.
pub async fn signup<S, B>(app: &S, name: &str, email: &str) -> (String, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({ "name": name, "email": email, "password": "hunter22" }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

/// Creates a JSON project owned by the token's user and returns its id.
pub async fn create_project<S, B>(app: &S, token: &str, body: Value) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/projects")
        .insert_header(bearer(token))
        .set_json(body)
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["id"].as_str().unwrap().to_string()
}
