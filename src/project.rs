// src/project.rs

use std::cmp::Reverse;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use actix_multipart::Multipart;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::assets::{AssetError, CoverUpload};
use crate::auth::AuthUser;
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::{ApiError, ApiResult};
use crate::membership::{JoinRequest, JoinRequestView};
use crate::metrics::ProjectMetrics;
use crate::user_management::{UserDirectory, UserView};

pub const OWNER_ROLE: &str = "Owner";
pub const COVER_FIELD: &str = "coverImage";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Open,
    Active,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TeamMember {
    pub user: String,
    pub role: String,
    #[serde(with = "crate::store::bson_time")]
    pub joined_at: DateTime<Utc>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoleNeeded {
    pub role: String,
    #[serde(default = "one")]
    pub count: u32,
}

/// The project aggregate. Team roster and join requests are embedded, so
/// every membership change is one document write.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub cover_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub team: Vec<TeamMember>,
    #[serde(default)]
    pub roles_needed: Vec<RoleNeeded>,
    #[serde(default)]
    pub join_requests: Vec<JoinRequest>,
    #[serde(default = "one")]
    pub team_members_required: u32,
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub needs_team_members: bool,
    #[serde(default)]
    pub needs_contributors: bool,
    #[serde(default)]
    pub contribution_requirements: String,
    #[serde(default)]
    pub metrics: ProjectMetrics,
    #[serde(with = "crate::store::bson_time")]
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// New project with the owner as its only team member.
    pub fn create(id: String, owner: &str, input: NewProject, cover_url: String, now: DateTime<Utc>) -> Self {
        Project {
            id,
            owner: owner.to_string(),
            title: input.title.trim().to_string(),
            description: input.description,
            cover_url,
            tags: input.tags,
            tech_stack: input.tech_stack,
            status: ProjectStatus::Open,
            team: vec![TeamMember {
                user: owner.to_string(),
                role: OWNER_ROLE.to_string(),
                joined_at: now,
            }],
            roles_needed: input.roles_needed,
            join_requests: Vec::new(),
            team_members_required: input.team_members_required.unwrap_or(1),
            skills_required: input.skills_required,
            needs_team_members: input.needs_team_members,
            needs_contributors: input.needs_contributors,
            contribution_requirements: input.contribution_requirements,
            metrics: ProjectMetrics::default(),
            created_at: now,
        }
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner == user_id
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.team.iter().any(|m| m.user == user_id)
    }

    /// Every user id this document points at.
    pub fn referenced_users(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.owner)
            .chain(self.team.iter().map(|m| &m.user))
            .chain(self.join_requests.iter().map(|r| &r.user))
    }

    /// Owner and every team member still exist.
    pub fn resolvable(&self, users: &UserDirectory) -> bool {
        users.contains(&self.owner) && self.team.iter().all(|m| users.contains(&m.user))
    }

    #[cfg(test)]
    pub(crate) fn fixture(id: &str, owner: &str) -> Project {
        let input = NewProject {
            title: format!("Project {id}"),
            description: "A test project".into(),
            ..NewProject::default()
        };
        Project::create(id.to_string(), owner, input, String::new(), Utc::now())
    }
}

mod lenient {
    //! Form fields arrive as strings; JSON clients may send either shape.

    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OrText<T> {
        Value(T),
        Text(String),
    }

    pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Option::<OrText<Vec<T>>>::deserialize(deserializer)? {
            None => Ok(Vec::new()),
            Some(OrText::Value(items)) => Ok(items),
            Some(OrText::Text(text)) if text.trim().is_empty() => Ok(Vec::new()),
            Some(OrText::Text(text)) => serde_json::from_str(&text)
                .map_err(|_| D::Error::custom("Invalid JSON in form fields")),
        }
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<OrText<bool>>::deserialize(deserializer)? {
            Some(OrText::Value(value)) => value,
            Some(OrText::Text(text)) => text.trim() == "true",
            None => false,
        })
    }

    /// Positive counts only; anything else falls back to the caller's default.
    pub fn count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match Option::<OrText<f64>>::deserialize(deserializer)? {
            Some(OrText::Value(n)) => Some(n),
            Some(OrText::Text(text)) => text.trim().parse::<f64>().ok(),
            None => None,
        };
        Ok(raw.map(f64::trunc).filter(|n| *n >= 1.0).map(|n| n as u32))
    }
}

/// Project creation input, shared by the JSON body, the multipart form and
/// the client.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    #[serde(deserialize_with = "lenient::list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub tech_stack: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub roles_needed: Vec<RoleNeeded>,
    #[serde(deserialize_with = "lenient::count", skip_serializing_if = "Option::is_none")]
    pub team_members_required: Option<u32>,
    #[serde(deserialize_with = "lenient::list")]
    pub skills_required: Vec<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub needs_team_members: bool,
    #[serde(deserialize_with = "lenient::flag")]
    pub needs_contributors: bool,
    pub contribution_requirements: String,
}

impl NewProject {
    /// Multipart text fields: lists are JSON-encoded, booleans and numbers are text.
    pub fn from_form(fields: HashMap<String, String>) -> ApiResult<Self> {
        let object: serde_json::Map<String, Value> = fields
            .into_iter()
            .map(|(name, value)| (name, Value::String(value)))
            .collect();
        serde_json::from_value(Value::Object(object)).map_err(|e| ApiError::Validation(e.to_string()))
    }

    /// Inverse of [`NewProject::from_form`].
    pub fn to_form_fields(&self) -> Result<Vec<(String, String)>, serde_json::Error> {
        let Value::Object(object) = serde_json::to_value(self)? else {
            return Ok(Vec::new());
        };
        Ok(object
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| match value {
                Value::String(text) => (name, text),
                other => (name, other.to_string()),
            })
            .collect())
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(ApiError::validation("title and description are required"));
        }
        Ok(())
    }
}

/// A project creation body, classified once by content type.
#[derive(Debug)]
pub enum ProjectPayload {
    Json(NewProject),
    Multipart {
        fields: HashMap<String, String>,
        cover: Option<CoverUpload>,
    },
}

impl ProjectPayload {
    pub fn resolve(self) -> ApiResult<(NewProject, Option<CoverUpload>)> {
        match self {
            ProjectPayload::Json(input) => Ok((input, None)),
            ProjectPayload::Multipart { fields, cover } => Ok((NewProject::from_form(fields)?, cover)),
        }
    }
}

async fn read_multipart(mut multipart: Multipart, limit: usize) -> ApiResult<ProjectPayload> {
    let mut fields = HashMap::new();
    let mut cover = None;

    while let Some(mut field) = multipart.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if bytes.len() + chunk.len() > limit {
                return Err(AssetError::TooLarge { limit }.into());
            }
            bytes.extend_from_slice(&chunk);
        }

        if name == COVER_FIELD {
            if let Some(file_name) = file_name.filter(|_| !bytes.is_empty()) {
                cover = Some(CoverUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
        } else {
            let value = String::from_utf8(bytes)
                .map_err(|_| ApiError::validation(format!("Field {name} is not valid text")))?;
            fields.insert(name, value);
        }
    }

    Ok(ProjectPayload::Multipart { fields, cover })
}

impl FromRequest for ProjectPayload {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let limit = req
                .app_data::<web::Data<AppState>>()
                .map(|state| state.config.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
            let multipart = Multipart::new(req.headers(), payload.take());
            Box::pin(read_multipart(multipart, limit))
        } else {
            let json = web::Json::<NewProject>::from_request(req, payload);
            Box::pin(async move {
                json.await
                    .map(|body| ProjectPayload::Json(body.into_inner()))
                    .map_err(|e| ApiError::Validation(e.to_string()))
            })
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberView {
    pub user: UserView,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

/// The only shape in which a project crosses the HTTP boundary.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub owner: UserView,
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub tags: Vec<String>,
    pub tech_stack: Vec<String>,
    pub status: ProjectStatus,
    pub team: Vec<TeamMemberView>,
    pub roles_needed: Vec<RoleNeeded>,
    pub join_requests: Vec<JoinRequestView>,
    pub team_members_required: u32,
    pub skills_required: Vec<String>,
    pub needs_team_members: bool,
    pub needs_contributors: bool,
    pub contribution_requirements: String,
    pub metrics: ProjectMetrics,
    pub created_at: DateTime<Utc>,
}

impl ProjectView {
    /// `None` when the owner or a team member no longer resolves.
    pub fn build(project: &Project, users: &UserDirectory) -> Option<Self> {
        let owner = users.view(&project.owner)?;
        let team = project
            .team
            .iter()
            .map(|member| {
                Some(TeamMemberView {
                    user: users.view(&member.user)?,
                    role: member.role.clone(),
                    joined_at: member.joined_at,
                })
            })
            .collect::<Option<Vec<_>>>()?;

        Some(ProjectView {
            id: project.id.clone(),
            owner,
            title: project.title.clone(),
            description: project.description.clone(),
            cover_url: project.cover_url.clone(),
            tags: project.tags.clone(),
            tech_stack: project.tech_stack.clone(),
            status: project.status,
            team,
            roles_needed: project.roles_needed.clone(),
            join_requests: project
                .join_requests
                .iter()
                .map(|request| JoinRequestView::build(request, users))
                .collect(),
            team_members_required: project.team_members_required,
            skills_required: project.skills_required.clone(),
            needs_team_members: project.needs_team_members,
            needs_contributors: project.needs_contributors,
            contribution_requirements: project.contribution_requirements.clone(),
            metrics: project.metrics,
            created_at: project.created_at,
        })
    }
}

/// Loads the users a batch of projects references, in one query.
pub async fn directory_for(state: &AppState, projects: &[Project]) -> ApiResult<UserDirectory> {
    let ids: Vec<String> = projects
        .iter()
        .flat_map(Project::referenced_users)
        .cloned()
        .collect();
    Ok(UserDirectory::load(state.store.as_ref(), &ids).await?)
}

/// Renders a single project, treating unresolvable references as a 404.
pub async fn render(state: &AppState, project: &Project) -> ApiResult<ProjectView> {
    let users = directory_for(state, std::slice::from_ref(project)).await?;
    ProjectView::build(project, &users).ok_or_else(|| ApiError::NotFound("Project not available".into()))
}

pub async fn load_project(state: &AppState, id: &str) -> ApiResult<Project> {
    state
        .store
        .find_project(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectSort {
    #[default]
    Newest,
    Active,
    Top,
}

/// Discovery filters for `GET /api/projects`.
#[derive(Debug, Deserialize, Default)]
pub struct ProjectQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProjectStatus>,
    pub tech: Option<String>,
    pub sort: Option<ProjectSort>,
}

impl ProjectQuery {
    pub fn matches(&self, project: &Project) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !project.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let category = category.to_lowercase();
            if !project.tags.iter().any(|tag| tag.to_lowercase().contains(&category)) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if project.status != status {
                return false;
            }
        }
        if let Some(tech) = self.tech.as_deref() {
            let wanted: Vec<&str> = tech.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
            if !wanted.is_empty() && !wanted.iter().any(|t| project.tech_stack.iter().any(|s| s == t)) {
                return false;
            }
        }
        true
    }

    /// Filters, then stable-sorts. Input is expected newest first.
    pub fn apply(&self, projects: Vec<Project>) -> Vec<Project> {
        let mut projects: Vec<Project> = projects.into_iter().filter(|p| self.matches(p)).collect();
        match self.sort.unwrap_or_default() {
            ProjectSort::Newest => {}
            ProjectSort::Active => projects
                .sort_by_key(|p| Reverse(u64::from(p.metrics.tasks_done) + p.team.len() as u64)),
            ProjectSort::Top => projects.sort_by_key(|p| Reverse(p.metrics.tasks_done)),
        }
        projects
    }
}

/// GET /api/projects
pub async fn list_projects(
    data: web::Data<AppState>,
    query: web::Query<ProjectQuery>,
) -> ApiResult<HttpResponse> {
    debug!("Listing projects with {:?}", query);
    let projects = query.apply(data.store.list_projects().await?);
    let users = directory_for(&data, &projects).await?;
    let views: Vec<ProjectView> = projects
        .iter()
        .filter_map(|p| ProjectView::build(p, &users))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

/// POST /api/projects
/// Accepts a JSON body or a multipart form with an optional `coverImage`.
pub async fn create_project(
    user: AuthUser,
    data: web::Data<AppState>,
    payload: ProjectPayload,
) -> ApiResult<HttpResponse> {
    if data.store.find_user(&user.0).await?.is_none() {
        return Err(ApiError::validation("Owner user not found"));
    }

    let (input, cover) = payload.resolve()?;
    debug!("Creating project for {}: {:?}", user.0, input);
    input.validate()?;

    let cover_url = match cover {
        Some(cover) => {
            cover.validate(data.config.max_upload_bytes)?;
            data.assets.upload(cover).await?
        }
        None => String::new(),
    };

    let project = Project::create(Uuid::new_v4().to_string(), &user.0, input, cover_url, Utc::now());
    if let Err(e) = data.store.insert_project(&project).await {
        if !project.cover_url.is_empty() {
            if let Err(destroy_err) = data.assets.destroy(&project.cover_url).await {
                error!("Failed to clean up cover {}: {}", project.cover_url, destroy_err);
            }
        }
        return Err(e.into());
    }
    info!("Project {} created by {}", project.id, user.0);

    let view = render(&data, &project).await?;
    Ok(HttpResponse::Created().json(view))
}

/// GET /api/projects/{id}
pub async fn get_project(data: web::Data<AppState>, id: web::Path<String>) -> ApiResult<HttpResponse> {
    let project = load_project(&data, &id).await?;
    Ok(HttpResponse::Ok().json(render(&data, &project).await?))
}

/// DELETE /api/projects/{id}
/// Owner only. Removes the project's tasks and messages too.
pub async fn delete_project(
    user: AuthUser,
    data: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let project = load_project(&data, &id).await?;
    if !project.is_owner(&user.0) {
        return Err(ApiError::Forbidden("Not authorized".into()));
    }

    let tasks = data.store.delete_tasks_for_project(&project.id).await?;
    let messages = data.store.delete_messages_for_project(&project.id).await?;
    data.store.delete_project(&project.id).await?;
    info!(
        "Project {} deleted with {} tasks and {} messages",
        project.id, tasks, messages
    );

    // cover goes last; the project must already be gone
    if !project.cover_url.is_empty() {
        if let Err(e) = data.assets.destroy(&project.cover_url).await {
            error!("Failed to delete cover image {}: {}", project.cover_url, e);
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Project deleted successfully" })))
}
