// File: chat.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::project::load_project;
use crate::user_management::{UserDirectory, UserView};

/// One entry in a project's append-only chat log.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_id: String,
    pub user: String,
    pub text: String,
    #[serde(with = "crate::store::bson_time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub project_id: String,
    pub user: Option<UserView>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    pub fn build(message: &Message, users: &UserDirectory) -> Self {
        MessageView {
            id: message.id.clone(),
            project_id: message.project_id.clone(),
            user: users.view(&message.user),
            text: message.text.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub text: String,
}

/// GET /api/projects/{project_id}/chat
/// Full history, oldest first.
pub async fn get_messages(
    _user: AuthUser,
    data: web::Data<AppState>,
    project_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let messages = data.store.list_messages(&project_id).await?;
    let authors: Vec<String> = messages.iter().map(|m| m.user.clone()).collect();
    let users = UserDirectory::load(data.store.as_ref(), &authors).await?;

    let views: Vec<MessageView> = messages
        .iter()
        .map(|m| MessageView::build(m, &users))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

/// POST /api/projects/{project_id}/chat
pub async fn post_message(
    user: AuthUser,
    data: web::Data<AppState>,
    project_id: web::Path<String>,
    body: web::Json<PostMessageRequest>,
) -> ApiResult<HttpResponse> {
    let text = body.into_inner().text;
    if text.trim().is_empty() {
        return Err(ApiError::validation("Message text required"));
    }
    let project = load_project(&data, &project_id).await?;

    let message = Message {
        id: Uuid::new_v4().to_string(),
        project_id: project.id,
        user: user.0,
        text,
        created_at: Utc::now(),
    };
    data.store.insert_message(&message).await?;
    debug!("Message {} posted to project {}", message.id, message.project_id);

    let users = UserDirectory::load(data.store.as_ref(), std::slice::from_ref(&message.user)).await?;
    Ok(HttpResponse::Created().json(MessageView::build(&message, &users)))
}
