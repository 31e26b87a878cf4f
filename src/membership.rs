// src/membership.rs

//! Join-request lifecycle on the project aggregate.
//!
//! A request goes PENDING -> ACCEPTED | REJECTED. Each transition, together
//! with the roster append it may cause, mutates one in-memory [`Project`]
//! that the handler then saves as a single document.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::project::{load_project, render, Project, TeamMember};
use crate::user_management::{UserDirectory, UserView};

pub const MEMBER_ROLE: &str = "Member";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JoinRequest {
    pub id: String,
    pub user: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(with = "crate::store::bson_time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MembershipError {
    #[error("Request already pending")]
    AlreadyPending,

    #[error("Not authorized")]
    NotOwner,

    #[error("Request not found")]
    RequestNotFound,
}

/// What a decision did, for logging.
#[derive(Debug, PartialEq, Eq)]
pub struct Transition {
    pub user: String,
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub joined_team: bool,
}

impl Project {
    pub fn has_pending_request(&self, user_id: &str) -> bool {
        self.join_requests
            .iter()
            .any(|r| r.user == user_id && r.status == RequestStatus::Pending)
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &JoinRequest> {
        self.join_requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
    }

    /// Appends a PENDING request and returns its id. Membership and the
    /// project's `needs*` flags are not checked here.
    pub fn submit_request(
        &mut self,
        user_id: &str,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<String, MembershipError> {
        if self.has_pending_request(user_id) {
            return Err(MembershipError::AlreadyPending);
        }
        let id = Uuid::new_v4().to_string();
        self.join_requests.push(JoinRequest {
            id: id.clone(),
            user: user_id.to_string(),
            message,
            status: RequestStatus::Pending,
            created_at: now,
        });
        Ok(id)
    }

    /// Marks the request ACCEPTED and adds the requester to the team unless
    /// already there. Any prior status is overwritten.
    pub fn accept_request(
        &mut self,
        request_id: &str,
        acting_user: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, MembershipError> {
        let (user, from) = self.decide(request_id, acting_user, RequestStatus::Accepted)?;

        let joined_team = !self.has_member(&user);
        if joined_team {
            self.team.push(TeamMember {
                user: user.clone(),
                role: MEMBER_ROLE.to_string(),
                joined_at: now,
            });
        }

        Ok(Transition {
            user,
            from,
            to: RequestStatus::Accepted,
            joined_team,
        })
    }

    /// Marks the request REJECTED. The team is never touched.
    pub fn reject_request(
        &mut self,
        request_id: &str,
        acting_user: &str,
    ) -> Result<Transition, MembershipError> {
        let (user, from) = self.decide(request_id, acting_user, RequestStatus::Rejected)?;
        Ok(Transition {
            user,
            from,
            to: RequestStatus::Rejected,
            joined_team: false,
        })
    }

    fn decide(
        &mut self,
        request_id: &str,
        acting_user: &str,
        to: RequestStatus,
    ) -> Result<(String, RequestStatus), MembershipError> {
        if !self.is_owner(acting_user) {
            return Err(MembershipError::NotOwner);
        }
        let request = self
            .join_requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(MembershipError::RequestNotFound)?;

        let from = request.status;
        request.status = to;
        Ok((request.user.clone(), from))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestView {
    pub id: String,
    /// `None` if the requester no longer exists.
    pub user: Option<UserView>,
    pub message: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl JoinRequestView {
    pub fn build(request: &JoinRequest, users: &UserDirectory) -> Self {
        JoinRequestView {
            id: request.id.clone(),
            user: users.view(&request.user),
            message: request.message.clone(),
            status: request.status,
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct JoinPayload {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequestPath {
    pub project_id: String,
    pub request_id: String,
}

/// POST /api/projects/{id}/join (also /request)
pub async fn join_project(
    user: AuthUser,
    data: web::Data<AppState>,
    id: web::Path<String>,
    payload: Option<web::Json<JoinPayload>>,
) -> ApiResult<HttpResponse> {
    let message = payload
        .and_then(|body| body.into_inner().message)
        .unwrap_or_default();
    let mut project = load_project(&data, &id).await?;

    let request_id = project.submit_request(&user.0, message, Utc::now())?;
    if !data.store.save_project(&project).await? {
        return Err(ApiError::NotFound("Project not found".into()));
    }
    info!("User {} requested to join project {} ({})", user.0, project.id, request_id);

    Ok(HttpResponse::Created().json(render(&data, &project).await?))
}

/// POST /api/projects/{project_id}/requests/{request_id}/accept
pub async fn accept_request(
    user: AuthUser,
    data: web::Data<AppState>,
    path: web::Path<RequestPath>,
) -> ApiResult<HttpResponse> {
    let mut project = load_project(&data, &path.project_id).await?;

    let transition = project.accept_request(&path.request_id, &user.0, Utc::now())?;
    if transition.from == RequestStatus::Rejected {
        warn!(
            "Request {} on project {} accepted after being rejected",
            path.request_id, project.id
        );
    }
    if !data.store.save_project(&project).await? {
        return Err(ApiError::NotFound("Project not found".into()));
    }
    info!(
        "Accepted {} into project {} (new member: {})",
        transition.user, project.id, transition.joined_team
    );

    Ok(HttpResponse::Ok().json(render(&data, &project).await?))
}

/// POST /api/projects/{project_id}/requests/{request_id}/reject
pub async fn reject_request(
    user: AuthUser,
    data: web::Data<AppState>,
    path: web::Path<RequestPath>,
) -> ApiResult<HttpResponse> {
    let mut project = load_project(&data, &path.project_id).await?;

    let transition = project.reject_request(&path.request_id, &user.0)?;
    if transition.from == RequestStatus::Accepted {
        warn!(
            "Request {} on project {} rejected after being accepted",
            path.request_id, project.id
        );
    }
    if !data.store.save_project(&project).await? {
        return Err(ApiError::NotFound("Project not found".into()));
    }
    debug!("Rejected {} on project {}", transition.user, project.id);

    Ok(HttpResponse::Ok().json(render(&data, &project).await?))
}
