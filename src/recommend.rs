// src/recommend.rs

//! Project suggestions for a user, scored on skill and category overlap.
//!
//! Matching is plain case-insensitive substring containment, so short
//! names can overlap unrelated words ("go" inside "django").

use actix_web::{web, HttpResponse};
use log::debug;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::leaderboard::rank_by;
use crate::project::{directory_for, Project, ProjectStatus, ProjectView};
use crate::user_management::User;

pub const SUGGESTION_LIMIT: usize = 10;

/// Only OPEN projects the user does not own are scored.
pub fn is_candidate(project: &Project, user: &User) -> bool {
    project.status == ProjectStatus::Open && !project.is_owner(&user.id)
}

/// `2 × skill overlap + category overlap + 1`.
pub fn score(project: &Project, user: &User) -> u64 {
    let skills: Vec<String> = user.skills.iter().map(|s| s.to_lowercase()).collect();
    let categories: Vec<String> = user
        .preferences
        .categories
        .iter()
        .map(|c| c.to_lowercase())
        .collect();

    let skill_overlap = project
        .tech_stack
        .iter()
        .filter(|tech| {
            let tech = tech.to_lowercase();
            skills.iter().any(|s| s.contains(&tech))
        })
        .count() as u64;

    let category_overlap = project
        .tags
        .iter()
        .filter(|tag| {
            let tag = tag.to_lowercase();
            categories.iter().any(|c| tag.contains(c.as_str()))
        })
        .count() as u64;

    2 * skill_overlap + category_overlap + 1
}

/// Best-scoring candidates first; ties keep input order.
pub fn suggest(projects: Vec<Project>, user: &User, limit: usize) -> Vec<Project> {
    let candidates: Vec<Project> = projects
        .into_iter()
        .filter(|p| is_candidate(p, user))
        .collect();
    rank_by(candidates, |p| score(p, user), limit)
        .into_iter()
        .map(|r| r.item)
        .collect()
}

/// GET /api/match/suggested
pub async fn get_suggested(user: AuthUser, data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let Some(me) = data.store.find_user(&user.0).await? else {
        return Ok(HttpResponse::Ok().json(Vec::<ProjectView>::new()));
    };

    let projects = data.store.list_projects().await?;
    let users = directory_for(&data, &projects).await?;
    let resolvable: Vec<Project> = projects.into_iter().filter(|p| p.resolvable(&users)).collect();

    let picks = suggest(resolvable, &me, SUGGESTION_LIMIT);
    debug!("Suggesting {} projects to {}", picks.len(), me.id);

    let views: Vec<ProjectView> = picks
        .iter()
        .filter_map(|p| ProjectView::build(p, &users))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}
