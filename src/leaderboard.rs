// src/leaderboard.rs

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiResult;
use crate::project::{directory_for, ProjectView};
use crate::user_management::UserView;

pub const LEADERBOARD_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub score: u64,
    /// 1-based.
    pub rank: usize,
}

/// Highest score first, ties kept in input order, cut to `limit`.
pub fn rank_by<T, F>(items: Vec<T>, score: F, limit: usize) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> u64,
{
    let mut scored: Vec<(u64, T)> = items.into_iter().map(|item| (score(&item), item)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (score, item))| Ranked {
            item,
            score,
            rank: idx + 1,
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProjectEntry {
    pub project: ProjectView,
    pub score: u64,
    pub rank: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContributorEntry {
    pub user: UserView,
    pub score: u64,
    pub rank: usize,
}

/// GET /api/leaderboard/projects
pub async fn top_projects(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let projects = data.store.list_projects().await?;
    let users = directory_for(&data, &projects).await?;
    let views: Vec<ProjectView> = projects
        .iter()
        .filter_map(|p| ProjectView::build(p, &users))
        .collect();

    let entries: Vec<ProjectEntry> = rank_by(views, |p| u64::from(p.metrics.tasks_done), LEADERBOARD_LIMIT)
        .into_iter()
        .map(|r| ProjectEntry {
            project: r.item,
            score: r.score,
            rank: r.rank,
        })
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}

/// GET /api/leaderboard/contributors
pub async fn top_contributors(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let users: Vec<UserView> = data.store.list_users().await?.iter().map(UserView::from).collect();

    let entries: Vec<ContributorEntry> = rank_by(users, |u| u.xp, LEADERBOARD_LIMIT)
        .into_iter()
        .map(|r| ContributorEntry {
            user: r.item,
            score: r.score,
            rank: r.rank,
        })
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}
