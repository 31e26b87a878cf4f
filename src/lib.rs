// src/lib.rs

pub mod app_state;
pub mod assets;
pub mod auth;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod membership;
pub mod metrics;
pub mod project;
pub mod recommend;
pub mod store;
pub mod task;
pub mod user_management;

use actix_web::{web, HttpResponse};

use crate::auth::{login, logout, signup};
use crate::chat::{get_messages, post_message};
use crate::leaderboard::{top_contributors, top_projects};
use crate::membership::{accept_request, join_project, reject_request};
use crate::project::{create_project, delete_project, get_project, list_projects};
use crate::recommend::get_suggested;
use crate::task::{create_task, delete_task, list_tasks, update_task};
use crate::user_management::{get_me, get_user, list_users, update_me};

async fn health() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("CollabHub API is running...")
}

/// The full routing table. Callers wrap it with [`auth::Authentication`].
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(error::json_config())
        .app_data(error::path_config())
        .app_data(error::query_config())
        .route("/", web::get().to(health))
        .service(
            web::scope("/api")
                // AUTH
                .service(
                    web::scope("/auth")
                        .route("/signup", web::post().to(signup))
                        .route("/login", web::post().to(login))
                        .route("/logout", web::post().to(logout)),
                )
                // USERS
                .service(
                    web::scope("/users")
                        .route("", web::get().to(list_users))
                        .route("/me", web::get().to(get_me))
                        .route("/me", web::put().to(update_me))
                        .route("/{id}", web::get().to(get_user)),
                )
                // PROJECTS
                .service(
                    web::scope("/projects")
                        .route("", web::get().to(list_projects))
                        .route("", web::post().to(create_project))
                        .route("/{id}", web::get().to(get_project))
                        .route("/{id}", web::delete().to(delete_project))
                        .route("/{id}/join", web::post().to(join_project))
                        .route("/{id}/request", web::post().to(join_project))
                        .route(
                            "/{project_id}/requests/{request_id}/accept",
                            web::post().to(accept_request),
                        )
                        .route(
                            "/{project_id}/requests/{request_id}/reject",
                            web::post().to(reject_request),
                        )
                        .route("/{project_id}/chat", web::get().to(get_messages))
                        .route("/{project_id}/chat", web::post().to(post_message))
                        .route("/{project_id}/tasks", web::get().to(list_tasks)),
                )
                // TASKS
                .service(
                    web::scope("/tasks")
                        .route("", web::post().to(create_task))
                        .route("/{id}", web::patch().to(update_task))
                        .route("/{id}", web::delete().to(delete_task)),
                )
                .service(
                    web::scope("/leaderboard")
                        .route("/projects", web::get().to(top_projects))
                        .route("/contributors", web::get().to(top_contributors)),
                )
                .route("/match/suggested", web::get().to(get_suggested)),
        );
}
