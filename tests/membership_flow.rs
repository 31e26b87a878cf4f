#[macro_use]
mod common;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};

use collabhub::store::{ProjectStore, UserStore};
use common::{bearer, create_project, harness, send, signup};

fn join(project_id: &str, token: &str, message: &str) -> actix_http::Request {
    test::TestRequest::post()
        .uri(&format!("/api/projects/{project_id}/join"))
        .insert_header(bearer(token))
        .set_json(json!({ "message": message }))
        .to_request()
}

fn decide(project_id: &str, request_id: &str, action: &str, token: &str) -> actix_http::Request {
    test::TestRequest::post()
        .uri(&format!("/api/projects/{project_id}/requests/{request_id}/{action}"))
        .insert_header(bearer(token))
        .to_request()
}

fn roster(project: &Value) -> Vec<(String, String)> {
    project["team"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["user"]["name"].as_str().unwrap().to_string(),
                m["role"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[actix_web::test]
async fn request_accept_flow() {
    let h = harness();
    let app = init_app!(h);
    let (alice, _) = signup(&app, "Alice", "alice@example.com").await;
    let (bob, bob_id) = signup(&app, "Bob", "bob@example.com").await;

    let project_id = create_project(
        &app,
        &alice,
        json!({ "title": "Rover", "description": "Mars sim", "teamMembersRequired": 2 }),
    )
    .await;

    let (status, project) = send(&app, join(&project_id, &bob, "let me help")).await;
    assert_eq!(status, StatusCode::CREATED);
    let requests = project["joinRequests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["status"], "PENDING");
    assert_eq!(requests[0]["message"], "let me help");
    assert_eq!(requests[0]["user"]["id"], bob_id.as_str());
    let request_id = requests[0]["id"].as_str().unwrap().to_string();

    let (status, project) = send(&app, decide(&project_id, &request_id, "accept", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["joinRequests"][0]["status"], "ACCEPTED");
    assert_eq!(
        roster(&project),
        vec![
            ("Alice".to_string(), "Owner".to_string()),
            ("Bob".to_string(), "Member".to_string())
        ]
    );

    // accepting again does not duplicate the roster entry
    let (status, project) = send(&app, decide(&project_id, &request_id, "accept", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster(&project).len(), 2);
}

#[actix_web::test]
async fn duplicate_pending_request_conflicts() {
    let h = harness();
    let app = init_app!(h);
    let (alice, _) = signup(&app, "Alice", "alice@example.com").await;
    let (bob, _) = signup(&app, "Bob", "bob@example.com").await;
    let project_id = create_project(&app, &alice, json!({ "title": "Rover", "description": "d" })).await;

    send(&app, join(&project_id, &bob, "first")).await;
    let (status, body) = send(&app, join(&project_id, &bob, "second")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Request already pending");

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{project_id}"))
        .to_request();
    let (_, project) = send(&app, req).await;
    assert_eq!(project["joinRequests"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn reject_keeps_the_team_and_owner_is_required() {
    let h = harness();
    let app = init_app!(h);
    let (alice, _) = signup(&app, "Alice", "alice@example.com").await;
    let (bob, _) = signup(&app, "Bob", "bob@example.com").await;
    let project_id = create_project(&app, &alice, json!({ "title": "Rover", "description": "d" })).await;

    // the alias route behaves like /join, and a body is optional
    let req = test::TestRequest::post()
        .uri(&format!("/api/projects/{project_id}/request"))
        .insert_header(bearer(&bob))
        .to_request();
    let (status, project) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["joinRequests"][0]["message"], "");
    let request_id = project["joinRequests"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, decide(&project_id, &request_id, "reject", &bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized");

    let (status, project) = send(&app, decide(&project_id, &request_id, "reject", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["joinRequests"][0]["status"], "REJECTED");
    assert_eq!(roster(&project).len(), 1);

    let (status, body) = send(&app, decide(&project_id, "missing", "accept", &alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Request not found");

    let (status, _) = send(&app, join("no-such-project", &bob, "hi")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn requests_from_deleted_users_render_without_a_user() {
    let h = harness();
    let app = init_app!(h);
    let (alice, _) = signup(&app, "Alice", "alice@example.com").await;
    let project_id = create_project(&app, &alice, json!({ "title": "Rover", "description": "d" })).await;

    // a request from an account that no longer resolves
    let mut project = h.store.find_project(&project_id).await.unwrap().unwrap();
    project
        .submit_request("ghost", String::new(), chrono::Utc::now())
        .unwrap();
    assert!(h.store.save_project(&project).await.unwrap());
    assert!(h.store.find_user("ghost").await.unwrap().is_none());

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{project_id}"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["joinRequests"][0]["user"], Value::Null);
}
