#[macro_use]
mod common;

use actix_web::{cookie::Cookie, http::header, http::StatusCode, test};
use serde_json::json;

use common::{bearer, create_project, harness, send, signup};

#[actix_web::test]
async fn signup_sets_a_cookie_and_returns_the_user() {
    let h = harness();
    let app = init_app!(h);

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({ "name": "Ada", "email": "  Ada@Example.com ", "password": "hunter22" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["xp"], 0);
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["token"].as_str().is_some());
}

#[actix_web::test]
async fn signup_validates_input() {
    let h = harness();
    let app = init_app!(h);
    signup(&app, "Ada", "ada@example.com").await;

    let cases = [
        (json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter22" }), StatusCode::CONFLICT),
        (json!({ "name": "Bob", "email": "not-an-email", "password": "hunter22" }), StatusCode::BAD_REQUEST),
        (json!({ "name": "Bob", "email": "bob@example.com", "password": "short" }), StatusCode::BAD_REQUEST),
        (json!({ "email": "bob@example.com", "password": "hunter22" }), StatusCode::BAD_REQUEST),
    ];
    for (payload, expected) in cases {
        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(payload.clone())
            .to_request();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, expected, "payload {payload}");
        assert!(body["message"].is_string());
    }
}

#[actix_web::test]
async fn login_distinguishes_unknown_users_from_bad_passwords() {
    let h = harness();
    let app = init_app!(h);
    signup(&app, "Ada", "ada@example.com").await;

    let login = |email: &str, password: &str| {
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": email, "password": password }))
            .to_request()
    };

    let (status, body) = send(&app, login("nobody@example.com", "hunter22")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, body) = send(&app, login("ada@example.com", "wrong-password")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid password");

    let (status, body) = send(&app, login("ADA@example.com", "hunter22")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada");
}

#[actix_web::test]
async fn cookie_and_bearer_tokens_both_authenticate() {
    let h = harness();
    let app = init_app!(h);
    let (token, id) = signup(&app, "Ada", "ada@example.com").await;

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .cookie(Cookie::new("token", token.clone()))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let h = harness();
    let app = init_app!(h);

    let req = test::TestRequest::get().uri("/api/users/me").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token");

    let req = test::TestRequest::get()
        .uri("/api/users/me")
        .insert_header(bearer("garbage"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");

    // public routes ignore a stale token
    let req = test::TestRequest::get()
        .uri("/api/projects")
        .insert_header(bearer("garbage"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn logout_expires_the_cookie() {
    let h = harness();
    let app = init_app!(h);
    let (token, _) = signup(&app, "Ada", "ada@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[actix_web::test]
async fn profile_updates_are_partial() {
    let h = harness();
    let app = init_app!(h);
    let (token, id) = signup(&app, "Ada", "ada@example.com").await;

    let req = test::TestRequest::put()
        .uri("/api/users/me")
        .insert_header(bearer(&token))
        .set_json(json!({
            "skills": ["Rust", " ", "Go"],
            "preferences": { "categories": ["ai"] }
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada");
    assert_eq!(body["skills"], json!(["Rust", "Go"]));
    assert_eq!(body["preferences"], json!({ "categories": ["ai"], "roles": [] }));

    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{id}"))
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skills"], json!(["Rust", "Go"]));

    let req = test::TestRequest::get()
        .uri("/api/users/nobody")
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/users").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn tokens_for_deleted_users_are_refused() {
    let h = harness();
    let app = init_app!(h);
    let (owner, _) = signup(&app, "Ada", "ada@example.com").await;
    let project = create_project(&app, &owner, json!({ "title": "Rover", "description": "Mars" })).await;
    let ghost = collabhub::auth::create_jwt("ghost", common::SECRET, 1).unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/projects/{project}/join"))
        .insert_header(bearer(&ghost))
        .set_json(json!({ "message": "let me in" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found for token");

    let req = test::TestRequest::post()
        .uri(&format!("/api/projects/{project}/chat"))
        .insert_header(bearer(&ghost))
        .set_json(json!({ "text": "boo" }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{project}"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["joinRequests"], json!([]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{project}/chat"))
        .insert_header(bearer(&owner))
        .to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body, json!([]));
}
