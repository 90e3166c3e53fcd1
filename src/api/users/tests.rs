use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::UserRole;
use crate::repositories;
use crate::test_support;

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn admin_creates_and_deletes_user() {
    let ctx = test_support::setup_test_context().await;

    let admin =
        test_support::insert_user(ctx.state.db(), "useradmin01", UserRole::Admin, "admin-pass")
            .await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/users",
            Some(&token),
            Some(json!({
                "username": "createdteacher",
                "email": "createdteacher@example.com",
                "password": "secret-pass",
                "realName": "Created Teacher",
                "role": "teacher"
            })),
        ))
        .await
        .expect("create user");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    let user_id = body["data"]["id"].as_str().expect("user id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/users/{user_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("delete user");
    assert_eq!(response.status(), StatusCode::OK);

    let found = repositories::users::find_by_id(ctx.state.db(), &user_id)
        .await
        .expect("find user after deletion");
    assert!(found.is_none());
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn student_cannot_list_users() {
    let ctx = test_support::setup_test_context().await;

    let student =
        test_support::insert_user(ctx.state.db(), "plainstudent", UserRole::Student, "secret-pass")
            .await;
    let token = test_support::bearer_token(&student, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/users", Some(&token), None))
        .await
        .expect("list users");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["message"], "Admin access required");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn list_users_paginates() {
    let ctx = test_support::setup_test_context().await;

    let admin =
        test_support::insert_user(ctx.state.db(), "pageadmin", UserRole::Admin, "admin-pass").await;
    for index in 0..24 {
        test_support::insert_user(
            ctx.state.db(),
            &format!("bulkuser{index:02}"),
            UserRole::Student,
            "secret-pass",
        )
        .await;
    }
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            "/api/users?page=2&limit=10",
            Some(&token),
            None,
        ))
        .await
        .expect("list users");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["total"], 25);
    assert_eq!(body["data"]["page"], 2);
    assert_eq!(body["data"]["totalPages"], 3);
    assert_eq!(body["data"]["items"].as_array().expect("items").len(), 10);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn teachers_listing_only_returns_teachers() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "onlyteacher", UserRole::Teacher, "secret-pass")
            .await;
    test_support::insert_user(ctx.state.db(), "somestudent", UserRole::Student, "secret-pass")
        .await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/users/teachers", Some(&token), None))
        .await
        .expect("list teachers");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let items = body["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["username"], "onlyteacher");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn user_can_view_own_profile_but_not_others() {
    let ctx = test_support::setup_test_context().await;

    let first =
        test_support::insert_user(ctx.state.db(), "selfuser", UserRole::Student, "secret-pass")
            .await;
    let second =
        test_support::insert_user(ctx.state.db(), "otheruser", UserRole::Student, "secret-pass")
            .await;
    let token = test_support::bearer_token(&first, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/users/{}", first.id),
            Some(&token),
            None,
        ))
        .await
        .expect("own profile");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/users/{}", second.id),
            Some(&token),
            None,
        ))
        .await
        .expect("other profile");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn admin_cannot_delete_self_or_other_admins() {
    let ctx = test_support::setup_test_context().await;

    let admin =
        test_support::insert_user(ctx.state.db(), "rootadmin", UserRole::Admin, "admin-pass").await;
    let peer =
        test_support::insert_user(ctx.state.db(), "peeradmin", UserRole::Admin, "admin-pass").await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/users/{}", admin.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete self");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/users/{}", peer.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete peer admin");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn change_password_requires_correct_old_password() {
    let ctx = test_support::setup_test_context().await;

    let user =
        test_support::insert_user(ctx.state.db(), "pwuser", UserRole::Student, "old-pass-123")
            .await;
    let token = test_support::bearer_token(&user, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            "/api/users/me/password",
            Some(&token),
            Some(json!({ "oldPassword": "wrong", "newPassword": "new-pass-123" })),
        ))
        .await
        .expect("change password");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            "/api/users/me/password",
            Some(&token),
            Some(json!({ "oldPassword": "old-pass-123", "newPassword": "new-pass-123" })),
        ))
        .await
        .expect("change password");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "pwuser", "password": "new-pass-123" })),
        ))
        .await
        .expect("login with new password");
    assert_eq!(response.status(), StatusCode::OK);
}
