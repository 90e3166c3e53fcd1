use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::{QuestionType, UserRole};
use crate::test_support;

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn teacher_creates_question_and_reads_it_back() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "qteacher01", UserRole::Teacher, "secret-pass")
            .await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/questions",
            Some(&token),
            Some(json!({
                "title": "Capital of France",
                "content": "Pick the capital of France.",
                "type": "single_choice",
                "options": ["Paris", "Lyon", "Marseille"],
                "correctAnswer": "Paris",
                "category": "geography",
                "difficulty": 2
            })),
        ))
        .await
        .expect("create question");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    let question_id = body["data"]["id"].as_str().expect("question id").to_string();

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/questions/{question_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("get question");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["question_type"], "single_choice");
    assert_eq!(body["data"]["correct_answer"], "Paris");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn students_cannot_access_the_question_bank() {
    let ctx = test_support::setup_test_context().await;

    let student =
        test_support::insert_user(ctx.state.db(), "qstudent01", UserRole::Student, "secret-pass")
            .await;
    let token = test_support::bearer_token(&student, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/questions", Some(&token), None))
        .await
        .expect("list questions");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["message"], "Teacher or admin access required");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn choice_question_requires_at_least_two_options() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "qteacher02", UserRole::Teacher, "secret-pass")
            .await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/questions",
            Some(&token),
            Some(json!({
                "title": "Degenerate choice",
                "content": "Only one way out.",
                "type": "single_choice",
                "options": ["Paris"],
                "correctAnswer": "Paris"
            })),
        ))
        .await
        .expect("create question");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn teacher_cannot_edit_anothers_question_but_admin_can() {
    let ctx = test_support::setup_test_context().await;

    let owner =
        test_support::insert_user(ctx.state.db(), "qowner", UserRole::Teacher, "secret-pass").await;
    let other =
        test_support::insert_user(ctx.state.db(), "qother", UserRole::Teacher, "secret-pass").await;
    let admin =
        test_support::insert_user(ctx.state.db(), "qadmin", UserRole::Admin, "admin-pass").await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Owned question",
        QuestionType::Essay,
        json!(null),
        &owner.id,
    )
    .await;

    let other_token = test_support::bearer_token(&other, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/questions/{}", question.id),
            Some(&other_token),
            Some(json!({ "title": "Hijacked" })),
        ))
        .await
        .expect("update as non-owner");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin_token = test_support::bearer_token(&admin, ctx.state.settings());
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/questions/{}", question.id),
            Some(&admin_token),
            Some(json!({ "title": "Edited by admin" })),
        ))
        .await
        .expect("update as admin");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["title"], "Edited by admin");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn question_attached_to_an_exam_cannot_be_deleted() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "qteacher03", UserRole::Teacher, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Exam Course", &teacher.id).await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Attached question",
        QuestionType::TrueFalse,
        json!(true),
        &teacher.id,
    )
    .await;
    test_support::insert_open_exam(
        ctx.state.db(),
        "Attached Exam",
        &course.id,
        &teacher.id,
        100.0,
        &[question.id.clone()],
    )
    .await;

    let token = test_support::bearer_token(&teacher, ctx.state.settings());
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/questions/{}", question.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete question");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");
    assert_eq!(body["message"], "Question is attached to an exam and cannot be deleted");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn import_reports_per_item_outcomes() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "qteacher04", UserRole::Teacher, "secret-pass")
            .await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/questions/import",
            Some(&token),
            Some(json!({
                "questions": [
                    {
                        "title": "Good import",
                        "content": "2 + 2 = ?",
                        "type": "fill_blank",
                        "correctAnswer": "4"
                    },
                    {
                        "title": "Broken import",
                        "content": "Choose one.",
                        "type": "multiple_choice",
                        "options": ["only"],
                        "correctAnswer": ["only"]
                    }
                ]
            })),
        ))
        .await
        .expect("import questions");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let outcomes = body["data"].as_array().expect("outcomes");
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["imported"], true);
    assert!(outcomes[0]["id"].as_str().is_some());
    assert_eq!(outcomes[1]["imported"], false);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn categories_are_distinct_and_sorted() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "qteacher05", UserRole::Teacher, "secret-pass")
            .await;
    for (title, category) in
        [("Q1", "math"), ("Q2", "geography"), ("Q3", "math")]
    {
        let question = test_support::insert_question(
            ctx.state.db(),
            title,
            QuestionType::Essay,
            serde_json::json!(null),
            &teacher.id,
        )
        .await;
        sqlx::query("UPDATE questions SET category = $1 WHERE id = $2")
            .bind(category)
            .bind(&question.id)
            .execute(ctx.state.db())
            .await
            .expect("set category");
    }

    let token = test_support::bearer_token(&teacher, ctx.state.settings());
    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/questions/categories", Some(&token), None))
        .await
        .expect("list categories");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"], json!(["geography", "math"]));
}
