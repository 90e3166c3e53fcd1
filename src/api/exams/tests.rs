use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::{QuestionType, UserRole};
use crate::test_support;

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn full_exam_flow_grades_submission() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "examteacher", UserRole::Teacher, "secret-pass")
            .await;
    let student =
        test_support::insert_user(ctx.state.db(), "examstudent", UserRole::Student, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Exam Course", &teacher.id).await;
    test_support::enroll_student(ctx.state.db(), &course.id, &student.id).await;

    let right = test_support::insert_question(
        ctx.state.db(),
        "Right answer",
        QuestionType::SingleChoice,
        json!("Paris"),
        &teacher.id,
    )
    .await;
    let wrong = test_support::insert_question(
        ctx.state.db(),
        "Wrong answer",
        QuestionType::TrueFalse,
        json!(true),
        &teacher.id,
    )
    .await;
    let exam = test_support::insert_open_exam(
        ctx.state.db(),
        "Graded Exam",
        &course.id,
        &teacher.id,
        100.0,
        &[right.id.clone(), wrong.id.clone()],
    )
    .await;

    let token = test_support::bearer_token(&student, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/start", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start exam");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let paper = body["data"]["questions"].as_array().expect("paper");
    assert_eq!(paper.len(), 2);
    // The paper never reveals the answer key.
    assert!(paper[0].get("correct_answer").is_none());
    assert!(paper[0].get("explanation").is_none());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/submit", exam.id),
            Some(&token),
            Some(json!({
                "answers": [
                    { "questionId": right.id, "answer": "Paris" },
                    { "questionId": wrong.id, "answer": false }
                ]
            })),
        ))
        .await
        .expect("submit exam");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["score"], 50.0);
    assert_eq!(body["data"]["total_score"], 100.0);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/exams/{}/records/{}", exam.id, student.id),
            Some(&token),
            None,
        ))
        .await
        .expect("fetch record");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(body["data"]["score"], 50.0);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn starting_twice_returns_the_same_record() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "idemteacher", UserRole::Teacher, "secret-pass")
            .await;
    let student =
        test_support::insert_user(ctx.state.db(), "idemstudent", UserRole::Student, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Idem Course", &teacher.id).await;
    test_support::enroll_student(ctx.state.db(), &course.id, &student.id).await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Only question",
        QuestionType::FillBlank,
        json!("42"),
        &teacher.id,
    )
    .await;
    let exam = test_support::insert_open_exam(
        ctx.state.db(),
        "Idem Exam",
        &course.id,
        &teacher.id,
        100.0,
        &[question.id.clone()],
    )
    .await;

    let token = test_support::bearer_token(&student, ctx.state.settings());
    let uri = format!("/api/exams/{}/start", exam.id);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("first start");
    let first = test_support::read_json(response).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::POST, &uri, Some(&token), None))
        .await
        .expect("second start");
    let status = response.status();
    let second = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {second}");

    assert_eq!(first["data"]["record"]["id"], second["data"]["record"]["id"]);
    assert_eq!(
        first["data"]["record"]["start_time"],
        second["data"]["record"]["start_time"]
    );
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn submitting_twice_conflicts() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "twiceteacher", UserRole::Teacher, "secret-pass")
            .await;
    let student =
        test_support::insert_user(ctx.state.db(), "twicestudent", UserRole::Student, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Twice Course", &teacher.id).await;
    test_support::enroll_student(ctx.state.db(), &course.id, &student.id).await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Only question",
        QuestionType::FillBlank,
        json!("42"),
        &teacher.id,
    )
    .await;
    let exam = test_support::insert_open_exam(
        ctx.state.db(),
        "Twice Exam",
        &course.id,
        &teacher.id,
        100.0,
        &[question.id.clone()],
    )
    .await;

    let token = test_support::bearer_token(&student, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/start", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start exam");
    assert_eq!(response.status(), StatusCode::OK);

    let submit = json!({ "answers": [{ "questionId": question.id, "answer": "42" }] });

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/submit", exam.id),
            Some(&token),
            Some(submit.clone()),
        ))
        .await
        .expect("first submit");
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/submit", exam.id),
            Some(&token),
            Some(submit),
        ))
        .await
        .expect("second submit");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CONFLICT, "response: {body}");
    assert_eq!(body["message"], "Exam has already been submitted");

    // Starting again after submission is also refused.
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/start", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start after submit");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn unenrolled_student_cannot_start() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "gateteacher", UserRole::Teacher, "secret-pass")
            .await;
    let outsider =
        test_support::insert_user(ctx.state.db(), "outsider", UserRole::Student, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Gated Course", &teacher.id).await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Only question",
        QuestionType::Essay,
        json!(null),
        &teacher.id,
    )
    .await;
    let exam = test_support::insert_open_exam(
        ctx.state.db(),
        "Gated Exam",
        &course.id,
        &teacher.id,
        100.0,
        &[question.id.clone()],
    )
    .await;

    let token = test_support::bearer_token(&outsider, ctx.state.settings());
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/start", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start exam");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["message"], "Not enrolled in this exam's course");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn teacher_cannot_start_an_exam() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "noexamteacher", UserRole::Teacher, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Own Course", &teacher.id).await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Only question",
        QuestionType::Essay,
        json!(null),
        &teacher.id,
    )
    .await;
    let exam = test_support::insert_open_exam(
        ctx.state.db(),
        "Own Exam",
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
            Method::POST,
            &format!("/api/exams/{}/start", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start exam");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn student_cannot_read_another_students_record() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "recteacher", UserRole::Teacher, "secret-pass")
            .await;
    let first =
        test_support::insert_user(ctx.state.db(), "recstudent1", UserRole::Student, "secret-pass")
            .await;
    let second =
        test_support::insert_user(ctx.state.db(), "recstudent2", UserRole::Student, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Record Course", &teacher.id).await;
    test_support::enroll_student(ctx.state.db(), &course.id, &first.id).await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Only question",
        QuestionType::FillBlank,
        json!("42"),
        &teacher.id,
    )
    .await;
    let exam = test_support::insert_open_exam(
        ctx.state.db(),
        "Record Exam",
        &course.id,
        &teacher.id,
        100.0,
        &[question.id.clone()],
    )
    .await;

    let first_token = test_support::bearer_token(&first, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/exams/{}/start", exam.id),
            Some(&first_token),
            None,
        ))
        .await
        .expect("start exam");
    assert_eq!(response.status(), StatusCode::OK);

    let second_token = test_support::bearer_token(&second, ctx.state.settings());
    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/exams/{}/records/{}", exam.id, first.id),
            Some(&second_token),
            None,
        ))
        .await
        .expect("read record");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");
    assert_eq!(body["message"], "Cannot view another student's record");
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn create_exam_validates_times_and_scores() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "valteacher", UserRole::Teacher, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Validated Course", &teacher.id).await;
    let token = test_support::bearer_token(&teacher, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/exams",
            Some(&token),
            Some(json!({
                "title": "Backwards Exam",
                "courseId": course.id,
                "startTime": "2026-09-02T10:00:00Z",
                "endTime": "2026-09-01T10:00:00Z",
                "durationMinutes": 60
            })),
        ))
        .await
        .expect("create exam");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/exams",
            Some(&token),
            Some(json!({
                "title": "Impossible Exam",
                "courseId": course.id,
                "startTime": "2026-09-01T10:00:00Z",
                "endTime": "2026-09-02T10:00:00Z",
                "durationMinutes": 60,
                "totalScore": 100,
                "passScore": 120
            })),
        ))
        .await
        .expect("create exam");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn students_do_not_see_draft_exams() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "draftteacher", UserRole::Teacher, "secret-pass")
            .await;
    let student =
        test_support::insert_user(ctx.state.db(), "draftstudent", UserRole::Student, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Draft Course", &teacher.id).await;
    let question = test_support::insert_question(
        ctx.state.db(),
        "Only question",
        QuestionType::Essay,
        json!(null),
        &teacher.id,
    )
    .await;
    let exam = test_support::insert_open_exam(
        ctx.state.db(),
        "Draft Exam",
        &course.id,
        &teacher.id,
        100.0,
        &[question.id.clone()],
    )
    .await;
    sqlx::query("UPDATE exams SET status = 'draft' WHERE id = $1")
        .bind(&exam.id)
        .execute(ctx.state.db())
        .await
        .expect("set draft");

    let token = test_support::bearer_token(&student, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/exams", Some(&token), None))
        .await
        .expect("list exams");
    let body = test_support::read_json(response).await;
    assert_eq!(body["data"]["items"].as_array().expect("items").len(), 0);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/exams/{}", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("get draft exam");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "requires a local PostgreSQL instance"]
async fn create_exam_splits_total_across_questions() {
    let ctx = test_support::setup_test_context().await;

    let teacher =
        test_support::insert_user(ctx.state.db(), "splitteacher", UserRole::Teacher, "secret-pass")
            .await;
    let course = test_support::insert_course(ctx.state.db(), "Split Course", &teacher.id).await;
    let mut question_ids = Vec::new();
    for index in 0..3 {
        let question = test_support::insert_question(
            ctx.state.db(),
            &format!("Split question {index}"),
            QuestionType::FillBlank,
            json!("x"),
            &teacher.id,
        )
        .await;
        question_ids.push(question.id);
    }

    let token = test_support::bearer_token(&teacher, ctx.state.settings());
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/exams",
            Some(&token),
            Some(json!({
                "title": "Split Exam",
                "courseId": course.id,
                "startTime": "2026-09-01T10:00:00Z",
                "endTime": "2026-09-02T10:00:00Z",
                "durationMinutes": 60,
                "totalScore": 100,
                "passScore": 60,
                "questionIds": question_ids
            })),
        ))
        .await
        .expect("create exam");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["data"]["question_count"], 3);
    let exam_id = body["data"]["id"].as_str().expect("exam id").to_string();

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/exams/{exam_id}/questions"),
            Some(&token),
            None,
        ))
        .await
        .expect("list exam questions");
    let body = test_support::read_json(response).await;
    let items = body["data"].as_array().expect("questions");
    assert_eq!(items.len(), 3);
    for (index, item) in items.iter().enumerate() {
        assert_eq!(item["score"], 33.33);
        assert_eq!(item["order_num"], (index + 1) as i64);
    }
}
