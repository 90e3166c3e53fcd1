use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_course_owner, require_exam_owner, CurrentStaff, CurrentUser};
use crate::api::pagination::PageQuery;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc, to_primitive_utc};
use crate::db::models::{AnswerEntry, User};
use crate::db::types::{ExamStatus, RecordStatus, UserRole};
use crate::repositories;
use crate::repositories::exams::ExamFilter;
use crate::repositories::SortDir;
use crate::schemas::exam::{
    ExamCreate, ExamPaperQuestion, ExamQuestionDetail, ExamRecordResponse, ExamResponse,
    ExamUpdate, RecordWithStudentResponse, StartExamResponse, SubmitRequest, SubmitResultResponse,
};
use crate::schemas::{ApiResponse, Page};
use crate::services::{exam_window, grading};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/:id", get(get_exam).put(update_exam).delete(delete_exam))
        .route("/:id/questions", get(list_exam_questions))
        .route("/:id/start", post(start_exam))
        .route("/:id/submit", post(submit_exam))
        .route("/:id/records", get(list_records))
        .route("/:id/records/:student_id", get(get_student_record))
}

#[derive(Debug, Deserialize)]
struct ExamFilterQuery {
    #[serde(default)]
    #[serde(alias = "courseId")]
    course_id: Option<String>,
    #[serde(default)]
    status: Option<ExamStatus>,
    #[serde(default)]
    search: Option<String>,
}

async fn list_exams(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ExamFilterQuery>,
) -> Result<Json<ApiResponse<Page<ExamResponse>>>, ApiError> {
    let filter = match user.role {
        UserRole::Admin => ExamFilter {
            course_id: filter.course_id,
            creator_id: None,
            status: filter.status,
            exclude_draft: false,
            search: filter.search,
        },
        UserRole::Teacher => ExamFilter {
            course_id: filter.course_id,
            creator_id: Some(user.id.clone()),
            status: filter.status,
            exclude_draft: false,
            search: filter.search,
        },
        UserRole::Student => ExamFilter {
            course_id: filter.course_id,
            creator_id: None,
            status: filter.status.filter(|status| *status != ExamStatus::Draft),
            exclude_draft: true,
            search: filter.search,
        },
    };

    let items = repositories::exams::list(
        state.db(),
        &filter,
        page.skip(),
        page.limit(),
        page.sort_by.as_deref(),
        SortDir::parse(page.order.as_deref()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    let total = repositories::exams::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count exams"))?;

    let items = items.into_iter().map(ExamResponse::from_db).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn get_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ExamResponse>>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    if user.role == UserRole::Student && exam.status == ExamStatus::Draft {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }

    let question_count = repositories::exams::count_questions(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    let participant_count = repositories::exams::count_participants(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count participants"))?;

    Ok(Json(ApiResponse::ok(
        "OK",
        ExamResponse::with_counts(exam, question_count, participant_count),
    )))
}

async fn create_exam(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ApiResponse<ExamResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if payload.start_time >= payload.end_time {
        return Err(ApiError::BadRequest("start_time must be before end_time".to_string()));
    }
    if payload.pass_score > payload.total_score {
        return Err(ApiError::BadRequest("pass_score must not exceed total_score".to_string()));
    }

    require_course_owner(&state, &staff, &payload.course_id).await?;
    ensure_questions_exist(&state, &payload.question_ids).await?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let exam = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            description: payload.description.as_deref(),
            course_id: &payload.course_id,
            creator_id: &staff.id,
            start_time: to_primitive_utc(payload.start_time),
            end_time: to_primitive_utc(payload.end_time),
            duration_minutes: payload.duration_minutes,
            total_score: payload.total_score,
            pass_score: payload.pass_score,
            status: payload.status,
            settings: payload.settings,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    attach_questions(&mut tx, &exam.id, &payload.question_ids, payload.total_score).await?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam"))?;

    let question_count = payload.question_ids.len() as i64;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Exam created", ExamResponse::with_counts(exam, question_count, 0))),
    ))
}

async fn update_exam(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<ApiResponse<ExamResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let existing = require_exam_owner(&state, &staff, &id).await?;

    let start_time = payload.start_time.map(to_primitive_utc).unwrap_or(existing.start_time);
    let end_time = payload.end_time.map(to_primitive_utc).unwrap_or(existing.end_time);
    if start_time >= end_time {
        return Err(ApiError::BadRequest("start_time must be before end_time".to_string()));
    }

    let total_score = payload.total_score.unwrap_or(existing.total_score);
    let pass_score = payload.pass_score.unwrap_or(existing.pass_score);
    if pass_score > total_score {
        return Err(ApiError::BadRequest("pass_score must not exceed total_score".to_string()));
    }

    if let Some(question_ids) = &payload.question_ids {
        ensure_questions_exist(&state, question_ids).await?;
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::exams::update(
        &mut *tx,
        &id,
        repositories::exams::UpdateExam {
            title: payload.title,
            description: payload.description,
            start_time: payload.start_time.map(to_primitive_utc),
            end_time: payload.end_time.map(to_primitive_utc),
            duration_minutes: payload.duration_minutes,
            total_score: payload.total_score,
            pass_score: payload.pass_score,
            status: payload.status,
            settings: payload.settings,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update exam"))?;

    // Replacing attachments is delete-then-reinsert with a fresh even split.
    if let Some(question_ids) = &payload.question_ids {
        repositories::exams::clear_questions(&mut *tx, &id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to clear exam questions"))?;
        attach_questions(&mut tx, &id, question_ids, total_score).await?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit exam update"))?;

    let exam = repositories::exams::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    Ok(Json(ApiResponse::ok("Exam updated", ExamResponse::from_db(exam))))
}

async fn delete_exam(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_exam_owner(&state, &staff, &id).await?;

    repositories::exams::delete_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    Ok(Json(ApiResponse::message("Exam deleted")))
}

async fn list_exam_questions(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ExamQuestionDetail>>>, ApiError> {
    require_exam_owner(&state, &staff, &id).await?;

    let rows = repositories::exams::list_questions(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exam questions"))?;

    let items = rows.into_iter().map(ExamQuestionDetail::from_row).collect();
    Ok(Json(ApiResponse::ok("OK", items)))
}

async fn start_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<StartExamResponse>>, ApiError> {
    if user.role != UserRole::Student {
        return Err(ApiError::Forbidden("Only students can take exams"));
    }

    let exam = repositories::exams::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    match exam.status {
        ExamStatus::Cancelled => {
            return Err(ApiError::Conflict("Exam has been cancelled".to_string()))
        }
        ExamStatus::Draft => return Err(ApiError::NotFound("Exam not found".to_string())),
        _ => {}
    }

    let enrolled = repositories::enrollments::is_enrolled(state.db(), &exam.course_id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;
    if !enrolled {
        return Err(ApiError::Forbidden("Not enrolled in this exam's course"));
    }

    let now = primitive_now_utc();
    if !exam_window::within_start_window(now, exam.start_time, exam.end_time) {
        let message = if now < exam.start_time {
            "Exam has not started yet"
        } else {
            "Exam has ended"
        };
        return Err(ApiError::Conflict(message.to_string()));
    }

    let record = repositories::exam_records::start(
        state.db(),
        &Uuid::new_v4().to_string(),
        &id,
        &user.id,
        now,
    )
    .await
    .map_err(|e| match e {
        // The upsert returns nothing when the record is already past
        // in_progress.
        sqlx::Error::RowNotFound => {
            ApiError::Conflict("Exam has already been submitted".to_string())
        }
        other => ApiError::internal(other, "Failed to start exam"),
    })?;

    let questions = repositories::exams::list_questions(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exam questions"))?;

    let response = StartExamResponse {
        record: ExamRecordResponse::from_db(record),
        questions: questions.into_iter().map(ExamPaperQuestion::from_row).collect(),
        start_time: format_primitive(exam.start_time),
        end_time: format_primitive(exam.end_time),
        duration_minutes: exam.duration_minutes,
        server_time: format_primitive(now),
    };

    Ok(Json(ApiResponse::ok("Exam started", response)))
}

async fn submit_exam(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<ApiResponse<SubmitResultResponse>>, ApiError> {
    if user.role != UserRole::Student {
        return Err(ApiError::Forbidden("Only students can take exams"));
    }
    if payload.answers.is_empty() {
        return Err(ApiError::BadRequest("answers must not be empty".to_string()));
    }

    let exam = repositories::exams::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let record = repositories::exam_records::find_for_student(state.db(), &id, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam record"))?
        .ok_or_else(|| ApiError::Conflict("Exam has not been started".to_string()))?;

    match record.status {
        RecordStatus::Submitted | RecordStatus::Graded => {
            return Err(ApiError::Conflict("Exam has already been submitted".to_string()))
        }
        RecordStatus::NotStarted => {
            return Err(ApiError::Conflict("Exam has not been started".to_string()))
        }
        RecordStatus::InProgress => {}
    }

    let now = primitive_now_utc();
    let record_start = record.start_time.unwrap_or(record.created_at);
    let deadline =
        exam_window::submit_deadline(record_start, exam.end_time, exam.duration_minutes);
    let grace = state.settings().exam().submit_grace_seconds;
    if !exam_window::within_submit_window(now, deadline, grace) {
        return Err(ApiError::Conflict("Submission window has closed".to_string()));
    }

    let questions = repositories::exams::list_questions(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exam questions"))?;

    let answers: Vec<AnswerEntry> = payload
        .answers
        .into_iter()
        .map(|entry| AnswerEntry { question_id: entry.question_id, answer: entry.answer })
        .collect();

    let score = grading::grade_submission(&questions, &answers);

    // Conditional update: only one of two racing submissions can flip the
    // record out of in_progress.
    let updated = repositories::exam_records::submit(state.db(), &id, &user.id, &answers, score, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to store submission"))?;

    if updated == 0 {
        return Err(ApiError::Conflict("Exam has already been submitted".to_string()));
    }

    tracing::info!(exam_id = %id, student_id = %user.id, score, "exam submitted");

    Ok(Json(ApiResponse::ok(
        "Exam submitted",
        SubmitResultResponse { score, total_score: exam.total_score },
    )))
}

async fn list_records(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<RecordWithStudentResponse>>>, ApiError> {
    require_exam_owner(&state, &staff, &id).await?;

    let rows =
        repositories::exam_records::list_by_exam(state.db(), &id, page.skip(), page.limit())
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list exam records"))?;

    let total = repositories::exam_records::count_by_exam(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count exam records"))?;

    let items = rows.into_iter().map(RecordWithStudentResponse::from_row).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn get_student_record(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((id, student_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ExamRecordResponse>>, ApiError> {
    enforce_record_access(&state, &user, &id, &student_id).await?;

    let record = repositories::exam_records::find_for_student(state.db(), &id, &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam record"))?
        .ok_or_else(|| ApiError::NotFound("Exam record not found".to_string()))?;

    Ok(Json(ApiResponse::ok("OK", ExamRecordResponse::from_db(record))))
}

/// Students may read only their own record; teachers only records of exams
/// they own; admins anything.
async fn enforce_record_access(
    state: &AppState,
    user: &User,
    exam_id: &str,
    student_id: &str,
) -> Result<(), ApiError> {
    match user.role {
        UserRole::Admin => Ok(()),
        UserRole::Student => {
            if user.id == student_id {
                Ok(())
            } else {
                Err(ApiError::Forbidden("Cannot view another student's record"))
            }
        }
        UserRole::Teacher => {
            require_exam_owner(state, user, exam_id).await?;
            Ok(())
        }
    }
}

async fn ensure_questions_exist(
    state: &AppState,
    question_ids: &[String],
) -> Result<(), ApiError> {
    for question_id in question_ids {
        let found = repositories::questions::find_by_id(state.db(), question_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?;
        if found.is_none() {
            return Err(ApiError::BadRequest(format!("Unknown question id: {question_id}")));
        }
    }
    Ok(())
}

/// Attaches questions in the supplied order, splitting the exam total evenly.
async fn attach_questions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    exam_id: &str,
    question_ids: &[String],
    total_score: f64,
) -> Result<(), ApiError> {
    if question_ids.is_empty() {
        return Ok(());
    }

    let score = grading::even_split(total_score, question_ids.len());
    for (position, question_id) in question_ids.iter().enumerate() {
        repositories::exams::insert_question(
            &mut **tx,
            &Uuid::new_v4().to_string(),
            exam_id,
            question_id,
            score,
            position as i32 + 1,
        )
        .await
        .map_err(|e| {
            ApiError::conflict_on_duplicate(
                e,
                "Duplicate question in attachment list",
                "Failed to attach question",
            )
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests;
