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
use crate::api::guards::CurrentStaff;
use crate::api::pagination::PageQuery;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::{QuestionType, UserRole};
use crate::repositories;
use crate::repositories::questions::QuestionFilter;
use crate::repositories::SortDir;
use crate::schemas::question::{
    ImportOutcome, QuestionCreate, QuestionImport, QuestionResponse, QuestionUpdate,
};
use crate::schemas::{ApiResponse, Page};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/categories", get(list_categories))
        .route("/export", get(export_questions))
        .route("/import", post(import_questions))
        .route("/:id", get(get_question).put(update_question).delete(delete_question))
}

#[derive(Debug, Deserialize)]
struct QuestionFilterQuery {
    #[serde(default)]
    #[serde(alias = "type", alias = "questionType")]
    question_type: Option<QuestionType>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    difficulty: Option<i32>,
    #[serde(default)]
    #[serde(alias = "creatorId")]
    creator_id: Option<String>,
    #[serde(default)]
    search: Option<String>,
}

impl QuestionFilterQuery {
    fn into_filter(self) -> QuestionFilter {
        QuestionFilter {
            question_type: self.question_type,
            category: self.category,
            difficulty: self.difficulty,
            creator_id: self.creator_id,
            search: self.search,
        }
    }
}

/// Choice questions need something to choose from.
fn validate_shape(
    question_type: QuestionType,
    options: &[String],
) -> Result<(), ApiError> {
    match question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice if options.len() < 2 => {
            Err(ApiError::BadRequest(
                "Choice questions require at least two options".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

async fn list_questions(
    State(state): State<AppState>,
    CurrentStaff(_staff): CurrentStaff,
    Query(page): Query<PageQuery>,
    Query(filter): Query<QuestionFilterQuery>,
) -> Result<Json<ApiResponse<Page<QuestionResponse>>>, ApiError> {
    let filter = filter.into_filter();

    let items = repositories::questions::list(
        state.db(),
        &filter,
        page.skip(),
        page.limit(),
        page.sort_by.as_deref(),
        SortDir::parse(page.order.as_deref()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    let total = repositories::questions::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    let items = items.into_iter().map(QuestionResponse::from_db).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn list_categories(
    State(state): State<AppState>,
    CurrentStaff(_staff): CurrentStaff,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let categories = repositories::questions::list_categories(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list categories"))?;

    Ok(Json(ApiResponse::ok("OK", categories)))
}

async fn export_questions(
    State(state): State<AppState>,
    CurrentStaff(_staff): CurrentStaff,
    Query(filter): Query<QuestionFilterQuery>,
) -> Result<Json<ApiResponse<Vec<QuestionResponse>>>, ApiError> {
    let filter = filter.into_filter();

    let items = repositories::questions::list_all(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to export questions"))?;

    let items: Vec<_> = items.into_iter().map(QuestionResponse::from_db).collect();
    Ok(Json(ApiResponse::ok("OK", items)))
}

async fn get_question(
    State(state): State<AppState>,
    CurrentStaff(_staff): CurrentStaff,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<QuestionResponse>>, ApiError> {
    let question = repositories::questions::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    Ok(Json(ApiResponse::ok("OK", QuestionResponse::from_db(question))))
}

async fn create_question(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<ApiResponse<QuestionResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let question = insert_question(&state, &staff, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Question created", QuestionResponse::from_db(question))),
    ))
}

/// Items are processed one by one; a failing item is reported in its outcome
/// slot without aborting the rest of the batch.
async fn import_questions(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Json(payload): Json<QuestionImport>,
) -> Result<Json<ApiResponse<Vec<ImportOutcome>>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut outcomes = Vec::with_capacity(payload.questions.len());
    for (index, question) in payload.questions.into_iter().enumerate() {
        let outcome = match insert_question(&state, &staff, question).await {
            Ok(question) => {
                ImportOutcome { index, imported: true, id: Some(question.id), reason: None }
            }
            Err(ApiError::BadRequest(message)) | Err(ApiError::Conflict(message)) => {
                ImportOutcome { index, imported: false, id: None, reason: Some(message) }
            }
            Err(other) => return Err(other),
        };
        outcomes.push(outcome);
    }

    Ok(Json(ApiResponse::ok("Import processed", outcomes)))
}

async fn update_question(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<QuestionUpdate>,
) -> Result<Json<ApiResponse<QuestionResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let question = repositories::questions::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    require_question_owner(&staff, &question.creator_id)?;

    if let (Some(question_type), Some(options)) = (payload.question_type, &payload.options) {
        validate_shape(question_type, options)?;
    }

    repositories::questions::update(
        state.db(),
        &id,
        repositories::questions::UpdateQuestion {
            title: payload.title,
            content: payload.content,
            question_type: payload.question_type,
            options: payload.options,
            correct_answer: payload.correct_answer,
            explanation: payload.explanation,
            difficulty: payload.difficulty,
            category: payload.category,
            tags: payload.tags,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    let question = repositories::questions::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    Ok(Json(ApiResponse::ok("Question updated", QuestionResponse::from_db(question))))
}

async fn delete_question(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let question = repositories::questions::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::NotFound("Question not found".to_string()))?;

    require_question_owner(&staff, &question.creator_id)?;

    let references = repositories::questions::exam_reference_count(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check exam references"))?;
    if references > 0 {
        return Err(ApiError::Conflict(
            "Question is attached to an exam and cannot be deleted".to_string(),
        ));
    }

    repositories::questions::delete_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;

    Ok(Json(ApiResponse::message("Question deleted")))
}

async fn insert_question(
    state: &AppState,
    staff: &User,
    payload: QuestionCreate,
) -> Result<crate::db::models::Question, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_shape(payload.question_type, &payload.options)?;

    let now = primitive_now_utc();
    repositories::questions::create(
        state.db(),
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            content: &payload.content,
            question_type: payload.question_type,
            options: payload.options,
            correct_answer: payload.correct_answer,
            explanation: payload.explanation.as_deref(),
            difficulty: payload.difficulty,
            category: &payload.category,
            tags: payload.tags,
            creator_id: &staff.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))
}

fn require_question_owner(staff: &User, creator_id: &str) -> Result<(), ApiError> {
    if staff.role == UserRole::Admin || staff.id == creator_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not the owner of this question"))
    }
}

#[cfg(test)]
mod tests;
