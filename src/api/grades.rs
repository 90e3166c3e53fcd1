use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStaff, CurrentUser};
use crate::api::pagination::PageQuery;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::exam_records::{GradeFilter, GradeRow};
use crate::repositories::SortDir;
use crate::schemas::grade::{GradeResponse, GradeStatsResponse, GradeUpdate};
use crate::schemas::{ApiResponse, Page};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_grades))
        .route("/my", get(my_grades))
        .route("/stats", get(grade_stats))
        .route("/export", get(export_grades))
        .route("/:id", put(update_grade))
}

#[derive(Debug, Deserialize)]
struct GradeFilterQuery {
    #[serde(default)]
    #[serde(alias = "courseId")]
    course_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "examId")]
    exam_id: Option<String>,
    #[serde(default)]
    #[serde(alias = "studentId")]
    student_id: Option<String>,
}

fn staff_filter(staff: &User, query: GradeFilterQuery) -> GradeFilter {
    GradeFilter {
        course_id: query.course_id,
        exam_id: query.exam_id,
        student_id: query.student_id,
        creator_id: match staff.role {
            UserRole::Teacher => Some(staff.id.clone()),
            _ => None,
        },
    }
}

async fn list_grades(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Query(page): Query<PageQuery>,
    Query(query): Query<GradeFilterQuery>,
) -> Result<Json<ApiResponse<Page<GradeResponse>>>, ApiError> {
    let filter = staff_filter(&staff, query);

    let rows = repositories::exam_records::list_grades(
        state.db(),
        &filter,
        page.skip(),
        page.limit(),
        page.sort_by.as_deref(),
        SortDir::parse(page.order.as_deref()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list grades"))?;

    let total = repositories::exam_records::count_grades(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count grades"))?;

    let items = rows.into_iter().map(GradeResponse::from_row).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn my_grades(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(query): Query<GradeFilterQuery>,
) -> Result<Json<ApiResponse<Page<GradeResponse>>>, ApiError> {
    let filter = GradeFilter {
        course_id: query.course_id,
        exam_id: query.exam_id,
        student_id: Some(user.id),
        creator_id: None,
    };

    let rows = repositories::exam_records::list_grades(
        state.db(),
        &filter,
        page.skip(),
        page.limit(),
        page.sort_by.as_deref(),
        SortDir::parse(page.order.as_deref()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list grades"))?;

    let total = repositories::exam_records::count_grades(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count grades"))?;

    let items = rows.into_iter().map(GradeResponse::from_row).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn grade_stats(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Query(query): Query<GradeFilterQuery>,
) -> Result<Json<ApiResponse<GradeStatsResponse>>, ApiError> {
    let filter = staff_filter(&staff, query);

    let stats = repositories::exam_records::grade_stats(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to compute grade statistics"))?;

    Ok(Json(ApiResponse::ok("OK", GradeStatsResponse::from_row(stats))))
}

async fn export_grades(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Query(query): Query<GradeFilterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = staff_filter(&staff, query);

    let rows = repositories::exam_records::list_all_grades(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to export grades"))?;

    let body = grades_to_csv(&rows);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"grades.csv\""),
        ],
        body,
    ))
}

async fn update_grade(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<GradeUpdate>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let record = repositories::exam_records::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam record"))?
        .ok_or_else(|| ApiError::NotFound("Exam record not found".to_string()))?;

    let exam = crate::api::guards::require_exam_owner(&state, &staff, &record.exam_id).await?;

    if payload.score > exam.total_score {
        return Err(ApiError::BadRequest("score must not exceed the exam total".to_string()));
    }

    repositories::exam_records::update_grade(
        state.db(),
        &id,
        payload.score,
        payload.comment.as_deref(),
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update grade"))?;

    Ok(Json(ApiResponse::message("Grade updated")))
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn grades_to_csv(rows: &[GradeRow]) -> String {
    let mut out = String::from(
        "exam_title,username,real_name,status,submit_time,score,total_score,pass_score,comment\n",
    );
    for row in rows {
        let submit_time = row
            .submit_time
            .map(crate::core::time::format_primitive)
            .unwrap_or_default();
        let score = row.score.map(|s| s.to_string()).unwrap_or_default();
        let status = serde_json::to_value(row.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let line = [
            csv_escape(&row.exam_title),
            csv_escape(&row.username),
            csv_escape(&row.real_name),
            status,
            submit_time,
            score,
            row.total_score.to_string(),
            row.pass_score.to_string(),
            csv_escape(row.comment.as_deref().unwrap_or_default()),
        ]
        .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}
