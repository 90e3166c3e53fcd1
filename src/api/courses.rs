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
use crate::api::guards::{require_course_owner, CurrentStaff, CurrentUser};
use crate::api::pagination::PageQuery;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{CourseStatus, UserRole};
use crate::repositories;
use crate::repositories::courses::CourseFilter;
use crate::repositories::SortDir;
use crate::schemas::course::{
    BulkAddOutcome, CourseCreate, CourseResponse, CourseUpdate, EnrolledStudentResponse,
    StudentBulkAdd,
};
use crate::schemas::{ApiResponse, Page};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route("/:id", get(get_course).put(update_course).delete(delete_course))
        .route("/:id/students", get(list_course_students).post(bulk_add_students))
        .route("/:id/students/:student_id", post(add_student).delete(remove_student))
}

#[derive(Debug, Deserialize)]
struct CourseFilterQuery {
    #[serde(default)]
    #[serde(alias = "teacherId")]
    teacher_id: Option<String>,
    #[serde(default)]
    status: Option<CourseStatus>,
    #[serde(default)]
    search: Option<String>,
}

async fn list_courses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<CourseFilterQuery>,
) -> Result<Json<ApiResponse<Page<CourseResponse>>>, ApiError> {
    let filter = match user.role {
        UserRole::Admin => CourseFilter {
            teacher_id: filter.teacher_id,
            status: filter.status,
            search: filter.search,
        },
        UserRole::Teacher => CourseFilter {
            teacher_id: Some(user.id.clone()),
            status: filter.status,
            search: filter.search,
        },
        // Students browse the catalog of running courses.
        UserRole::Student => CourseFilter {
            teacher_id: filter.teacher_id,
            status: Some(CourseStatus::Active),
            search: filter.search,
        },
    };

    let items = repositories::courses::list(
        state.db(),
        &filter,
        page.skip(),
        page.limit(),
        page.sort_by.as_deref(),
        SortDir::parse(page.order.as_deref()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list courses"))?;

    let total = repositories::courses::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count courses"))?;

    let items = items.into_iter().map(CourseResponse::from_db).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn get_course(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CourseResponse>>, ApiError> {
    let course = repositories::courses::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    let student_count = repositories::enrollments::count_students(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count students"))?;

    Ok(Json(ApiResponse::ok("OK", CourseResponse::with_student_count(course, student_count))))
}

async fn create_course(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Json(payload): Json<CourseCreate>,
) -> Result<(StatusCode, Json<ApiResponse<CourseResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let teacher_id = match (&staff.role, payload.teacher_id.as_deref()) {
        (UserRole::Admin, Some(teacher_id)) => {
            let teacher = repositories::users::find_by_id(state.db(), teacher_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch teacher"))?
                .ok_or_else(|| ApiError::NotFound("Teacher not found".to_string()))?;
            if teacher.role != UserRole::Teacher {
                return Err(ApiError::BadRequest(
                    "teacher_id must reference a teacher account".to_string(),
                ));
            }
            teacher.id
        }
        _ => staff.id.clone(),
    };

    let now = primitive_now_utc();
    let course = repositories::courses::create(
        state.db(),
        repositories::courses::CreateCourse {
            id: &Uuid::new_v4().to_string(),
            name: &payload.name,
            description: &payload.description,
            teacher_id: &teacher_id,
            cover_image: payload.cover_image.as_deref(),
            credit_hours: payload.credit_hours,
            status: payload.status,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create course"))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Course created", CourseResponse::from_db(course)))))
}

async fn update_course(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<CourseUpdate>,
) -> Result<Json<ApiResponse<CourseResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_course_owner(&state, &staff, &id).await?;

    repositories::courses::update(
        state.db(),
        &id,
        repositories::courses::UpdateCourse {
            name: payload.name,
            description: payload.description,
            cover_image: payload.cover_image,
            credit_hours: payload.credit_hours,
            status: payload.status,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update course"))?;

    let course = repositories::courses::fetch_one_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated course"))?;

    Ok(Json(ApiResponse::ok("Course updated", CourseResponse::from_db(course))))
}

async fn delete_course(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_course_owner(&state, &staff, &id).await?;

    repositories::courses::delete_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete course"))?;

    Ok(Json(ApiResponse::message("Course deleted")))
}

async fn list_course_students(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Page<EnrolledStudentResponse>>>, ApiError> {
    require_course_owner(&state, &staff, &id).await?;

    let items = repositories::enrollments::list_students(
        state.db(),
        &id,
        page.skip(),
        page.limit(),
        page.sort_by.as_deref(),
        SortDir::parse(page.order.as_deref()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list students"))?;

    let total = repositories::enrollments::count_students(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count students"))?;

    let items = items.into_iter().map(EnrolledStudentResponse::from_row).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn add_student(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path((id, student_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), ApiError> {
    require_course_owner(&state, &staff, &id).await?;
    enroll_student(&state, &id, &student_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::message("Student enrolled"))))
}

/// Items are processed one by one; a failing student does not abort the batch
/// and every outcome is reported back.
async fn bulk_add_students(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path(id): Path<String>,
    Json(payload): Json<StudentBulkAdd>,
) -> Result<Json<ApiResponse<Vec<BulkAddOutcome>>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_course_owner(&state, &staff, &id).await?;

    let mut outcomes = Vec::with_capacity(payload.student_ids.len());
    for student_id in payload.student_ids {
        let outcome = match enroll_student(&state, &id, &student_id).await {
            Ok(()) => BulkAddOutcome { student_id, added: true, reason: None },
            Err(err) => {
                let reason = match err {
                    ApiError::NotFound(message) | ApiError::Conflict(message) => message,
                    ApiError::BadRequest(message) => message,
                    other => return Err(other),
                };
                BulkAddOutcome { student_id, added: false, reason: Some(reason) }
            }
        };
        outcomes.push(outcome);
    }

    Ok(Json(ApiResponse::ok("Enrollment processed", outcomes)))
}

async fn remove_student(
    State(state): State<AppState>,
    CurrentStaff(staff): CurrentStaff,
    Path((id, student_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    require_course_owner(&state, &staff, &id).await?;

    let enrolled = repositories::enrollments::is_enrolled(state.db(), &id, &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;
    if !enrolled {
        return Err(ApiError::NotFound("Student is not enrolled in this course".to_string()));
    }

    repositories::enrollments::remove(state.db(), &id, &student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to remove student"))?;

    Ok(Json(ApiResponse::message("Student removed")))
}

async fn enroll_student(
    state: &AppState,
    course_id: &str,
    student_id: &str,
) -> Result<(), ApiError> {
    let student = repositories::users::find_by_id(state.db(), student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;

    if student.role != UserRole::Student {
        return Err(ApiError::BadRequest("User is not a student".to_string()));
    }

    let enrolled = repositories::enrollments::is_enrolled(state.db(), course_id, student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check enrollment"))?;
    if enrolled {
        return Err(ApiError::Conflict("Student is already enrolled in this course".to_string()));
    }

    repositories::enrollments::add(
        state.db(),
        &Uuid::new_v4().to_string(),
        course_id,
        student_id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| {
        // The pre-check races with concurrent enrollments of the same student.
        ApiError::conflict_on_duplicate(
            e,
            "Student is already enrolled in this course",
            "Failed to enroll student",
        )
    })?;

    Ok(())
}
