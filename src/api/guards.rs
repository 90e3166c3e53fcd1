use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::security::{self, TokenError};
use crate::core::state::AppState;
use crate::db::models::{Course, Exam, User};
use crate::db::types::{UserRole, UserStatus};
use crate::repositories;

pub(crate) struct CurrentUser(pub(crate) User);

/// Teacher or admin.
pub(crate) struct CurrentStaff(pub(crate) User);

pub(crate) struct CurrentAdmin(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Missing authentication token"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authentication token"))?;

        let claims = security::verify_token(token, app_state.settings()).map_err(|e| match e {
            TokenError::Expired => ApiError::Unauthorized("Token has expired"),
            _ => ApiError::Unauthorized("Invalid authentication token"),
        })?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        let Some(user) = user else {
            return Err(ApiError::Unauthorized("User not found"));
        };

        if user.status != UserStatus::Active {
            return Err(ApiError::Unauthorized("User account is not active"));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStaff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        match user.role {
            UserRole::Admin | UserRole::Teacher => Ok(CurrentStaff(user)),
            UserRole::Student => Err(ApiError::Forbidden("Teacher or admin access required")),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role == UserRole::Admin {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}

/// Loads the course and checks the caller may manage it: admins always,
/// teachers only when they own it.
pub(crate) async fn require_course_owner(
    state: &AppState,
    user: &User,
    course_id: &str,
) -> Result<Course, ApiError> {
    let course = repositories::courses::find_by_id(state.db(), course_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch course"))?
        .ok_or_else(|| ApiError::NotFound("Course not found".to_string()))?;

    match user.role {
        UserRole::Admin => Ok(course),
        UserRole::Teacher if course.teacher_id == user.id => Ok(course),
        _ => Err(ApiError::Forbidden("Not enough permissions for this course")),
    }
}

/// Loads the exam and checks the caller may manage it: admins always,
/// teachers only when they created it.
pub(crate) async fn require_exam_owner(
    state: &AppState,
    user: &User,
    exam_id: &str,
) -> Result<Exam, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    match user.role {
        UserRole::Admin => Ok(exam),
        UserRole::Teacher if exam.creator_id == user.id => Ok(exam),
        _ => Err(ApiError::Forbidden("Not enough permissions for this exam")),
    }
}
