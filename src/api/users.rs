use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentStaff, CurrentUser};
use crate::api::pagination::PageQuery;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{UserRole, UserStatus};
use crate::repositories;
use crate::repositories::users::UserFilter;
use crate::repositories::SortDir;
use crate::schemas::user::{AdminUserCreate, AdminUserUpdate, PasswordChange, UserResponse};
use crate::schemas::{ApiResponse, Page};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/teachers", get(list_teachers))
        .route("/students", get(list_students))
        .route("/me/password", put(change_password))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
struct UserFilterQuery {
    #[serde(default)]
    role: Option<UserRole>,
    #[serde(default)]
    status: Option<UserStatus>,
    #[serde(default)]
    search: Option<String>,
}

async fn list_users(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Query(page): Query<PageQuery>,
    Query(filter): Query<UserFilterQuery>,
) -> Result<Json<ApiResponse<Page<UserResponse>>>, ApiError> {
    let filter =
        UserFilter { role: filter.role, status: filter.status, search: filter.search };

    list_filtered(&state, filter, &page).await
}

async fn list_teachers(
    State(state): State<AppState>,
    CurrentStaff(_staff): CurrentStaff,
    Query(page): Query<PageQuery>,
    Query(filter): Query<UserFilterQuery>,
) -> Result<Json<ApiResponse<Page<UserResponse>>>, ApiError> {
    let filter = UserFilter {
        role: Some(UserRole::Teacher),
        status: filter.status,
        search: filter.search,
    };

    list_filtered(&state, filter, &page).await
}

async fn list_students(
    State(state): State<AppState>,
    CurrentStaff(_staff): CurrentStaff,
    Query(page): Query<PageQuery>,
    Query(filter): Query<UserFilterQuery>,
) -> Result<Json<ApiResponse<Page<UserResponse>>>, ApiError> {
    let filter = UserFilter {
        role: Some(UserRole::Student),
        status: filter.status,
        search: filter.search,
    };

    list_filtered(&state, filter, &page).await
}

async fn list_filtered(
    state: &AppState,
    filter: UserFilter,
    page: &PageQuery,
) -> Result<Json<ApiResponse<Page<UserResponse>>>, ApiError> {
    let items = repositories::users::list(
        state.db(),
        &filter,
        page.skip(),
        page.limit(),
        page.sort_by.as_deref(),
        SortDir::parse(page.order.as_deref()),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to list users"))?;

    let total = repositories::users::count(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count users"))?;

    let items = items.into_iter().map(UserResponse::from_db).collect();
    Ok(Json(ApiResponse::ok("OK", Page::new(items, total, page.page(), page.limit()))))
}

async fn get_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    if caller.role != UserRole::Admin && caller.id != id {
        return Err(ApiError::Forbidden("Cannot view another user's profile"));
    }

    let user = repositories::users::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiResponse::ok("OK", UserResponse::from_db(user))))
}

async fn create_user(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Json(payload): Json<AdminUserCreate>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let hashed_password = security::hash_password(&payload.password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let now = primitive_now_utc();
    let user = repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username: &payload.username,
            email: &payload.email,
            hashed_password,
            real_name: &payload.real_name,
            role: payload.role,
            status: payload.status,
            phone: payload.phone.as_deref(),
            avatar: payload.avatar.as_deref(),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| {
        ApiError::conflict_on_duplicate(
            e,
            "Username or email is already taken",
            "Failed to create user",
        )
    })?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("User created", UserResponse::from_db(user)))))
}

async fn update_user(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(id): Path<String>,
    Json(payload): Json<AdminUserUpdate>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let existing = repositories::users::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?;
    if existing.is_none() {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let hashed_password = match &payload.password {
        Some(password) => Some(
            security::hash_password(password)
                .map_err(|e| ApiError::internal(e, "Failed to hash password"))?,
        ),
        None => None,
    };

    repositories::users::update(
        state.db(),
        &id,
        repositories::users::UpdateUser {
            email: payload.email,
            real_name: payload.real_name,
            role: payload.role,
            status: payload.status,
            phone: payload.phone,
            avatar: payload.avatar,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| {
        ApiError::conflict_on_duplicate(e, "Email is already registered", "Failed to update user")
    })?;

    let user = repositories::users::fetch_one_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated user"))?;

    Ok(Json(ApiResponse::ok("User updated", UserResponse::from_db(user))))
}

async fn delete_user(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    if admin.id == id {
        return Err(ApiError::Forbidden("Cannot delete your own account"));
    }

    let user = repositories::users::find_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.role == UserRole::Admin {
        return Err(ApiError::Forbidden("Admin accounts cannot be deleted"));
    }

    repositories::users::delete_by_id(state.db(), &id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete user"))?;

    Ok(Json(ApiResponse::message("User deleted")))
}

async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PasswordChange>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let verified = security::verify_password(&payload.old_password, &user.hashed_password)
        .map_err(|e| ApiError::internal(e, "Failed to verify password"))?;
    if !verified {
        return Err(ApiError::BadRequest("Old password is incorrect".to_string()));
    }

    let hashed_password = security::hash_password(&payload.new_password)
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    repositories::users::update_password(state.db(), &user.id, &hashed_password, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update password"))?;

    Ok(Json(ApiResponse::message("Password changed")))
}

#[cfg(test)]
mod tests;
