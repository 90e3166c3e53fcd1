use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, RegisterRequest, TokenResponse};
use crate::schemas::user::UserResponse;
use crate::schemas::ApiResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TokenResponse>>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if payload.role == UserRole::Admin {
        return Err(ApiError::Forbidden("Cannot self-register an admin account"));
    }

    if repositories::users::find_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing username"))?
        .is_some()
    {
        return Err(ApiError::Conflict("Username is already taken".to_string()));
    }

    if repositories::users::find_by_email(state.db(), &payload.email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing email"))?
        .is_some()
    {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

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
            status: crate::db::types::UserStatus::Active,
            phone: payload.phone.as_deref(),
            avatar: None,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| {
        // Pre-checks race with concurrent registrations of the same name.
        ApiError::conflict_on_duplicate(
            e,
            "Username or email is already taken",
            "Failed to create user",
        )
    })?;

    let response = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Registered successfully", response))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let user = repositories::users::find_by_username(state.db(), &payload.username)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))?;

    let verified = security::verify_password(&payload.password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized("Incorrect username or password"))?;

    if !verified {
        return Err(ApiError::Unauthorized("Incorrect username or password"));
    }

    if user.status != crate::db::types::UserStatus::Active {
        return Err(ApiError::Forbidden("User account is not active"));
    }

    let response = issue_token(&state, user)?;
    Ok(Json(ApiResponse::ok("Logged in successfully", response)))
}

async fn refresh(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    let response = issue_token(&state, user)?;
    Ok(Json(ApiResponse::ok("Token refreshed", response)))
}

/// Tokens are stateless; logout exists so clients have a uniform endpoint to
/// call when discarding credentials.
async fn logout(CurrentUser(_user): CurrentUser) -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("Logged out successfully"))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::ok("OK", UserResponse::from_db(user)))
}

fn issue_token(state: &AppState, user: User) -> Result<TokenResponse, ApiError> {
    let token = security::create_access_token(&user, state.settings(), None)
        .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    Ok(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    })
}
