use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::{UserRole, UserStatus};
use crate::repositories;

/// Create (or repair) the default admin account on startup.
pub(crate) async fn ensure_default_admin(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.default_admin_password.is_empty() {
        tracing::warn!("DEFAULT_ADMIN_PASSWORD not configured; skipping admin bootstrap");
        return Ok(());
    }

    let username = &admin.default_admin_username;
    let user = repositories::users::find_by_username(state.db(), username).await?;
    let now = primitive_now_utc();

    if let Some(user) = user {
        let verified =
            security::verify_password(&admin.default_admin_password, &user.hashed_password)
                .unwrap_or(false);

        if verified && user.role == UserRole::Admin && user.status == UserStatus::Active {
            tracing::info!("Default admin already up to date");
            return Ok(());
        }

        let hashed_password = if verified {
            None
        } else {
            Some(security::hash_password(&admin.default_admin_password)?)
        };

        repositories::users::update(
            state.db(),
            &user.id,
            repositories::users::UpdateUser {
                email: None,
                real_name: None,
                role: Some(UserRole::Admin),
                status: Some(UserStatus::Active),
                phone: None,
                avatar: None,
                hashed_password,
                updated_at: now,
            },
        )
        .await?;

        tracing::info!("Updated default admin {username}");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.default_admin_password)?;

    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &Uuid::new_v4().to_string(),
            username,
            email: &admin.default_admin_email,
            hashed_password,
            real_name: "Administrator",
            role: UserRole::Admin,
            status: UserStatus::Active,
            phone: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!("Created default admin {username}");
    Ok(())
}
