// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{error::AppError, utils::jwt::Claims};

/// Admin view of a user with moderation flags.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ModeratedUser {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub is_blocked: bool,
    pub is_censored: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub blocked: bool,
}

#[derive(Debug, Deserialize)]
pub struct CensorRequest {
    pub censored: bool,
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, ModeratedUser>(
        r#"
        SELECT id, username, role, is_blocked, is_censored, created_at
        FROM users
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Sets a boolean moderation column on a user. `column` is one of our own literals.
async fn set_flag(pool: &PgPool, id: i64, column: &'static str, value: bool) -> Result<(), AppError> {
    let sql = format!("UPDATE users SET {} = $1 WHERE id = $2", column);
    let result = sqlx::query(&sql)
        .bind(value)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Blocks or unblocks a user. Blocked users cannot log in or write.
/// Admin only. Prevents blocking self.
pub async fn set_blocked(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<BlockRequest>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot block yourself".to_string()));
    }

    set_flag(&pool, id, "is_blocked", payload.blocked).await?;
    tracing::info!(user_id = id, blocked = payload.blocked, admin = %claims.sub, "block flag changed");

    Ok(StatusCode::OK)
}

/// Censors or uncensors a user. Censored users' posts and comments are hidden.
/// Admin only.
pub async fn set_censored(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CensorRequest>,
) -> Result<impl IntoResponse, AppError> {
    set_flag(&pool, id, "is_censored", payload.censored).await?;
    tracing::info!(user_id = id, censored = payload.censored, admin = %claims.sub, "censor flag changed");

    Ok(StatusCode::OK)
}

/// Deletes a user by ID, along with everything they wrote.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
