use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::{active_user, notification::notify},
    models::{notification::NotificationKind, user::UserSummary},
    utils::jwt::Claims,
};

/// Toggle following another user.
pub async fn toggle_follow(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(followee_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = active_user(&pool, claims.user_id()?).await?;

    if followee_id == user.id {
        return Err(AppError::BadRequest("You cannot follow yourself".to_string()));
    }

    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
        .bind(followee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
        .bind(user.id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let following = removed == 0;
    if following {
        sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(followee_id)
        .execute(&mut *tx)
        .await?;

        notify(&mut *tx, followee_id, user.id, NotificationKind::Follow, None, None).await?;
    }

    tx.commit().await?;

    tracing::debug!(follower = user.id, followee = followee_id, following, "follow toggled");

    Ok(Json(serde_json::json!({ "following": following })))
}

/// Users following `id`.
pub async fn list_followers(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.avatar_url
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.followee_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(users))
}

/// Users `id` follows.
pub async fn list_following(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT u.id, u.username, u.avatar_url
        FROM follows f
        JOIN users u ON u.id = f.followee_id
        WHERE f.follower_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(users))
}
