use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::active_user,
    models::user::{ProfileResponse, UpdateProfileRequest},
    utils::jwt::Claims,
};

async fn fetch_profile(pool: &PgPool, user_id: i64) -> Result<ProfileResponse, AppError> {
    // Subqueries are cheap here given the indexes on posts.user_id and follows.
    sqlx::query_as::<_, ProfileResponse>(
        r#"
        SELECT
            u.id, u.username, u.role, u.bio, u.avatar_url, u.created_at,
            (SELECT COUNT(*) FROM posts WHERE user_id = u.id AND u.is_censored = FALSE) AS posts_count,
            (SELECT COUNT(*) FROM follows WHERE followee_id = u.id) AS followers_count,
            (SELECT COUNT(*) FROM follows WHERE follower_id = u.id) AS following_count
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Get current user's profile and statistics, plus their own settings.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let user = active_user(&pool, user_id).await?;
    let profile = fetch_profile(&pool, user_id).await?;

    Ok(Json(serde_json::json!({
        "profile": profile,
        "show_nsfw": user.show_nsfw,
        "is_censored": user.is_censored,
    })))
}

/// Update bio, avatar and NSFW preference. Absent fields stay as they are.
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user = active_user(&pool, claims.user_id()?).await?;

    sqlx::query(
        r#"
        UPDATE users
        SET bio = COALESCE($1, bio),
            avatar_url = COALESCE($2, avatar_url),
            show_nsfw = COALESCE($3, show_nsfw)
        WHERE id = $4
        "#,
    )
    .bind(&payload.bio)
    .bind(&payload.avatar_url)
    .bind(payload.show_nsfw)
    .bind(user.id)
    .execute(&pool)
    .await?;

    Ok(Json(fetch_profile(&pool, user.id).await?))
}

/// Public profile of any user.
pub async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_profile(&pool, id).await?))
}
