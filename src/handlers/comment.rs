use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::{
        active_user,
        notification::notify,
        post::{Viewer, visible_post_author},
    },
    models::{
        comment::{Comment, CommentResponse, CreateCommentRequest, UpdateCommentRequest},
        notification::NotificationKind,
    },
    policy::comment_rules::{
        CommentStore, can_comment, can_delete_comment, can_edit_comment,
    },
    utils::{html::strip_tags, jwt::Claims},
};

/// Create a new comment, gated by the comment rules.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user = active_user(&pool, claims.user_id()?).await?;

    // Posts the caller cannot see (censored author, NSFW without opt-in) do not exist for them.
    let viewer = Viewer::resolve(&pool, Some(&claims)).await?;
    let post_author_id = visible_post_author(&pool, &viewer, post_id).await?;

    // The rules assume the parent lives on the same post; enforce that here.
    let parent_author_id = match payload.parent_id {
        Some(pid) => Some(
            sqlx::query_scalar::<_, i64>(
                "SELECT user_id FROM comments WHERE id = $1 AND post_id = $2",
            )
            .bind(pid)
            .bind(post_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Parent comment not found".to_string()))?,
        ),
        None => None,
    };

    let decision = can_comment(&pool, user.id, post_id, post_author_id, payload.parent_id).await?;
    if let Some(reason) = decision.reason() {
        tracing::debug!(user_id = user.id, post_id, reason, "comment denied");
        return Err(AppError::Forbidden(reason.to_string()));
    }

    let content = strip_tags(&payload.content);

    let mut tx = pool.begin().await?;

    let comment_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO comments (post_id, user_id, parent_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(user.id)
    .bind(payload.parent_id)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await?;

    match parent_author_id {
        // The post author replied to gets a single "reply" notification, not two.
        Some(parent_author) => {
            notify(
                &mut *tx,
                parent_author,
                user.id,
                NotificationKind::Reply,
                Some(post_id),
                Some(comment_id),
            )
            .await?;
            if parent_author != post_author_id {
                notify(
                    &mut *tx,
                    post_author_id,
                    user.id,
                    NotificationKind::Comment,
                    Some(post_id),
                    Some(comment_id),
                )
                .await?;
            }
        }
        None => {
            notify(
                &mut *tx,
                post_author_id,
                user.id,
                NotificationKind::Comment,
                Some(post_id),
                Some(comment_id),
            )
            .await?;
        }
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": comment_id })),
    ))
}

/// List all comments for a post, top-level first then replies, oldest first.
/// Comments by censored users are hidden, and so is the whole thread of a post
/// the viewer cannot see.
pub async fn list_comments(
    State(pool): State<PgPool>,
    claims: Option<Extension<Claims>>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::resolve(&pool, claims.as_deref()).await?;
    visible_post_author(&pool, &viewer, post_id).await?;

    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT
            c.id, c.post_id, c.user_id, u.username, c.parent_id, c.content,
            c.created_at, c.updated_at
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = $1 AND u.is_censored = FALSE
        ORDER BY c.parent_id IS NOT NULL, c.created_at ASC, c.id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}

/// Edit a comment. Author only.
pub async fn update_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user = active_user(&pool, claims.user_id()?).await?;

    if pool.find_comment(id).await?.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }
    if !can_edit_comment(&pool, user.id, id).await? {
        return Err(AppError::Forbidden(
            "You can only edit your own comments".to_string(),
        ));
    }

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments SET content = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING id, post_id, user_id, parent_id, content, created_at, updated_at
        "#,
    )
    .bind(strip_tags(&payload.content))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}

/// Delete a comment (and its replies). Comment author or post author.
pub async fn delete_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = active_user(&pool, claims.user_id()?).await?;

    let post_author_id = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT p.user_id
        FROM comments c
        JOIN posts p ON p.id = c.post_id
        WHERE c.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if !can_delete_comment(&pool, user.id, id, post_author_id).await? {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
