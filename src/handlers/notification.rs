use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgExecutor, PgPool};

use crate::{
    error::AppError,
    handlers::{active_user, page_size},
    models::notification::{Notification, NotificationKind, NotificationListParams},
    utils::jwt::Claims,
};

/// Records a notification for `recipient`. Acting on your own content notifies nobody.
pub(crate) async fn notify<'e, E: PgExecutor<'e>>(
    executor: E,
    recipient: i64,
    actor: i64,
    kind: NotificationKind,
    post_id: Option<i64>,
    comment_id: Option<i64>,
) -> Result<(), AppError> {
    if recipient == actor {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, actor_id, kind, post_id, comment_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(recipient)
    .bind(actor)
    .bind(kind.as_str())
    .bind(post_id)
    .bind(comment_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// List the caller's notifications, newest first.
pub async fn list_notifications(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let limit = page_size(params.limit);

    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT
            n.id, n.user_id, n.actor_id, a.username AS actor_username,
            n.kind, n.post_id, n.comment_id, n.is_read, n.created_at
        FROM notifications n
        JOIN users a ON a.id = n.actor_id
        WHERE n.user_id = $1
          AND ($2 = FALSE OR n.is_read = FALSE)
        ORDER BY n.created_at DESC, n.id DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(params.unread_only)
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    Ok(Json(notifications))
}

/// Mark one notification as read. 404 if it is not the caller's.
pub async fn mark_read(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = active_user(&pool, claims.user_id()?).await?.id;

    let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn mark_all_read(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = active_user(&pool, claims.user_id()?).await?.id;

    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
    )
    .bind(user_id)
    .execute(&pool)
    .await?;

    Ok(Json(serde_json::json!({ "updated": result.rows_affected() })))
}
