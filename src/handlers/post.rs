use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    handlers::{active_user, notification::notify, page_size},
    models::{
        notification::NotificationKind,
        post::{CreatePostRequest, Post, PostListParams, UpdatePostRequest},
    },
    utils::{html::clean_html, jwt::Claims, nsfw::NsfwFilter},
};

/// Who is reading. Anonymous viewers never see NSFW posts.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Viewer {
    pub id: Option<i64>,
    pub show_nsfw: bool,
}

impl Viewer {
    pub(crate) async fn resolve(pool: &PgPool, claims: Option<&Claims>) -> Result<Self, AppError> {
        let Some(claims) = claims else {
            return Ok(Self::default());
        };
        let id = claims.user_id()?;

        let show_nsfw = sqlx::query_scalar::<_, bool>("SELECT show_nsfw FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(match show_nsfw {
            Some(show_nsfw) => Self {
                id: Some(id),
                show_nsfw,
            },
            None => Self::default(),
        })
    }
}

/// Base post query with the visibility rules applied.
/// Callers append further `AND ...` conditions, ordering and limits.
fn visible_posts(viewer: &Viewer) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        r#"
        SELECT
            p.id, p.user_id, u.username AS author_username, p.category_id,
            p.title, p.content, p.image_url, p.is_nsfw,
            p.created_at, p.updated_at, p.likes_count,
            (SELECT COUNT(*) FROM comments c
             JOIN users cu ON cu.id = c.user_id
             WHERE c.post_id = p.id AND cu.is_censored = FALSE) AS comments_count,
            EXISTS(SELECT 1 FROM post_likes pl WHERE pl.post_id = p.id AND pl.user_id = "#,
    );
    qb.push_bind(viewer.id);
    qb.push(
        r#") AS is_liked
        FROM posts p
        JOIN users u ON u.id = p.user_id
        WHERE u.is_censored = FALSE"#,
    );
    // Authors always see their own NSFW posts.
    if !viewer.show_nsfw {
        qb.push(" AND (p.is_nsfw = FALSE OR p.user_id = ")
            .push_bind(viewer.id)
            .push(")");
    }
    qb
}

/// Loads a post's author id, but only if `viewer` is allowed to see the post.
/// Hidden posts are reported as missing, same as `get_post`.
pub(crate) async fn visible_post_author(
    pool: &PgPool,
    viewer: &Viewer,
    post_id: i64,
) -> Result<i64, AppError> {
    let mut qb = visible_posts(viewer);
    qb.push(" AND p.id = ").push_bind(post_id);

    let post = qb
        .build_query_as::<Post>()
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(post.user_id)
}

/// Appends cursor, category filter, ordering and limit.
///
/// With `cursor_id` the cursor is the `(created_at, id)` pair of the last row seen,
/// so rows sharing the boundary timestamp are neither skipped nor repeated.
fn paginate(qb: &mut QueryBuilder<'static, Postgres>, params: &PostListParams) {
    match (params.cursor, params.cursor_id) {
        (Some(cursor), Some(cursor_id)) => {
            qb.push(" AND (p.created_at, p.id) < (")
                .push_bind(cursor)
                .push(", ")
                .push_bind(cursor_id)
                .push(")");
        }
        (Some(cursor), None) => {
            qb.push(" AND p.created_at < ").push_bind(cursor);
        }
        _ => {}
    }
    if let Some(category_id) = params.category_id {
        qb.push(" AND p.category_id = ").push_bind(category_id);
    }
    qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
        .push_bind(page_size(params.limit));
}

async fn ensure_category_exists(pool: &PgPool, category_id: i64) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE id = $1")
        .bind(category_id)
        .fetch_optional(pool)
        .await?;

    if exists.is_none() {
        return Err(AppError::BadRequest("Unknown category".to_string()));
    }
    Ok(())
}

/// Create a new post.
/// The post is stored as NSFW if the author flags it or the keyword filter trips.
pub async fn create_post(
    State(pool): State<PgPool>,
    State(nsfw): State<Arc<NsfwFilter>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = active_user(&pool, claims.user_id()?).await?;

    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&pool, category_id).await?;
    }

    let content = clean_html(&payload.content);
    let is_nsfw = nsfw.classify_post(payload.is_nsfw, &payload.title, &content);

    let post_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO posts (user_id, category_id, title, content, image_url, is_nsfw)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(payload.category_id)
    .bind(&payload.title)
    .bind(&content)
    .bind(&payload.image_url)
    .bind(is_nsfw)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(post_id, user_id = user.id, is_nsfw, "post created");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": post_id, "is_nsfw": is_nsfw })),
    ))
}

/// List posts (Recent first).
/// Supports cursor-based pagination and a category filter.
pub async fn list_posts(
    State(pool): State<PgPool>,
    claims: Option<Extension<Claims>>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::resolve(&pool, claims.as_deref()).await?;

    let mut qb = visible_posts(&viewer);
    paginate(&mut qb, &params);

    let posts = qb
        .build_query_as::<Post>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list posts: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(posts))
}

/// Posts by users the caller follows.
pub async fn feed(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::resolve(&pool, Some(&claims)).await?;
    let user_id = claims.user_id()?;

    let mut qb = visible_posts(&viewer);
    qb.push(" AND p.user_id IN (SELECT followee_id FROM follows WHERE follower_id = ")
        .push_bind(user_id)
        .push(")");
    paginate(&mut qb, &params);

    let posts = qb.build_query_as::<Post>().fetch_all(&pool).await?;

    Ok(Json(posts))
}

/// Posts written by one user.
pub async fn list_user_posts(
    State(pool): State<PgPool>,
    claims: Option<Extension<Claims>>,
    Path(user_id): Path<i64>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::resolve(&pool, claims.as_deref()).await?;

    let mut qb = visible_posts(&viewer);
    qb.push(" AND p.user_id = ").push_bind(user_id);
    paginate(&mut qb, &params);

    let posts = qb.build_query_as::<Post>().fetch_all(&pool).await?;

    Ok(Json(posts))
}

/// Get a single post by ID.
/// Hidden posts (censored author, NSFW for this viewer) are reported as missing.
pub async fn get_post(
    State(pool): State<PgPool>,
    claims: Option<Extension<Claims>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = Viewer::resolve(&pool, claims.as_deref()).await?;

    let mut qb = visible_posts(&viewer);
    qb.push(" AND p.id = ").push_bind(id);

    let post = qb
        .build_query_as::<Post>()
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

#[derive(sqlx::FromRow)]
struct EditablePost {
    user_id: i64,
    title: String,
    content: String,
    category_id: Option<i64>,
    is_nsfw: bool,
}

/// Edit a post. Author only.
/// The NSFW flag is recomputed from the merged title/content.
pub async fn update_post(
    State(pool): State<PgPool>,
    State(nsfw): State<Arc<NsfwFilter>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user = active_user(&pool, claims.user_id()?).await?;

    let current = sqlx::query_as::<_, EditablePost>(
        "SELECT user_id, title, content, category_id, is_nsfw FROM posts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if current.user_id != user.id {
        return Err(AppError::Forbidden(
            "You are not authorized to edit this post".to_string(),
        ));
    }

    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&pool, category_id).await?;
    }

    let title = payload.title.unwrap_or(current.title);
    let content = payload
        .content
        .map(|c| clean_html(&c))
        .unwrap_or(current.content);
    let category_id = payload.category_id.or(current.category_id);
    let is_nsfw = nsfw.classify_post(
        payload.is_nsfw.unwrap_or(current.is_nsfw),
        &title,
        &content,
    );

    sqlx::query(
        r#"
        UPDATE posts
        SET title = $1, content = $2, category_id = $3, is_nsfw = $4, updated_at = NOW()
        WHERE id = $5
        "#,
    )
    .bind(&title)
    .bind(&content)
    .bind(category_id)
    .bind(is_nsfw)
    .bind(id)
    .execute(&pool)
    .await?;

    Ok(Json(serde_json::json!({ "id": id, "is_nsfw": is_nsfw })))
}

/// Delete a post. Comments, likes and notifications go with it.
/// Requires: Login + (Author OR Admin).
pub async fn delete_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = active_user(&pool, claims.user_id()?).await?;

    let owner_id = sqlx::query_scalar::<_, i64>("SELECT user_id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if owner_id != user.id && user.role != "admin" {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Toggle Like on a post.
pub async fn toggle_like(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = active_user(&pool, claims.user_id()?).await?;

    let mut tx = pool.begin().await?;

    let author_id = sqlx::query_scalar::<_, i64>("SELECT user_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    // 1. Check if already liked
    let is_liked = sqlx::query_scalar::<_, i32>(
        "SELECT 1 FROM post_likes WHERE user_id = $1 AND post_id = $2",
    )
    .bind(user.id)
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?
    .is_some();

    if is_liked {
        // Unlike
        sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user.id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE posts SET likes_count = GREATEST(0, likes_count - 1) WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    } else {
        // Like
        sqlx::query("INSERT INTO post_likes (user_id, post_id) VALUES ($1, $2)")
            .bind(user.id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    // Concurrent request handled gracefully
                    return AppError::Conflict("Already liked".to_string());
                }
                AppError::InternalServerError(e.to_string())
            })?;

        sqlx::query("UPDATE posts SET likes_count = likes_count + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        notify(
            &mut *tx,
            author_id,
            user.id,
            NotificationKind::Like,
            Some(post_id),
            None,
        )
        .await?;
    }

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "liked": !is_liked })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_cursor_when_id_given() {
        let mut qb = visible_posts(&Viewer::default());
        let params = PostListParams {
            cursor: Some(chrono::Utc::now()),
            cursor_id: Some(42),
            ..Default::default()
        };
        paginate(&mut qb, &params);

        let sql = qb.sql();
        assert!(sql.contains("(p.created_at, p.id) < ("));
        assert!(sql.contains("ORDER BY p.created_at DESC, p.id DESC"));
    }

    #[test]
    fn timestamp_cursor_alone_still_works() {
        let mut qb = visible_posts(&Viewer::default());
        let params = PostListParams {
            cursor: Some(chrono::Utc::now()),
            ..Default::default()
        };
        paginate(&mut qb, &params);

        let sql = qb.sql();
        assert!(sql.contains("AND p.created_at < $"));
        assert!(!sql.contains("(p.created_at, p.id) <"));
    }

    #[test]
    fn visibility_hides_censored_and_foreign_nsfw() {
        let anonymous = visible_posts(&Viewer::default());
        assert!(anonymous.sql().contains("u.is_censored = FALSE"));
        assert!(anonymous.sql().contains("p.is_nsfw = FALSE OR p.user_id = $"));

        let opted_in = visible_posts(&Viewer {
            id: Some(1),
            show_nsfw: true,
        });
        assert!(!opted_in.sql().contains("p.is_nsfw = FALSE"));
        assert!(opted_in.sql().contains("cu.is_censored = FALSE"));
    }
}
