use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::user::validate_url_string;

/// A row of the 'posts' table joined with its author and comment count.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub category_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub is_nsfw: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,

    pub likes_count: i32,
    pub comments_count: i64,

    /// UI helper: whether the current user has liked this post.
    /// Always false for anonymous viewers.
    pub is_liked: bool,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: String,

    pub category_id: Option<i64>,

    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub image_url: Option<String>,

    /// Author-declared NSFW flag. The keyword filter may set it regardless.
    #[serde(default)]
    pub is_nsfw: bool,
}

/// DTO for editing a post. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 10000))]
    pub content: Option<String>,

    pub category_id: Option<i64>,

    pub is_nsfw: Option<bool>,
}

/// Query parameters for listing posts.
#[derive(Debug, Default, Deserialize)]
pub struct PostListParams {
    /// Cursor for pagination: the created_at timestamp of the last post in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,

    /// Id of the last post in the previous page; pairs with `cursor` to break timestamp ties.
    pub cursor_id: Option<i64>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,

    /// Restrict to a single category.
    pub category_id: Option<i64>,
}
