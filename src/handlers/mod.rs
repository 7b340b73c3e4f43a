// src/handlers/mod.rs

use sqlx::PgPool;

use crate::{error::AppError, models::user::User};

pub mod admin;
pub mod auth;
pub mod category;
pub mod comment;
pub mod follow;
pub mod notification;
pub mod post;
pub mod profile;

/// Loads the caller and refuses blocked accounts.
/// Every write path goes through this before touching the database.
pub(crate) async fn active_user(pool: &PgPool, user_id: i64) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, bio, avatar_url,
               show_nsfw, is_blocked, is_censored, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::AuthError("User no longer exists".to_string()))?;

    if user.is_blocked {
        return Err(AppError::Forbidden("Your account has been blocked".to_string()));
    }

    Ok(user)
}

/// Clamps a requested page size into `1..=MAX_PAGE_SIZE`.
pub(crate) fn page_size(limit: Option<i64>) -> i64 {
    use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::page_size;

    #[test]
    fn page_size_defaults_and_clamps() {
        assert_eq!(page_size(None), 20);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(500)), 100);
        assert_eq!(page_size(Some(35)), 35);
    }
}
