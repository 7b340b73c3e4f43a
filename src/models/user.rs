// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    pub bio: Option<String>,
    pub avatar_url: Option<String>,

    /// Whether this user wants NSFW posts in their listings.
    pub show_nsfw: bool,

    /// Blocked users cannot log in or write anything.
    pub is_blocked: bool,

    /// Censored users' posts and comments are hidden from everyone.
    pub is_censored: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Public view of a user plus social counters.
#[derive(Debug, Serialize, FromRow)]
pub struct ProfileResponse {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

/// Minimal user entry for follower/following lists.
#[derive(Debug, Serialize, FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for editing one's own profile. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,

    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub avatar_url: Option<String>,

    pub show_nsfw: Option<bool>,
}

/// Validates that a string is a correctly formatted URL.
pub fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_update_rejects_bad_avatar_url() {
        let req = UpdateProfileRequest {
            bio: None,
            avatar_url: Some("not a url".to_string()),
            show_nsfw: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn profile_update_accepts_partial_payload() {
        let req = UpdateProfileRequest {
            bio: Some("hello".to_string()),
            avatar_url: None,
            show_nsfw: Some(true),
        };
        assert!(req.validate().is_ok());
    }
}
