// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Maximum number of comments a post author may leave on their own post.
pub const AUTHOR_COMMENT_LIMIT: i64 = 10;

/// Maximum number of comments (top-level plus replies) any other user may leave on a post.
pub const NON_AUTHOR_COMMENT_LIMIT: i64 = 2;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Hard cap on page size for list endpoints.
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub port: u16,
    /// Extra keywords for the NSFW filter, on top of the built-in list.
    pub nsfw_keywords: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let nsfw_keywords = env::var("NSFW_KEYWORDS")
            .map(|v| parse_keyword_list(&v))
            .unwrap_or_default();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
            port,
            nsfw_keywords,
        }
    }
}

/// Splits a comma-separated keyword list, dropping blanks.
fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_list_ignores_blanks_and_case() {
        let words = parse_keyword_list(" Gore, ,SPOILER ,");
        assert_eq!(words, vec!["gore".to_string(), "spoiler".to_string()]);
    }
}
