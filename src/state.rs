use std::sync::Arc;

use crate::{config::Config, utils::nsfw::NsfwFilter};
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub nsfw: Arc<NsfwFilter>,
}

impl AppState {
    /// Builds the shared state, compiling the NSFW filter from the configured keywords.
    pub fn new(pool: PgPool, config: Config) -> Result<Self, regex::Error> {
        let nsfw = NsfwFilter::new(&config.nsfw_keywords)?;
        Ok(Self {
            pool,
            config,
            nsfw: Arc::new(nsfw),
        })
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<NsfwFilter> {
    fn from_ref(state: &AppState) -> Self {
        state.nsfw.clone()
    }
}
