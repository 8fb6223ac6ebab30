use std::sync::Arc;

use anyhow::Context;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::{
    auth::{password, JwtKeys},
    config::AppConfig,
    users::UserRepo,
};

#[derive(Clone)]
pub struct AppState {
    pub users: UserRepo,
    pub keys: JwtKeys,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(config.store_timeout())
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        tokio::task::spawn_blocking(password::warm_up)
            .await
            .context("prepare dummy password hash")?;

        Ok(Self::from_parts(db, config))
    }

    pub fn from_parts(db: SqlitePool, config: AppConfig) -> Self {
        Self {
            users: UserRepo::new(db, config.store_timeout()),
            keys: JwtKeys::from_config(&config.jwt),
            config: Arc::new(config),
        }
    }
}
