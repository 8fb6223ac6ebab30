use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;

/// Secrets shorter than this are accepted but flagged at startup.
const RECOMMENDED_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub enable_register: bool,
    pub store_timeout_ms: u64,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch
    /// the process environment.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            get("DATABASE_URL").unwrap_or_else(|| "sqlite://passgate.db?mode=rwc".into());

        let secret = get("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;
        if secret.is_empty() {
            bail!("JWT_SECRET_KEY must not be empty");
        }
        if secret.len() < RECOMMENDED_SECRET_LEN {
            warn!(
                len = secret.len(),
                "JWT_SECRET_KEY is shorter than {} bytes", RECOMMENDED_SECRET_LEN
            );
        }

        let jwt = JwtConfig {
            secret,
            ttl_minutes: parse_or(&get, "JWT_TTL_MINUTES", 60)?,
        };
        if jwt.ttl_minutes <= 0 {
            bail!("JWT_TTL_MINUTES must be positive");
        }

        Ok(Self {
            database_url,
            jwt,
            enable_register: get("ENABLE_REGISTER")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            store_timeout_ms: parse_or(&get, "STORE_TIMEOUT_MS", 5_000)?,
            request_timeout_secs: parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {v:?}")),
        None => Ok(default),
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}
