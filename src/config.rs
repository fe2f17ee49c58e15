use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};

const MIN_SECRET_LEN: usize = 32;
const DEFAULT_TTL_MINUTES: i64 = 60 * 24;
pub(crate) const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: SecretString,
    pub issuer: String,
    pub ttl_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret = std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;
        let session = SessionConfig {
            secret: SecretString::from(secret),
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "bioboard".into()),
            ttl_minutes: ttl_minutes(std::env::var("SESSION_TTL_MINUTES").ok().as_deref()),
            cookie_secure: std::env::var("SESSION_COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        session.validate()?;
        Ok(Self {
            database_url,
            session,
        })
    }
}

/// Positive minutes, capped at a year. Anything unparsable falls back to a day.
fn ttl_minutes(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map_or(DEFAULT_TTL_MINUTES, |v| v.min(MAX_TTL_MINUTES))
}

impl SessionConfig {
    fn validate(&self) -> anyhow::Result<()> {
        let len = self.secret.expose_secret().len();
        anyhow::ensure!(
            len >= MIN_SECRET_LEN,
            "SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes (got {len})"
        );
        Ok(())
    }
}
