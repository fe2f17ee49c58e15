use std::sync::Arc;

use sqlx::SqlitePool;

use crate::{auth::session::SessionKeys, config::AppConfig, db, views::Views};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub keys: SessionKeys,
    pub views: Arc<Views>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let db = db::connect(&config.database_url).await?;
        Self::from_parts(db, config)
    }

    pub fn from_parts(db: SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        tracing::info!(
            issuer = %config.session.issuer,
            ttl_minutes = config.session.ttl_minutes,
            secure_cookies = config.session.cookie_secure,
            "session settings loaded"
        );
        let keys = SessionKeys::from_config(&config.session);
        Ok(Self {
            db,
            keys,
            views: Arc::new(Views::new()?),
        })
    }

    /// In-memory database with migrations applied and a fixed test secret.
    #[cfg(test)]
    pub async fn for_tests() -> Self {
        use crate::config::SessionConfig;
        use secrecy::SecretString;

        let config = AppConfig {
            database_url: "sqlite::memory:".into(),
            session: SessionConfig {
                secret: SecretString::from("test-secret-test-secret-test-secret".to_string()),
                issuer: "test-issuer".into(),
                ttl_minutes: 5,
                cookie_secure: false,
            },
        };
        let db = db::connect_in_memory().await;
        Self::from_parts(db, config).expect("state builds")
    }
}
