use crate::auth::{JwtConfig, JwtManager};
use crate::media::MediaStore;
use crate::schemas::AppState;
use anyhow::{Context, Result};
use sea_orm::Database;
use serde::Deserialize;

/// Settings read from the environment (and `.env`), on top of the
/// database URL and bind address handled by the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Secret used to sign access and refresh tokens
    pub jwt_secret: String,
    /// Lifetime of access tokens in minutes
    pub access_token_minutes: i64,
    /// Lifetime of refresh tokens in days
    pub refresh_token_days: i64,
    /// Directory uploaded images are written to
    pub media_root: String,
}

impl AppConfig {
    /// Build the configuration from defaults overridden by environment
    /// variables such as `JWT_SECRET` or `MEDIA_ROOT`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("jwt_secret", JwtConfig::default().secret)?
            .set_default("access_token_minutes", 5_i64)?
            .set_default("refresh_token_days", 1_i64)?
            .set_default("media_root", "media")?
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let app_config: AppConfig = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if app_config.jwt_secret == JwtConfig::default().secret {
            tracing::warn!("JWT_SECRET is not set; using the built-in development secret");
        }

        Ok(app_config)
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig {
            secret: self.jwt_secret.clone(),
            access_token_ttl: chrono::Duration::minutes(self.access_token_minutes),
            refresh_token_ttl: chrono::Duration::days(self.refresh_token_days),
        }
    }
}

/// Initialize application state with specific database URL
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    let app_config = AppConfig::load()?;

    // Connect to database
    tracing::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    tracing::info!("Storing uploaded media under: {}", app_config.media_root);

    Ok(AppState {
        db,
        jwt: JwtManager::new(app_config.jwt_config()),
        media: MediaStore::new(&app_config.media_root),
    })
}
