#[cfg(test)]
pub mod test_utils {
    use crate::auth::{JwtConfig, JwtManager};
    use crate::media::MediaStore;
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection};
    use tempfile::TempDir;
    use tracing::subscriber::DefaultGuard;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const TEST_JWT_SECRET: &str = "courier_test_secret";

    /// Application state over a fresh database and media directory.
    ///
    /// The media directory and the log subscriber live exactly as long as this
    /// value, so keep it bound for the whole test.
    pub struct TestApp {
        pub state: AppState,
        _media_dir: TempDir,
        _tracing: DefaultGuard,
    }

    impl TestApp {
        pub fn router(&self) -> Router {
            create_router(self.state.clone())
        }
    }

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Create AppState for testing, storing uploads under `media_root`.
    pub async fn setup_test_app_state(media_root: &std::path::Path) -> AppState {
        let db = setup_test_db().await;

        AppState {
            db,
            jwt: JwtManager::new(JwtConfig {
                secret: TEST_JWT_SECRET.to_string(),
                ..JwtConfig::default()
            }),
            media: MediaStore::new(media_root.join("media")),
        }
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is taken from RUST_LOG and defaults to WARN.
    pub fn init_test_tracing() -> DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create the app fixture for a test
    pub async fn setup_test_app() -> TestApp {
        let tracing_guard = init_test_tracing();

        let media_dir = TempDir::new().expect("Failed to create media directory");
        let state = setup_test_app_state(media_dir.path()).await;

        TestApp {
            state,
            _media_dir: media_dir,
            _tracing: tracing_guard,
        }
    }
}
