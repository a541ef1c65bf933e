//! CLI command implementations.

pub mod migrate;
pub mod users;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use marketplace_api::db::RepositoryError;
use marketplace_api::services::auth::AuthError;

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository operation failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Account creation or lookup failed.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Invalid argument.
    #[error("{0}")]
    InvalidArgument(String),
}

/// `MARKETPLACE_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();
    std::env::var("MARKETPLACE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("MARKETPLACE_DATABASE_URL"))
}

/// Connect with the same pool settings as the API server.
async fn connect() -> Result<PgPool, CommandError> {
    let url = database_url()?;
    tracing::info!("Connecting to marketplace database...");
    Ok(marketplace_api::db::create_pool(&url).await?)
}
