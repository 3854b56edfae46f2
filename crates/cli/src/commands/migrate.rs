//! Database migration command.
//!
//! Applies the SQL files in the workspace `migrations/` directory. Already
//! applied versions are skipped, so the command is safe to rerun.

use super::connect;

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = connect().await?;

    let migrator = sqlx::migrate!("../../migrations");
    tracing::info!(available = migrator.iter().count(), "Running migrations");
    migrator.run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
