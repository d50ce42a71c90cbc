pub mod assistant;
pub mod backup;
pub mod config;
pub mod crypto;
pub mod db;
pub mod extraction;
pub mod models;
pub mod stats;

use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter. Returns false if a subscriber was already installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok()
}

/// Open the store at the platform data path and kick off the automatic
/// backup in the background. Outside a tokio runtime the backup is skipped.
pub fn start() -> Result<Connection, db::DatabaseError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let db_path = config::database_path();
    let conn = db::open_database(&db_path)?;
    backup::schedule_auto_backup(db_path, backup::BackupDirectory::new(config::backup_dir()));
    Ok(conn)
}
