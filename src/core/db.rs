use crate::core::error::RealityError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const HISTORY_DB_NAME: &str = "reality.db";

pub const HISTORY_DB_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reports (
    report_id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    score REAL NOT NULL,
    fact_count INTEGER NOT NULL,
    conflict_count INTEGER NOT NULL,
    failed_sources INTEGER NOT NULL,
    partial INTEGER NOT NULL,
    body TEXT NOT NULL
)";

pub const HISTORY_DB_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at)";

pub fn db_connect(db_path: &Path) -> Result<Connection, RealityError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    Ok(conn)
}

pub fn history_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(HISTORY_DB_NAME)
}

pub fn initialize_history_db(data_dir: &Path) -> Result<Connection, RealityError> {
    std::fs::create_dir_all(data_dir)?;
    let conn = db_connect(&history_db_path(data_dir))?;
    conn.execute(HISTORY_DB_SCHEMA, [])?;
    conn.execute(HISTORY_DB_INDEX, [])?;
    Ok(conn)
}
