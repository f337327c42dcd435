//! Caller-owned report storage.
//!
//! The core never keeps a process-wide "latest report". Whoever runs checks
//! owns a [`ReportStore`] and hands the latest report to the gate explicitly.
//!
//! - [`FileReportStore`]: `latest.json` published by write-then-rename, plus a
//!   SQLite history of every run (`reality.db`).
//! - [`MemoryReportStore`]: in-process store for embedding and tests.

use crate::core::consensus::ConsensusReport;
use crate::core::db;
use crate::core::error::RealityError;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const LATEST_REPORT_FILE: &str = "latest.json";

pub trait ReportStore: Send + Sync {
    /// Atomically replace the latest report.
    fn publish(&self, report: &ConsensusReport) -> Result<(), RealityError>;

    fn latest(&self) -> Result<Option<ConsensusReport>, RealityError>;
}

/// One row of run history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub report_id: String,
    pub created_at: u64,
    pub score: f64,
    pub fact_count: usize,
    pub conflict_count: usize,
    pub failed_sources: usize,
    pub partial: bool,
}

#[derive(Debug, Clone)]
pub struct FileReportStore {
    root: PathBuf,
}

impl FileReportStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn latest_path(&self) -> PathBuf {
        self.root.join(LATEST_REPORT_FILE)
    }

    fn write_latest(&self, report: &ConsensusReport) -> Result<(), RealityError> {
        fs::create_dir_all(&self.root)?;
        let body = serde_json::to_string_pretty(report)?;
        let tmp_path = self
            .root
            .join(format!(".{}.{}.tmp", LATEST_REPORT_FILE, report.report_id()));
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(body.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(err) = fs::rename(&tmp_path, self.latest_path()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }

    fn record_history(&self, report: &ConsensusReport) -> Result<(), RealityError> {
        let conn = db::initialize_history_db(&self.root)?;
        conn.execute(
            "INSERT OR REPLACE INTO reports(report_id, created_at, score, fact_count, conflict_count, failed_sources, partial, body) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                report.report_id(),
                i64::try_from(report.created_at()).unwrap_or(i64::MAX),
                report.score(),
                report.resolved().len() as i64,
                report.conflicts().len() as i64,
                report.failed_sources().count() as i64,
                report.partial(),
                serde_json::to_string(report)?,
            ],
        )?;
        Ok(())
    }

    /// Most recent runs first.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, RealityError> {
        if !db::history_db_path(&self.root).exists() {
            return Ok(Vec::new());
        }
        let conn = db::initialize_history_db(&self.root)?;
        let mut stmt = conn.prepare(
            "SELECT report_id, created_at, score, fact_count, conflict_count, failed_sources, partial FROM reports ORDER BY created_at DESC, report_id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(HistoryEntry {
                report_id: row.get(0)?,
                created_at: row.get::<_, i64>(1)?.max(0) as u64,
                score: row.get(2)?,
                fact_count: row.get::<_, i64>(3)?.max(0) as usize,
                conflict_count: row.get::<_, i64>(4)?.max(0) as usize,
                failed_sources: row.get::<_, i64>(5)?.max(0) as usize,
                partial: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn load(&self, report_id: &str) -> Result<ConsensusReport, RealityError> {
        let missing = || RealityError::NotFound(format!("report {}", report_id));
        if !db::history_db_path(&self.root).exists() {
            return Err(missing());
        }
        let conn = db::initialize_history_db(&self.root)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM reports WHERE report_id = ?1",
                params![report_id],
                |row| row.get(0),
            )
            .optional()?;
        let body = body.ok_or_else(missing)?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl ReportStore for FileReportStore {
    fn publish(&self, report: &ConsensusReport) -> Result<(), RealityError> {
        // History only lists reports that latest has pointed to.
        self.write_latest(report)?;
        self.record_history(report)
    }

    fn latest(&self) -> Result<Option<ConsensusReport>, RealityError> {
        let path = self.latest_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

#[derive(Debug, Default)]
pub struct MemoryReportStore {
    latest: RwLock<Option<ConsensusReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for MemoryReportStore {
    fn publish(&self, report: &ConsensusReport) -> Result<(), RealityError> {
        let mut slot = self
            .latest
            .write()
            .map_err(|_| RealityError::ValidationError("report store lock poisoned".to_string()))?;
        *slot = Some(report.clone());
        Ok(())
    }

    fn latest(&self) -> Result<Option<ConsensusReport>, RealityError> {
        let slot = self
            .latest
            .read()
            .map_err(|_| RealityError::ValidationError("report store lock poisoned".to_string()))?;
        Ok(slot.clone())
    }
}
