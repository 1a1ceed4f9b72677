use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;
use crate::models::{ApplicationRecord, ApplicationStatus, NewApplicationRecord};

/// Where attempt outcomes are recorded.
pub trait AuditLedger {
    /// Stores `record` and returns its newly assigned id.
    fn append(&self, record: &NewApplicationRecord) -> Result<i64, LedgerError>;
}

/// Append-only SQLite ledger of application attempts.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Opens (and if needed creates) the ledger at `path`, or the default location.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open ledger at {}", path.display()))?;
        let db = Self { conn, path };
        db.init()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "autoapply") {
            proj_dirs.data_dir().join("applications.db")
        } else {
            PathBuf::from("applications.db")
        }
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_title TEXT,
                company_name TEXT,
                application_status TEXT NOT NULL CHECK (application_status IN ('Submitted', 'Failed', 'Skipped')),
                application_date TEXT NOT NULL DEFAULT (datetime('now')),
                job_link TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(application_status);
            "#,
            )
            .context("Failed to create applications table")?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<ApplicationRecord>> {
        let result = self.conn.query_row(
            "SELECT id, job_title, company_name, application_status, application_date, job_link
             FROM applications WHERE id = ?1",
            [id],
            Self::row_to_record,
        );
        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Newest first.
    pub fn list(&self, status: Option<ApplicationStatus>, limit: Option<usize>) -> Result<Vec<ApplicationRecord>> {
        let mut sql = String::from(
            "SELECT id, job_title, company_name, application_status, application_date, job_link
             FROM applications",
        );
        if status.is_some() {
            sql.push_str(" WHERE application_status = ?1");
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(s) = status {
            stmt.query_map([s.as_str()], Self::row_to_record)?
        } else {
            stmt.query_map([], Self::row_to_record)?
        };

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list applications")
    }

    pub fn counts_by_status(&self) -> Result<HashMap<ApplicationStatus, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT application_status, COUNT(*) FROM applications GROUP BY application_status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = ApplicationStatus::parse(&status) {
                counts.insert(status, count);
            }
        }
        Ok(counts)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ApplicationRecord> {
        let status: String = row.get(3)?;
        let status = ApplicationStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown application status '{}'", status).into(),
            )
        })?;
        Ok(ApplicationRecord {
            id: row.get(0)?,
            job_title: row.get(1)?,
            company_name: row.get(2)?,
            status,
            submitted_at: row.get(4)?,
            job_link: row.get(5)?,
        })
    }
}

impl AuditLedger for Database {
    fn append(&self, record: &NewApplicationRecord) -> Result<i64, LedgerError> {
        self.conn.execute(
            "INSERT INTO applications (job_title, company_name, application_status, job_link)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.job_title,
                record.company_name,
                record.status.as_str(),
                record.job_link
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
