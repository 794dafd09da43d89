use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;

use contact_relay_core::{StoreError, Submission, SubmissionStore};

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// The database file is created when missing. Every pooled connection runs
    /// in WAL mode with a busy timeout so concurrent submissions queue up
    /// instead of failing on lock contention.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Creates the submissions table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS contact_submissions (\
                id TEXT PRIMARY KEY NOT NULL, \
                name TEXT NOT NULL, \
                email TEXT NOT NULL, \
                subject TEXT NOT NULL, \
                message TEXT NOT NULL, \
                created_at TEXT NOT NULL\
             )",
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Schema)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_contact_submissions_created_at \
             ON contact_submissions (created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Schema)?;

        Ok(())
    }

    /// Returns a handle to the `contact_submissions` table.
    pub fn submissions(&self) -> SubmissionRepository {
        SubmissionRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to prepare schema: {0}")]
    Schema(sqlx::Error),
}

/// Repository responsible for the `contact_submissions` table.
#[derive(Clone)]
pub struct SubmissionRepository {
    pool: SqlitePool,
}

impl SubmissionRepository {
    /// Appends one submission row.
    pub async fn insert(&self, submission: &Submission) -> Result<(), sqlx::Error> {
        let form = submission.contact.form();
        sqlx::query(
            "INSERT INTO contact_submissions (id, name, email, subject, message, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&submission.id)
        .bind(&form.name)
        .bind(&form.email)
        .bind(&form.subject)
        .bind(&form.message)
        .bind(to_rfc3339(submission.received_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for SubmissionRepository {
    async fn save(&self, submission: &Submission) -> Result<(), StoreError> {
        self.insert(submission).await.map_err(classify_error)
    }
}

/// Splits driver errors into "try again later" and "the database said no".
fn classify_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        sqlx::Error::Database(db_err) if is_lock_contention(db_err.code().as_deref()) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Rejected(err.to_string()),
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), extended result codes included.
fn is_lock_contention(code: Option<&str>) -> bool {
    code.and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
