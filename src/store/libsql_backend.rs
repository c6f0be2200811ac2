//! libSQL backend — `OnboardingStore` over a local SQLite file.
//!
//! Every unit of work opens its own connection and runs inside a
//! `BEGIN IMMEDIATE` transaction, so each one sees a fully committed view.
//! SQLite allows one writer per file; units queue for it on an async gate
//! before `BEGIN`, so a waiting unit yields its task instead of sleeping in
//! SQLite's busy handler. Reads use a deferred transaction for a consistent
//! snapshot and never take the gate.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Transaction, TransactionBehavior, params};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::profile::ProfileSnapshot;
use crate::onboarding::state::{StepProgressRecord, StepStatus};
use crate::onboarding::status::DerivedOnboardingStatus;
use crate::store::migrations;
use crate::store::traits::{EmployeeOnboarding, OnboardingStore, StatusEntry, UnitOfWork};

/// How long a connection waits on a write lock held by another process.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// libSQL database backend.
pub struct LibSqlBackend {
    db: Arc<LibSqlDatabase>,
    /// Held by the open unit of work, if any.
    writer: Arc<AsyncMutex<()>>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            writer: Arc::new(AsyncMutex::new(())),
        };
        let conn = backend.connect().await?;
        pragma(&conn, "PRAGMA journal_mode = WAL").await?;
        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Open a fresh connection with the busy timeout applied.
    async fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        pragma(&conn, &format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}")).await?;
        Ok(conn)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Run a PRAGMA that reports its value as a row.
async fn pragma(conn: &Connection, sql: &str) -> Result<(), DatabaseError> {
    let mut rows = conn
        .query(sql, ())
        .await
        .map_err(|e| DatabaseError::Pool(format!("{sql}: {e}")))?;
    rows.next()
        .await
        .map_err(|e| DatabaseError::Pool(format!("{sql}: {e}")))?;
    Ok(())
}

/// Map a libsql error, singling out constraint violations.
fn query_error(op: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("constraint failed") {
        DatabaseError::Constraint(format!("{op}: {message}"))
    } else {
        DatabaseError::Query(format!("{op}: {message}"))
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("bad timestamp {s:?}: {e}")))
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    s.as_deref().map(parse_datetime).transpose()
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("bad uuid {s:?}: {e}")))
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn opt_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    opt_text_owned(dt.map(|d| d.to_rfc3339()))
}

fn column_error(e: libsql::Error) -> DatabaseError {
    DatabaseError::Serialization(format!("column read: {e}"))
}

const PROGRESS_COLUMNS: &str = "id, employee_id, step_id, status, completed_at";

const PROFILE_COLUMNS: &str = "phone_number, emergency_contact_name, emergency_contact_phone, \
     current_address, bank_account_number, bank_name, bank_routing_code, tax_id, national_id";

const STATUS_COLUMNS: &str =
    "is_onboarded, completed_steps, total_steps, percentage, onboarding_completed_at";

/// Map a libsql Row to a StepProgressRecord. Column order matches PROGRESS_COLUMNS.
fn row_to_progress(row: &libsql::Row) -> Result<StepProgressRecord, DatabaseError> {
    let id: String = row.get(0).map_err(column_error)?;
    let employee_id: String = row.get(1).map_err(column_error)?;
    let step_id: String = row.get(2).map_err(column_error)?;
    let status: String = row.get(3).map_err(column_error)?;
    let completed_at: Option<String> = row.get::<String>(4).ok();

    Ok(StepProgressRecord {
        id: parse_uuid(&id)?,
        employee_id: parse_uuid(&employee_id)?,
        step_id,
        status: status
            .parse::<StepStatus>()
            .map_err(DatabaseError::Serialization)?,
        completed_at: parse_optional_datetime(completed_at)?,
    })
}

/// Map a libsql Row to a ProfileSnapshot. Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> ProfileSnapshot {
    let text = |i: i32| row.get::<String>(i).ok();
    ProfileSnapshot {
        phone_number: text(0),
        emergency_contact_name: text(1),
        emergency_contact_phone: text(2),
        current_address: text(3),
        bank_account_number: text(4),
        bank_name: text(5),
        bank_routing_code: text(6),
        tax_id: text(7),
        national_id: text(8),
    }
}

/// Map a libsql Row to a DerivedOnboardingStatus, starting at column `offset`.
fn row_to_status(row: &libsql::Row, offset: i32) -> Result<DerivedOnboardingStatus, DatabaseError> {
    let is_onboarded: i64 = row.get(offset).map_err(column_error)?;
    let completed_steps: i64 = row.get(offset + 1).map_err(column_error)?;
    let total_steps: i64 = row.get(offset + 2).map_err(column_error)?;
    let percentage: f64 = row.get(offset + 3).map_err(column_error)?;
    let completed_at: Option<String> = row.get::<String>(offset + 4).ok();

    Ok(DerivedOnboardingStatus {
        is_onboarded: is_onboarded != 0,
        completed_steps: completed_steps as u32,
        total_steps: total_steps as u32,
        percentage,
        onboarding_completed_at: parse_optional_datetime(completed_at)?,
    })
}

// ── Queries shared by reads and units of work ───────────────────────

async fn select_progress(
    conn: &Connection,
    employee_id: Uuid,
) -> Result<Vec<StepProgressRecord>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {PROGRESS_COLUMNS} FROM step_progress WHERE employee_id = ?1 ORDER BY rowid"
            ),
            params![employee_id.to_string()],
        )
        .await
        .map_err(|e| query_error("load_progress", e))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().await.map_err(|e| query_error("load_progress", e))? {
        records.push(row_to_progress(&row)?);
    }
    Ok(records)
}

async fn select_profile(
    conn: &Connection,
    employee_id: Uuid,
) -> Result<ProfileSnapshot, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {PROFILE_COLUMNS} FROM employee_profiles WHERE employee_id = ?1"),
            params![employee_id.to_string()],
        )
        .await
        .map_err(|e| query_error("load_profile", e))?;

    match rows.next().await.map_err(|e| query_error("load_profile", e))? {
        Some(row) => Ok(row_to_profile(&row)),
        None => Ok(ProfileSnapshot::default()),
    }
}

async fn select_status(
    conn: &Connection,
    employee_id: Uuid,
) -> Result<Option<DerivedOnboardingStatus>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {STATUS_COLUMNS} FROM onboarding_status WHERE employee_id = ?1"),
            params![employee_id.to_string()],
        )
        .await
        .map_err(|e| query_error("load_status", e))?;

    match rows.next().await.map_err(|e| query_error("load_status", e))? {
        Some(row) => Ok(Some(row_to_status(&row, 0)?)),
        None => Ok(None),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl OnboardingStore for LibSqlBackend {
    async fn begin(&self, employee_id: Uuid) -> Result<Box<dyn UnitOfWork>, DatabaseError> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let conn = self.connect().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::Transaction(format!("begin: {e}")))?;
        debug!(%employee_id, "libSQL unit of work opened");
        Ok(Box::new(LibSqlUnit {
            employee_id,
            tx,
            _writer: writer,
        }))
    }

    async fn read(&self, employee_id: Uuid) -> Result<EmployeeOnboarding, DatabaseError> {
        let conn = self.connect().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("read: {e}")))?;

        let progress = select_progress(&tx, employee_id).await?;
        let profile = select_profile(&tx, employee_id).await?;
        let status = select_status(&tx, employee_id).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("read: {e}")))?;

        Ok(EmployeeOnboarding {
            progress,
            profile,
            status,
        })
    }

    async fn list_employees(&self) -> Result<Vec<Uuid>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT employee_id FROM step_progress
                 UNION
                 SELECT employee_id FROM onboarding_status
                 ORDER BY employee_id",
                (),
            )
            .await
            .map_err(|e| query_error("list_employees", e))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| query_error("list_employees", e))?
        {
            let id: String = row.get(0).map_err(column_error)?;
            ids.push(parse_uuid(&id)?);
        }
        Ok(ids)
    }

    async fn list_statuses(&self) -> Result<Vec<StatusEntry>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT employee_id, {STATUS_COLUMNS} FROM onboarding_status ORDER BY employee_id"
                ),
                (),
            )
            .await
            .map_err(|e| query_error("list_statuses", e))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| query_error("list_statuses", e))?
        {
            let id: String = row.get(0).map_err(column_error)?;
            entries.push(StatusEntry {
                employee_id: parse_uuid(&id)?,
                status: row_to_status(&row, 1)?,
            });
        }
        Ok(entries)
    }
}

/// A unit of work backed by one `BEGIN IMMEDIATE` transaction.
struct LibSqlUnit {
    employee_id: Uuid,
    tx: Transaction,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl UnitOfWork for LibSqlUnit {
    fn employee_id(&self) -> Uuid {
        self.employee_id
    }

    async fn load_progress(&mut self) -> Result<Vec<StepProgressRecord>, DatabaseError> {
        select_progress(&self.tx, self.employee_id).await
    }

    async fn insert_progress(
        &mut self,
        records: &[StepProgressRecord],
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        for record in records {
            self.tx
                .execute(
                    "INSERT INTO step_progress (id, employee_id, step_id, status, completed_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        record.id.to_string(),
                        record.employee_id.to_string(),
                        record.step_id.clone(),
                        record.status.as_str(),
                        opt_datetime(record.completed_at),
                        now.clone()
                    ],
                )
                .await
                .map_err(|e| query_error("insert_progress", e))?;
        }
        Ok(())
    }

    async fn update_progress(&mut self, record: &StepProgressRecord) -> Result<(), DatabaseError> {
        let count = self
            .tx
            .execute(
                "UPDATE step_progress SET status = ?1, completed_at = ?2, updated_at = ?3
                 WHERE employee_id = ?4 AND step_id = ?5",
                params![
                    record.status.as_str(),
                    opt_datetime(record.completed_at),
                    Utc::now().to_rfc3339(),
                    self.employee_id.to_string(),
                    record.step_id.clone()
                ],
            )
            .await
            .map_err(|e| query_error("update_progress", e))?;

        if count == 0 {
            return Err(DatabaseError::Query(format!(
                "update_progress: no record for employee {} step {}",
                self.employee_id, record.step_id
            )));
        }
        Ok(())
    }

    async fn load_profile(&mut self) -> Result<ProfileSnapshot, DatabaseError> {
        select_profile(&self.tx, self.employee_id).await
    }

    async fn save_profile(&mut self, profile: &ProfileSnapshot) -> Result<(), DatabaseError> {
        self.tx
            .execute(
                &format!(
                    "INSERT INTO employee_profiles (employee_id, {PROFILE_COLUMNS}, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT (employee_id) DO UPDATE SET
                        phone_number = ?2, emergency_contact_name = ?3,
                        emergency_contact_phone = ?4, current_address = ?5,
                        bank_account_number = ?6, bank_name = ?7, bank_routing_code = ?8,
                        tax_id = ?9, national_id = ?10, updated_at = ?11"
                ),
                params![
                    self.employee_id.to_string(),
                    opt_text_owned(profile.phone_number.clone()),
                    opt_text_owned(profile.emergency_contact_name.clone()),
                    opt_text_owned(profile.emergency_contact_phone.clone()),
                    opt_text_owned(profile.current_address.clone()),
                    opt_text_owned(profile.bank_account_number.clone()),
                    opt_text_owned(profile.bank_name.clone()),
                    opt_text_owned(profile.bank_routing_code.clone()),
                    opt_text_owned(profile.tax_id.clone()),
                    opt_text_owned(profile.national_id.clone()),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| query_error("save_profile", e))?;
        Ok(())
    }

    async fn load_status(&mut self) -> Result<Option<DerivedOnboardingStatus>, DatabaseError> {
        select_status(&self.tx, self.employee_id).await
    }

    async fn save_status(&mut self, status: &DerivedOnboardingStatus) -> Result<(), DatabaseError> {
        self.tx
            .execute(
                &format!(
                    "INSERT INTO onboarding_status (employee_id, {STATUS_COLUMNS}, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT (employee_id) DO UPDATE SET
                        is_onboarded = ?2, completed_steps = ?3, total_steps = ?4,
                        percentage = ?5, onboarding_completed_at = ?6, updated_at = ?7"
                ),
                params![
                    self.employee_id.to_string(),
                    i64::from(status.is_onboarded),
                    i64::from(status.completed_steps),
                    i64::from(status.total_steps),
                    status.percentage,
                    opt_datetime(status.onboarding_completed_at),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| query_error("save_status", e))?;
        Ok(())
    }

    async fn delete_employee(&mut self) -> Result<(), DatabaseError> {
        let id = self.employee_id.to_string();
        for table in ["step_progress", "employee_profiles", "onboarding_status"] {
            self.tx
                .execute(
                    &format!("DELETE FROM {table} WHERE employee_id = ?1"),
                    params![id.clone()],
                )
                .await
                .map_err(|e| query_error("delete_employee", e))?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let LibSqlUnit {
            employee_id,
            tx,
            _writer,
        } = *self;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("commit: {e}")))?;
        debug!(%employee_id, "libSQL unit of work committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        let LibSqlUnit {
            employee_id,
            tx,
            _writer,
        } = *self;
        tx.rollback()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("rollback: {e}")))?;
        debug!(%employee_id, "libSQL unit of work rolled back");
        Ok(())
    }
}
