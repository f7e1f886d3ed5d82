//! Equipment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the stable CRUD capability set over `equipment` storage.
//! - Execute composed statements and reduce rows into typed results.
//!
//! # Invariants
//! - Inputs are validated before any statement is built or executed.
//! - Every write bumps `updated_at`; only patch-present fields change.
//! - Multi-target APIs never run with an empty target set, which would
//!   otherwise compose to an unconditional statement.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::equipment::{
    EquipmentCreate, EquipmentId, EquipmentKind, EquipmentParameters, EquipmentRecord,
    OperationalStatus,
};
use crate::model::filter::FilterSpec;
use crate::model::patch::UpdatePatch;
use crate::model::validation::ValidationError;
use crate::query::bind::{bind_named, BindError};
use crate::query::compose::{compose_delete, compose_find, compose_update, ComposedQuery};
use log::{debug, error, trace};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Operation a failure is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    Search,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Search => "search",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository error taxonomy.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input is malformed or conflicting.
    Validation(ValidationError),
    /// A targeted operation matched no rows.
    NotFound {
        action: Action,
        ids: Vec<EquipmentId>,
    },
    /// Backing store failure, surfaced without retry.
    Persistence { action: Action, source: DbError },
    /// Composed statement and arguments disagree.
    Statement(BindError),
    /// Persisted row cannot be reduced into a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn persistence(action: Action, err: rusqlite::Error) -> Self {
        Self::Persistence {
            action,
            source: DbError::Sqlite(err),
        }
    }

    /// HTTP-compatible status for the routing layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { action, ids } => {
                let ids = ids
                    .iter()
                    .map(Uuid::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "unable to find equipment [{ids}] for {action}")
            }
            Self::Persistence { action, source } => write!(f, "failed to {action}: {source}"),
            Self::Statement(err) => write!(f, "malformed statement: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted equipment data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "equipment repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "equipment repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "equipment repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Persistence { source, .. } => Some(source),
            Self::Statement(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<BindError> for RepoError {
    fn from(value: BindError) -> Self {
        Self::Statement(value)
    }
}

/// Attaches the attempted action to backing-store failures.
trait DuringAction<T> {
    fn during(self, action: Action) -> RepoResult<T>;
}

impl<T> DuringAction<T> for rusqlite::Result<T> {
    fn during(self, action: Action) -> RepoResult<T> {
        self.map_err(|err| RepoError::persistence(action, err))
    }
}

/// Whether a multi-statement batch commits as one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Atomicity {
    /// Each row commits on its own; a failure keeps earlier rows.
    #[default]
    Independent,
    /// All rows commit together or none do.
    Atomic,
}

/// Capability set the service layer depends on.
pub trait EquipmentRepository {
    /// Inserts one record with a fresh id and default status.
    fn create_one(&self, intent: &EquipmentCreate) -> RepoResult<EquipmentId>;
    /// Inserts records in order and returns their ids in the same order.
    fn create_many(
        &self,
        intents: &[EquipmentCreate],
        atomicity: Atomicity,
    ) -> RepoResult<Vec<EquipmentId>>;
    /// Returns whether the id matched.
    fn update_by_id(&self, id: EquipmentId, patch: &UpdatePatch) -> RepoResult<bool>;
    /// Returns the ids that matched.
    fn update_by_ids(&self, ids: &[EquipmentId], patch: &UpdatePatch)
        -> RepoResult<Vec<EquipmentId>>;
    fn update_by_conditions(
        &self,
        filter: &FilterSpec,
        patch: &UpdatePatch,
    ) -> RepoResult<Vec<EquipmentId>>;
    /// Returns whether the id matched.
    fn delete_by_id(&self, id: EquipmentId) -> RepoResult<bool>;
    fn delete_by_ids(&self, ids: &[EquipmentId]) -> RepoResult<Vec<EquipmentId>>;
    fn delete_by_conditions(&self, filter: &FilterSpec) -> RepoResult<Vec<EquipmentId>>;
    fn find_by_id(&self, id: EquipmentId) -> RepoResult<Option<EquipmentRecord>>;
    fn find_by_ids(&self, ids: &[EquipmentId]) -> RepoResult<Vec<EquipmentRecord>>;
    fn find_by_conditions(&self, filter: &FilterSpec) -> RepoResult<Vec<EquipmentRecord>>;
}

/// SQLite-backed equipment repository.
pub struct SqliteEquipmentRepository<'conn> {
    conn: &'conn Connection,
    max_limit: Option<u32>,
}

impl<'conn> SqliteEquipmentRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_equipment_connection_ready(conn)?;
        Ok(Self {
            conn,
            max_limit: None,
        })
    }

    /// Caps the number of rows a filtered find may return.
    pub fn with_max_limit(mut self, max_limit: Option<u32>) -> Self {
        self.max_limit = max_limit;
        self
    }

    fn find_with_cap(
        &self,
        filter: &FilterSpec,
        max_limit: Option<u32>,
    ) -> RepoResult<Vec<EquipmentRecord>> {
        filter.validate()?;
        let query = compose_find(filter, max_limit);
        self.fetch_records(&query)
    }

    fn fetch_ids(&self, action: Action, query: &ComposedQuery) -> RepoResult<Vec<EquipmentId>> {
        let started_at = Instant::now();
        let bound = bind_named(&query.sql, &query.args)?;
        trace!(
            "event=statement_bound module=repo action={} expands={} args={} sql={}",
            action,
            query.expands,
            bound.values.len(),
            bound.sql
        );

        let mut stmt = self.conn.prepare(&bound.sql).during(action)?;
        let mut rows = stmt
            .query(params_from_iter(bound.values.iter()))
            .during(action)?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().during(action)? {
            let id_text: String = row.get("id").during(action)?;
            ids.push(parse_id(&id_text)?);
        }

        debug!(
            "event=equipment_{} module=repo status=ok rows={} duration_ms={}",
            action,
            ids.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ids)
    }

    fn fetch_records(&self, query: &ComposedQuery) -> RepoResult<Vec<EquipmentRecord>> {
        let action = Action::Search;
        let started_at = Instant::now();
        let bound = bind_named(&query.sql, &query.args)?;
        trace!(
            "event=statement_bound module=repo action={} expands={} args={} sql={}",
            action,
            query.expands,
            bound.values.len(),
            bound.sql
        );

        let mut stmt = self.conn.prepare(&bound.sql).during(action)?;
        let mut rows = stmt
            .query(params_from_iter(bound.values.iter()))
            .during(action)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().during(action)? {
            records.push(parse_equipment_row(row)?);
        }

        debug!(
            "event=equipment_{} module=repo status=ok rows={} duration_ms={}",
            action,
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(records)
    }
}

impl EquipmentRepository for SqliteEquipmentRepository<'_> {
    fn create_one(&self, intent: &EquipmentCreate) -> RepoResult<EquipmentId> {
        intent.validate()?;
        insert_equipment(self.conn, intent, now_epoch_ms()).during(Action::Create)
    }

    fn create_many(
        &self,
        intents: &[EquipmentCreate],
        atomicity: Atomicity,
    ) -> RepoResult<Vec<EquipmentId>> {
        for intent in intents {
            intent.validate()?;
        }

        let started_at = Instant::now();
        let now_ms = now_epoch_ms();
        let result = match atomicity {
            Atomicity::Independent => intents
                .iter()
                .map(|intent| insert_equipment(self.conn, intent, now_ms))
                .collect::<rusqlite::Result<Vec<_>>>(),
            Atomicity::Atomic => self.conn.unchecked_transaction().and_then(|tx| {
                let ids = intents
                    .iter()
                    .map(|intent| insert_equipment(&tx, intent, now_ms))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                tx.commit()?;
                Ok(ids)
            }),
        };

        match result {
            Ok(ids) => {
                debug!(
                    "event=equipment_create module=repo status=ok rows={} atomic={} duration_ms={}",
                    ids.len(),
                    atomicity == Atomicity::Atomic,
                    started_at.elapsed().as_millis()
                );
                Ok(ids)
            }
            Err(err) => {
                error!(
                    "event=equipment_create module=repo status=error requested={} atomic={} error={}",
                    intents.len(),
                    atomicity == Atomicity::Atomic,
                    err
                );
                Err(RepoError::persistence(Action::Create, err))
            }
        }
    }

    fn update_by_id(&self, id: EquipmentId, patch: &UpdatePatch) -> RepoResult<bool> {
        Ok(!self.update_by_ids(&[id], patch)?.is_empty())
    }

    fn update_by_ids(
        &self,
        ids: &[EquipmentId],
        patch: &UpdatePatch,
    ) -> RepoResult<Vec<EquipmentId>> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyTargetSet.into());
        }
        self.update_by_conditions(&FilterSpec::for_ids(ids), patch)
    }

    fn update_by_conditions(
        &self,
        filter: &FilterSpec,
        patch: &UpdatePatch,
    ) -> RepoResult<Vec<EquipmentId>> {
        filter.validate()?;
        patch.validate()?;
        let query = compose_update(filter, patch, now_epoch_ms())?;
        self.fetch_ids(Action::Update, &query)
    }

    fn delete_by_id(&self, id: EquipmentId) -> RepoResult<bool> {
        Ok(!self.delete_by_ids(&[id])?.is_empty())
    }

    fn delete_by_ids(&self, ids: &[EquipmentId]) -> RepoResult<Vec<EquipmentId>> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyTargetSet.into());
        }
        self.delete_by_conditions(&FilterSpec::for_ids(ids))
    }

    fn delete_by_conditions(&self, filter: &FilterSpec) -> RepoResult<Vec<EquipmentId>> {
        filter.validate()?;
        let query = compose_delete(filter);
        self.fetch_ids(Action::Delete, &query)
    }

    fn find_by_id(&self, id: EquipmentId) -> RepoResult<Option<EquipmentRecord>> {
        Ok(self.find_by_ids(&[id])?.into_iter().next())
    }

    fn find_by_ids(&self, ids: &[EquipmentId]) -> RepoResult<Vec<EquipmentRecord>> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyTargetSet.into());
        }
        // Explicit id sets are never clamped, or the partition would report
        // clamped-away rows as unfound.
        self.find_with_cap(&FilterSpec::for_ids(ids), None)
    }

    fn find_by_conditions(&self, filter: &FilterSpec) -> RepoResult<Vec<EquipmentRecord>> {
        self.find_with_cap(filter, self.max_limit)
    }
}

fn insert_equipment(
    conn: &Connection,
    intent: &EquipmentCreate,
    now_ms: i64,
) -> rusqlite::Result<EquipmentId> {
    let id = Uuid::now_v7();
    conn.execute(
        "INSERT INTO equipment (
            id,
            kind,
            status,
            parameters,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
        params![
            id.to_string(),
            intent.kind.code(),
            OperationalStatus::default().code(),
            parameters_to_db(&intent.parameters),
            now_ms,
        ],
    )?;
    Ok(id)
}

fn parse_equipment_row(row: &Row<'_>) -> RepoResult<EquipmentRecord> {
    let action = Action::Search;

    let id_text: String = row.get("id").during(action)?;
    let id = parse_id(&id_text)?;

    let kind_code: i64 = row.get("kind").during(action)?;
    let kind = EquipmentKind::from_code(kind_code).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid kind `{kind_code}` in equipment.kind"))
    })?;

    let status_code: i64 = row.get("status").during(action)?;
    let status = OperationalStatus::from_code(status_code).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_code}` in equipment.status"))
    })?;

    let parameters_text: String = row.get("parameters").during(action)?;
    let parameters: EquipmentParameters =
        serde_json::from_str(&parameters_text).map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid parameters document for equipment {id}: {err}"
            ))
        })?;

    let record = EquipmentRecord {
        id,
        kind,
        status,
        parameters,
        created_at: row.get("created_at").during(action)?,
        updated_at: row.get("updated_at").during(action)?,
    };
    record.validate().map_err(|err| {
        RepoError::InvalidData(format!("equipment {id} violates record invariants: {err}"))
    })?;
    Ok(record)
}

fn parse_id(value: &str) -> RepoResult<EquipmentId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in equipment.id")))
}

fn parameters_to_db(parameters: &EquipmentParameters) -> String {
    serde_json::Value::Object(parameters.clone()).to_string()
}

fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn ensure_equipment_connection_ready(conn: &Connection) -> RepoResult<()> {
    let action = Action::Search;
    let expected_version = latest_version();
    let actual_version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .during(action)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "equipment").during(action)? {
        return Err(RepoError::MissingRequiredTable("equipment"));
    }

    for column in [
        "id",
        "kind",
        "status",
        "parameters",
        "created_at",
        "updated_at",
    ] {
        if !table_has_column(conn, "equipment", column).during(action)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "equipment",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
