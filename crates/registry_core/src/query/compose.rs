//! Statement composition for find/update/delete over the `equipment` table.
//!
//! # Responsibility
//! - Combine a base clause, generated conditions and (for find) ordering and
//!   pagination into one named-placeholder statement.
//!
//! # Invariants
//! - Update SET only names fields present in the patch, plus the
//!   `updated_at` bump.
//! - An empty patch never produces a statement.
//! - Write statements return the affected identifiers.

use crate::model::filter::FilterSpec;
use crate::model::patch::UpdatePatch;
use crate::model::validation::ValidationError;
use crate::query::condition::{build_conditions, Arg, NamedArgs};
use rusqlite::types::Value;

pub const EQUIPMENT_SELECT_SQL: &str = "SELECT
    id,
    kind,
    status,
    parameters,
    created_at,
    updated_at
FROM equipment";

const EQUIPMENT_UPDATE_SQL: &str = "UPDATE equipment SET";
const EQUIPMENT_DELETE_SQL: &str = "DELETE FROM equipment";
const RETURNING_ID_SQL: &str = " RETURNING id";

/// Named-placeholder statement ready for `bind_named`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub sql: String,
    pub args: NamedArgs,
    /// Set when at least one argument is a collection needing IN-expansion.
    pub expands: bool,
}

impl ComposedQuery {
    fn new(sql: String, args: NamedArgs) -> Self {
        let expands = args.has_list();
        Self { sql, args, expands }
    }
}

/// Composes a select over matching rows.
///
/// `max_limit` clamps the requested limit; when the filter has no limit the
/// clamp itself becomes the limit.
pub fn compose_find(filter: &FilterSpec, max_limit: Option<u32>) -> ComposedQuery {
    let conditions = build_conditions(filter);
    let mut sql = format!("{EQUIPMENT_SELECT_SQL}{}", conditions.where_clause());
    let mut args = conditions.into_args();

    if !filter.sort.is_empty() {
        let order = filter
            .sort
            .iter()
            .map(|key| format!("{} {}", key.field.column(), key.direction.sql()))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }

    let limit = match (filter.limit, max_limit) {
        (Some(requested), Some(cap)) => Some(requested.min(cap)),
        (requested, cap) => requested.or(cap),
    };

    match (limit, filter.offset) {
        (Some(limit), offset) => {
            sql.push_str(" LIMIT :limit");
            args.insert("limit", Arg::Scalar(Value::Integer(i64::from(limit))));
            if let Some(offset) = offset {
                sql.push_str(" OFFSET :offset");
                args.insert("offset", Arg::Scalar(Value::Integer(i64::from(offset))));
            }
        }
        (None, Some(offset)) => {
            // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
            sql.push_str(" LIMIT -1 OFFSET :offset");
            args.insert("offset", Arg::Scalar(Value::Integer(i64::from(offset))));
        }
        (None, None) => {}
    }

    ComposedQuery::new(sql, args)
}

/// Composes a partial update over matching rows returning affected ids.
///
/// Sort and pagination take no part in writes. `now_ms` is the write
/// timestamp; `updated_at` never drops below `created_at` even when the
/// clock is behind the stored creation time.
///
/// # Errors
/// - `NothingToUpdate` when the patch carries no field.
pub fn compose_update(
    filter: &FilterSpec,
    patch: &UpdatePatch,
    now_ms: i64,
) -> Result<ComposedQuery, ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::NothingToUpdate);
    }

    let conditions = build_conditions(filter);
    let where_clause = conditions.where_clause();
    let mut args = conditions.into_args();
    let mut assignments = Vec::with_capacity(3);

    if let Some(status) = patch.status {
        assignments.push("status = :set_status");
        args.insert("set_status", Arg::Scalar(Value::Integer(status.code())));
    }
    if let Some(parameters) = &patch.parameters {
        assignments.push("parameters = :set_parameters");
        args.insert(
            "set_parameters",
            Arg::Scalar(Value::Text(serde_json::Value::Object(parameters.clone()).to_string())),
        );
    }
    assignments.push("updated_at = MAX(created_at, :set_updated_at)");
    args.insert("set_updated_at", Arg::Scalar(Value::Integer(now_ms)));

    let sql = format!(
        "{EQUIPMENT_UPDATE_SQL} {}{where_clause}{RETURNING_ID_SQL}",
        assignments.join(", ")
    );
    Ok(ComposedQuery::new(sql, args))
}

/// Composes a delete over matching rows returning affected ids.
///
/// Sort and pagination take no part in writes.
pub fn compose_delete(filter: &FilterSpec) -> ComposedQuery {
    let conditions = build_conditions(filter);
    let sql = format!(
        "{EQUIPMENT_DELETE_SQL}{}{RETURNING_ID_SQL}",
        conditions.where_clause()
    );
    ComposedQuery::new(sql, conditions.into_args())
}
