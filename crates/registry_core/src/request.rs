//! Request-shape parsing for the routing boundary.
//!
//! # Responsibility
//! - Turn query pairs, id path segments and JSON bodies into validated
//!   model values.
//! - Map operations and outcomes onto HTTP-compatible status codes.
//!
//! # Invariants
//! - Nothing here touches storage; every failure is a `ValidationError`.
//! - Negation uses the `~` prefix only (`~kind`, `~status`, `~id`).
//! - Multi-valued parameters are comma-separated and blank items are skipped,
//!   except in `sort`, where every entry must name a field.

use crate::model::equipment::{
    EquipmentCreate, EquipmentId, EquipmentKind, EquipmentParameters, OperationalStatus,
};
use crate::model::filter::{FilterSpec, RawFilter};
use crate::model::patch::UpdatePatch;
use crate::model::validation::ValidationError;
use crate::repo::equipment_repo::RepoError;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

/// Query parameter vocabulary accepted by filtered operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum QueryKey {
    Id,
    NotId,
    Kind,
    NotKind,
    Status,
    NotStatus,
    CreatedSince,
    CreatedUntil,
    UpdatedSince,
    UpdatedUntil,
    Sort,
    Limit,
    Offset,
}

impl QueryKey {
    const ALL: [Self; 13] = [
        Self::Id,
        Self::NotId,
        Self::Kind,
        Self::NotKind,
        Self::Status,
        Self::NotStatus,
        Self::CreatedSince,
        Self::CreatedUntil,
        Self::UpdatedSince,
        Self::UpdatedUntil,
        Self::Sort,
        Self::Limit,
        Self::Offset,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::NotId => "~id",
            Self::Kind => "kind",
            Self::NotKind => "~kind",
            Self::Status => "status",
            Self::NotStatus => "~status",
            Self::CreatedSince => "created_since",
            Self::CreatedUntil => "created_until",
            Self::UpdatedSince => "updated_since",
            Self::UpdatedUntil => "updated_until",
            Self::Sort => "sort",
            Self::Limit => "limit",
            Self::Offset => "offset",
        }
    }

    fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }
}

/// Parses decoded query pairs into a validated filter.
///
/// # Errors
/// - `UnknownParameter` for names outside the vocabulary, `no_kind` included.
/// - `InvalidFieldValue` for repeated names and malformed values.
/// - Any error from `RawFilter::validate`.
pub fn parse_filter_query<K, V>(
    pairs: impl IntoIterator<Item = (K, V)>,
) -> Result<FilterSpec, ValidationError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut raw = RawFilter::default();
    let mut seen = HashSet::new();

    for (name, value) in pairs {
        let name = name.as_ref().trim();
        let value = value.as_ref();
        let key = QueryKey::lookup(name)
            .ok_or_else(|| ValidationError::UnknownParameter(name.to_string()))?;
        if !seen.insert(key) {
            return Err(ValidationError::InvalidFieldValue {
                field: key.name(),
                value: format!("repeated parameter `{value}`"),
            });
        }

        let field = key.name();
        match key {
            QueryKey::Id => raw.ids = parse_id_items(value)?,
            QueryKey::NotId => raw.exclude_ids = parse_id_items(value)?,
            QueryKey::Kind => raw.kinds = split_items(value),
            QueryKey::NotKind => raw.exclude_kinds = split_items(value),
            QueryKey::Status => raw.statuses = split_items(value),
            QueryKey::NotStatus => raw.exclude_statuses = split_items(value),
            QueryKey::CreatedSince => raw.created_since = Some(parse_timestamp(field, value)?),
            QueryKey::CreatedUntil => raw.created_until = Some(parse_timestamp(field, value)?),
            QueryKey::UpdatedSince => raw.updated_since = Some(parse_timestamp(field, value)?),
            QueryKey::UpdatedUntil => raw.updated_until = Some(parse_timestamp(field, value)?),
            QueryKey::Sort => raw.sort = split_entries(value),
            QueryKey::Limit => raw.limit = Some(parse_integer(field, value)?),
            QueryKey::Offset => raw.offset = Some(parse_integer(field, value)?),
        }
    }

    raw.validate()
}

/// Parses an RFC 3339 timestamp or integer epoch milliseconds.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    let trimmed = value.trim();
    if let Ok(epoch_ms) = trimmed.parse::<i64>() {
        return Ok(epoch_ms);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|timestamp| timestamp.timestamp_millis())
        .map_err(|_| ValidationError::InvalidFieldValue {
            field,
            value: value.to_string(),
        })
}

/// Parses an id path segment such as `a,b` or `a b`.
///
/// Duplicates collapse to their first occurrence.
///
/// # Errors
/// - `InvalidIdentifier` for the first item that is not a UUID.
/// - `EmptyTargetSet` when the segment holds no ids.
pub fn parse_id_list(segment: &str) -> Result<Vec<EquipmentId>, ValidationError> {
    let ids = parse_id_items(segment)?;
    if ids.is_empty() {
        return Err(ValidationError::EmptyTargetSet);
    }
    Ok(ids)
}

fn parse_id_items(value: &str) -> Result<Vec<EquipmentId>, ValidationError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for item in value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|item| !item.is_empty())
    {
        let id = Uuid::parse_str(item)
            .map_err(|_| ValidationError::InvalidIdentifier(item.to_string()))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn split_items(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits a sort list keeping blank entries, so their positions are reported.
fn split_entries(value: &str) -> Vec<String> {
    value.split(',').map(|entry| entry.trim().to_string()).collect()
}

fn parse_integer(field: &'static str, value: &str) -> Result<i64, ValidationError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidFieldValue {
            field,
            value: value.to_string(),
        })
}

/// Enumerated value given either by numeric code or by name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Code(i64),
    Name(String),
}

impl CodeOrName {
    fn resolve<T>(
        &self,
        field: &'static str,
        from_code: impl Fn(i64) -> Option<T>,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, ValidationError> {
        let resolved = match self {
            Self::Code(code) => from_code(*code),
            Self::Name(name) => parse(name),
        };
        resolved.ok_or_else(|| ValidationError::InvalidFieldValue {
            field,
            value: match self {
                Self::Code(code) => code.to_string(),
                Self::Name(name) => name.clone(),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateItem {
    kind: CodeOrName,
    parameters: Option<EquipmentParameters>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatchItem {
    #[serde(default)]
    status: Option<CodeOrName>,
    #[serde(default)]
    parameters: Option<EquipmentParameters>,
}

/// Creation body: one object or an array of objects.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateBody {
    One(EquipmentCreate),
    Many(Vec<EquipmentCreate>),
}

impl CreateBody {
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Many(_))
    }

    pub fn into_intents(self) -> Vec<EquipmentCreate> {
        match self {
            Self::One(intent) => vec![intent],
            Self::Many(intents) => intents,
        }
    }
}

/// Parses `{kind, parameters}` or `[{kind, parameters}, ...]`.
///
/// # Errors
/// - `InvalidBody` for malformed JSON, an empty array, unknown fields or a
///   missing `parameters` document.
/// - `InvalidFieldValue` for an unknown kind.
pub fn parse_create_body(body: &str) -> Result<CreateBody, ValidationError> {
    match parse_json(body)? {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(ValidationError::InvalidBody(
                    "expected at least one equipment item".to_string(),
                ));
            }
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| parse_create_item(item, Some(index)))
                .collect::<Result<Vec<_>, _>>()
                .map(CreateBody::Many)
        }
        item @ Value::Object(_) => parse_create_item(item, None).map(CreateBody::One),
        _ => Err(ValidationError::InvalidBody(
            "expected an object or an array of objects".to_string(),
        )),
    }
}

fn parse_create_item(
    item: Value,
    index: Option<usize>,
) -> Result<EquipmentCreate, ValidationError> {
    let at = index.map(|index| format!("item {index}: ")).unwrap_or_default();
    let item: CreateItem = serde_json::from_value(item)
        .map_err(|err| ValidationError::InvalidBody(format!("{at}{err}")))?;
    let kind = item
        .kind
        .resolve("kind", EquipmentKind::from_code, EquipmentKind::parse)?;
    let parameters = item.parameters.ok_or_else(|| {
        ValidationError::InvalidBody(format!("{at}equipment parameters must not be empty"))
    })?;

    let intent = EquipmentCreate::new(kind, parameters);
    intent.validate()?;
    Ok(intent)
}

/// Parses `{status?, parameters?}` into a non-empty patch.
pub fn parse_patch_body(body: &str) -> Result<UpdatePatch, ValidationError> {
    let item: PatchItem = serde_json::from_value(parse_json(body)?)
        .map_err(|err| ValidationError::InvalidBody(err.to_string()))?;
    let status = item
        .status
        .map(|status| {
            status.resolve(
                "status",
                OperationalStatus::from_code,
                OperationalStatus::parse,
            )
        })
        .transpose()?;

    let patch = UpdatePatch {
        status,
        parameters: item.parameters,
    };
    patch.validate()?;
    Ok(patch)
}

fn parse_json(body: &str) -> Result<Value, ValidationError> {
    if body.trim().is_empty() {
        return Err(ValidationError::InvalidBody("request body is empty".to_string()));
    }
    serde_json::from_str(body).map_err(|err| ValidationError::InvalidBody(err.to_string()))
}

/// Routed operations and their full-success status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    UpdateTargets,
    UpdateMatching,
    DeleteTargets,
    DeleteMatching,
    FindTargets,
    FindMatching,
}

impl Operation {
    /// Status when every target matched; partial outcomes use 207 instead.
    pub fn success_status(self) -> u16 {
        match self {
            Self::Create => 201,
            Self::UpdateTargets | Self::DeleteTargets => 204,
            Self::FindTargets | Self::UpdateMatching | Self::DeleteMatching | Self::FindMatching => {
                200
            }
        }
    }

    /// Key naming the matched side of a partition body.
    pub fn partition_label(self) -> &'static str {
        match self {
            Self::UpdateTargets | Self::UpdateMatching => "updated",
            Self::DeleteTargets | Self::DeleteMatching => "deleted",
            Self::Create => "created",
            Self::FindTargets | Self::FindMatching => "found",
        }
    }
}

/// Status and JSON body for a failed operation.
pub fn error_response(err: &RepoError) -> (u16, Value) {
    let body = match err {
        RepoError::NotFound { ids, .. } => json!({ "error": err.to_string(), "unfound": ids }),
        _ => json!({ "error": err.to_string() }),
    };
    (err.status_code(), body)
}
