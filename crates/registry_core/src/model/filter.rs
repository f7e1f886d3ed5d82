//! Record-selection criteria.
//!
//! # Responsibility
//! - Describe which equipment rows an operation targets.
//! - Turn raw, partially-populated caller input into a validated `FilterSpec`.
//!
//! # Invariants
//! - Per dimension, inclusion and exclusion are mutually exclusive; the
//!   `Selection` enum makes the conflict unrepresentable after validation.
//! - Set members keep caller order with duplicates collapsed.
//! - Each sort field appears at most once.
//! - `since <= until` for each time dimension.

use crate::model::equipment::{EquipmentId, EquipmentKind, OperationalStatus};
use crate::model::validation::ValidationError;
use std::collections::HashSet;
use std::hash::Hash;

/// Membership constraint of one set-valued dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    /// No constraint.
    Any,
    /// Value must be one of the members.
    Include(Vec<T>),
    /// Value must be none of the members.
    Exclude(Vec<T>),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self::Any
    }
}

impl<T: Clone + Eq + Hash> Selection<T> {
    /// Builds a selection from an inclusion and an exclusion set.
    ///
    /// # Errors
    /// - `ConflictingFilterFields` when both sets are non-empty.
    pub fn from_sets(
        include: Vec<T>,
        exclude: Vec<T>,
        include_field: &'static str,
        exclude_field: &'static str,
    ) -> Result<Self, ValidationError> {
        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(Self::Any),
            (false, true) => Ok(Self::Include(dedup_in_order(include))),
            (true, false) => Ok(Self::Exclude(dedup_in_order(exclude))),
            (false, false) => Err(ValidationError::ConflictingFilterFields {
                first: include_field,
                second: exclude_field,
            }),
        }
    }
}

impl<T> Selection<T> {
    pub fn values(&self) -> &[T] {
        match self {
            Self::Any => &[],
            Self::Include(values) | Self::Exclude(values) => values,
        }
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, Self::Exclude(_))
    }

    pub fn is_any(&self) -> bool {
        self.values().is_empty()
    }
}

fn dedup_in_order<T: Clone + Eq + Hash>(values: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Columns a result set may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    Kind,
    Status,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        Self::Id,
        Self::Kind,
        Self::Status,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Kind => "kind",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    /// Matches an already normalized (trimmed, lowercase) name.
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.column() == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }

    /// Parses one sort entry such as `kind` or ` -Created_At `.
    ///
    /// A leading `-` selects descending order. The name is trimmed and
    /// case-folded before lookup. `position` is 1-based and only used for
    /// error reporting.
    pub fn parse(entry: &str, position: usize) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidSortKey {
            entry: entry.to_string(),
            position,
        };

        let trimmed = entry.trim();
        let (direction, name) = match trimmed.strip_prefix('-') {
            Some(rest) => (SortDirection::Descending, rest),
            None => (SortDirection::Ascending, trimmed),
        };
        let normalized = name.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(invalid());
        }

        let field = SortField::from_column(&normalized).ok_or_else(invalid)?;
        Ok(Self { field, direction })
    }

    fn render(self) -> String {
        match self.direction {
            SortDirection::Ascending => self.field.column().to_string(),
            SortDirection::Descending => format!("-{}", self.field.column()),
        }
    }
}

/// Optional closed interval over an epoch-millisecond timestamp column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeBounds {
    pub since: Option<i64>,
    pub until: Option<i64>,
}

impl TimeBounds {
    pub fn new(since: Option<i64>, until: Option<i64>) -> Self {
        Self { since, until }
    }

    fn validate(&self, since: &'static str, until: &'static str) -> Result<(), ValidationError> {
        match (self.since, self.until) {
            (Some(lower), Some(upper)) if lower > upper => {
                Err(ValidationError::OrderViolation { since, until })
            }
            _ => Ok(()),
        }
    }
}

/// Validated record-selection criteria.
///
/// `FilterSpec::default()` selects the whole collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub ids: Selection<EquipmentId>,
    pub kinds: Selection<EquipmentKind>,
    pub statuses: Selection<OperationalStatus>,
    pub created: TimeBounds,
    pub updated: TimeBounds,
    pub sort: Vec<SortKey>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl FilterSpec {
    /// Selects exactly the given identifiers.
    pub fn for_ids(ids: &[EquipmentId]) -> Self {
        Self {
            ids: if ids.is_empty() {
                Selection::Any
            } else {
                Selection::Include(dedup_in_order(ids.to_vec()))
            },
            ..Self::default()
        }
    }

    /// Re-checks invariants the field types cannot express.
    ///
    /// # Errors
    /// - `OrderViolation` when a `since` bound is after its `until` bound.
    /// - `InvalidSortKey` when a sort field is repeated.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.created.validate("created_since", "created_until")?;
        self.updated.validate("updated_since", "updated_until")?;

        let mut seen = HashSet::with_capacity(self.sort.len());
        for (index, key) in self.sort.iter().enumerate() {
            if !seen.insert(key.field) {
                return Err(ValidationError::InvalidSortKey {
                    entry: key.render(),
                    position: index + 1,
                });
            }
        }
        Ok(())
    }

    /// Returns true when no predicate restricts the target rows.
    ///
    /// Sort and pagination do not count as restrictions.
    pub fn is_unconditional(&self) -> bool {
        self.ids.is_any()
            && self.kinds.is_any()
            && self.statuses.is_any()
            && self.created == TimeBounds::default()
            && self.updated == TimeBounds::default()
    }
}

/// Unvalidated filter input as received from a caller.
///
/// Kind/status/sort entries stay textual so failures can quote the offending
/// value. Limit/offset are signed so negative input can be reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFilter {
    pub ids: Vec<EquipmentId>,
    pub exclude_ids: Vec<EquipmentId>,
    pub kinds: Vec<String>,
    pub exclude_kinds: Vec<String>,
    pub statuses: Vec<String>,
    pub exclude_statuses: Vec<String>,
    pub created_since: Option<i64>,
    pub created_until: Option<i64>,
    pub updated_since: Option<i64>,
    pub updated_until: Option<i64>,
    pub sort: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RawFilter {
    /// Validates and normalizes raw input into a `FilterSpec`.
    ///
    /// Dimension conflicts are checked before anything else, so a filter with
    /// both sets of one dimension populated is rejected regardless of the
    /// other fields.
    pub fn validate(self) -> Result<FilterSpec, ValidationError> {
        ensure_exclusive(&self.ids, &self.exclude_ids, "id", "~id")?;
        ensure_exclusive(&self.kinds, &self.exclude_kinds, "kind", "~kind")?;
        ensure_exclusive(&self.statuses, &self.exclude_statuses, "status", "~status")?;

        let kinds = parse_members(&self.kinds, "kind", EquipmentKind::parse)?;
        let exclude_kinds = parse_members(&self.exclude_kinds, "~kind", EquipmentKind::parse)?;
        let statuses = parse_members(&self.statuses, "status", OperationalStatus::parse)?;
        let exclude_statuses =
            parse_members(&self.exclude_statuses, "~status", OperationalStatus::parse)?;

        let sort = parse_sort(&self.sort)?;

        let filter = FilterSpec {
            ids: Selection::from_sets(self.ids, self.exclude_ids, "id", "~id")?,
            kinds: Selection::from_sets(kinds, exclude_kinds, "kind", "~kind")?,
            statuses: Selection::from_sets(statuses, exclude_statuses, "status", "~status")?,
            created: TimeBounds::new(self.created_since, self.created_until),
            updated: TimeBounds::new(self.updated_since, self.updated_until),
            sort,
            limit: non_negative(self.limit, "limit")?,
            offset: non_negative(self.offset, "offset")?,
        };
        filter.validate()?;
        Ok(filter)
    }
}

/// Parses sort entries in request order, quoting the caller's own text when
/// an entry is blank, unknown or repeats an earlier field.
fn parse_sort(entries: &[String]) -> Result<Vec<SortKey>, ValidationError> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut keys = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let key = SortKey::parse(entry, index + 1)?;
        if !seen.insert(key.field) {
            return Err(ValidationError::InvalidSortKey {
                entry: entry.clone(),
                position: index + 1,
            });
        }
        keys.push(key);
    }
    Ok(keys)
}

fn ensure_exclusive<T>(
    include: &[T],
    exclude: &[T],
    include_field: &'static str,
    exclude_field: &'static str,
) -> Result<(), ValidationError> {
    if !include.is_empty() && !exclude.is_empty() {
        return Err(ValidationError::ConflictingFilterFields {
            first: include_field,
            second: exclude_field,
        });
    }
    Ok(())
}

fn parse_members<T>(
    values: &[String],
    field: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, ValidationError> {
    values
        .iter()
        .map(|value| {
            parse(value).ok_or_else(|| ValidationError::InvalidFieldValue {
                field,
                value: value.clone(),
            })
        })
        .collect()
}

fn non_negative(value: Option<i64>, field: &'static str) -> Result<Option<u32>, ValidationError> {
    value
        .map(|raw| {
            u32::try_from(raw).map_err(|_| ValidationError::InvalidFieldValue {
                field,
                value: raw.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::{
        FilterSpec, RawFilter, Selection, SortDirection, SortField, SortKey, TimeBounds,
    };
    use crate::model::equipment::{EquipmentKind, OperationalStatus};
    use crate::model::validation::ValidationError;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn empty_raw_filter_selects_everything() {
        let filter = RawFilter::default().validate().unwrap();
        assert_eq!(filter, FilterSpec::default());
        assert!(filter.is_unconditional());
    }

    #[test]
    fn conflicting_kind_sets_are_rejected_before_value_checks() {
        let raw = RawFilter {
            kinds: strings(&["CNCMachine"]),
            exclude_kinds: strings(&["not-a-kind"]),
            statuses: strings(&["also-bogus"]),
            ..RawFilter::default()
        };
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::ConflictingFilterFields {
                first: "kind",
                second: "~kind"
            }
        );
    }

    #[test]
    fn conflicting_status_sets_are_rejected() {
        let raw = RawFilter {
            statuses: strings(&["Operational"]),
            exclude_statuses: strings(&["Decommissioned"]),
            ..RawFilter::default()
        };
        assert!(matches!(
            raw.validate(),
            Err(ValidationError::ConflictingFilterFields {
                first: "status",
                second: "~status"
            })
        ));
    }

    #[test]
    fn unknown_kind_value_names_field_and_value() {
        let raw = RawFilter {
            exclude_kinds: strings(&["RoboticArm", "Lathe"]),
            ..RawFilter::default()
        };
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::InvalidFieldValue {
                field: "~kind",
                value: "Lathe".to_string()
            }
        );
    }

    #[test]
    fn duplicate_members_collapse_keeping_first_order() {
        let raw = RawFilter {
            kinds: strings(&["RoboticArm", "CNCMachine", "roboticarm"]),
            ..RawFilter::default()
        };
        let filter = raw.validate().unwrap();
        assert_eq!(
            filter.kinds,
            Selection::Include(vec![EquipmentKind::RoboticArm, EquipmentKind::CNCMachine])
        );
    }

    #[test]
    fn exclusion_set_becomes_negated_selection() {
        let raw = RawFilter {
            exclude_statuses: strings(&["Decommissioned"]),
            ..RawFilter::default()
        };
        let filter = raw.validate().unwrap();
        assert!(filter.statuses.is_negated());
        assert_eq!(filter.statuses.values(), &[OperationalStatus::Decommissioned]);
    }

    #[test]
    fn time_bounds_must_be_ordered() {
        let raw = RawFilter {
            updated_since: Some(2_000),
            updated_until: Some(1_000),
            ..RawFilter::default()
        };
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::OrderViolation {
                since: "updated_since",
                until: "updated_until"
            }
        );

        let equal = RawFilter {
            created_since: Some(1_000),
            created_until: Some(1_000),
            ..RawFilter::default()
        };
        assert_eq!(
            equal.validate().unwrap().created,
            TimeBounds::new(Some(1_000), Some(1_000))
        );
    }

    #[test]
    fn sort_keys_are_normalized_in_request_order() {
        let raw = RawFilter {
            sort: strings(&[" KIND ", "-Created_At"]),
            ..RawFilter::default()
        };
        let filter = raw.validate().unwrap();
        assert_eq!(
            filter.sort,
            vec![
                SortKey::asc(SortField::Kind),
                SortKey {
                    field: SortField::CreatedAt,
                    direction: SortDirection::Descending
                }
            ]
        );
    }

    #[test]
    fn duplicate_sort_key_quotes_caller_entry_at_its_position() {
        let raw = RawFilter {
            sort: strings(&["kind", "-KIND"]),
            ..RawFilter::default()
        };
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::InvalidSortKey {
                entry: "-KIND".to_string(),
                position: 2
            }
        );
    }

    #[test]
    fn unknown_and_blank_sort_keys_are_rejected() {
        let bogus = RawFilter {
            sort: strings(&["bogus"]),
            ..RawFilter::default()
        };
        assert_eq!(
            bogus.validate().unwrap_err(),
            ValidationError::InvalidSortKey {
                entry: "bogus".to_string(),
                position: 1
            }
        );

        let blank = RawFilter {
            sort: strings(&["id", " - "]),
            ..RawFilter::default()
        };
        assert!(matches!(
            blank.validate(),
            Err(ValidationError::InvalidSortKey { position: 2, .. })
        ));
    }

    #[test]
    fn negative_limit_and_offset_are_rejected() {
        let raw = RawFilter {
            limit: Some(-1),
            ..RawFilter::default()
        };
        assert_eq!(
            raw.validate().unwrap_err(),
            ValidationError::InvalidFieldValue {
                field: "limit",
                value: "-1".to_string()
            }
        );

        let raw = RawFilter {
            limit: Some(5),
            offset: Some(-3),
            ..RawFilter::default()
        };
        assert!(matches!(
            raw.validate(),
            Err(ValidationError::InvalidFieldValue { field: "offset", .. })
        ));
    }

    #[test]
    fn for_ids_with_no_ids_is_unconditional() {
        assert!(FilterSpec::for_ids(&[]).is_unconditional());
    }
}
