//! Named-to-positional parameter binding with IN-list expansion.
//!
//! # Invariants
//! - Output statements contain only `?N` placeholders, numbered from 1 in
//!   textual order.
//! - A collection argument expands to one placeholder per element in the
//!   collection's order; element values are bound, never interpolated.
//! - Text inside single-quoted SQL literals is copied unchanged.

use crate::query::condition::{Arg, NamedArgs};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter, Write};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'(?:[^']|'')*'|:([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder regex is valid")
});

/// Driver-ready statement with a flat positional argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Statement/argument mismatch. Indicates a composition defect, not bad input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    MissingArgument(String),
    EmptyCollection(String),
}

impl Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArgument(name) => write!(f, "no argument bound for placeholder `:{name}`"),
            Self::EmptyCollection(name) => {
                write!(f, "collection argument `:{name}` must not be empty")
            }
        }
    }
}

impl Error for BindError {}

/// Rewrites `:name` placeholders to positional ones and flattens arguments.
///
/// A placeholder used twice binds its value twice. Arguments that no
/// placeholder references are ignored.
///
/// # Errors
/// - `MissingArgument` when a placeholder has no entry in `args`.
/// - `EmptyCollection` when a collection argument has no elements.
pub fn bind_named(sql: &str, args: &NamedArgs) -> Result<BoundStatement, BindError> {
    let mut output = String::with_capacity(sql.len() + 16);
    let mut values = Vec::with_capacity(args.len());
    let mut cursor = 0;

    for captures in PLACEHOLDER_RE.captures_iter(sql) {
        let Some(name) = captures.get(1) else {
            continue;
        };
        let whole = captures.get(0).map_or(name.range(), |m| m.range());
        output.push_str(&sql[cursor..whole.start]);
        cursor = whole.end;

        match args.get(name.as_str()) {
            Some(Arg::Scalar(value)) => {
                values.push(value.clone());
                push_slot(&mut output, values.len());
            }
            Some(Arg::List(items)) => {
                if items.is_empty() {
                    return Err(BindError::EmptyCollection(name.as_str().to_string()));
                }
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        output.push_str(", ");
                    }
                    values.push(item.clone());
                    push_slot(&mut output, values.len());
                }
            }
            None => return Err(BindError::MissingArgument(name.as_str().to_string())),
        }
    }
    output.push_str(&sql[cursor..]);

    Ok(BoundStatement {
        sql: output,
        values,
    })
}

fn push_slot(output: &mut String, position: usize) {
    let _ = write!(output, "?{position}");
}

#[cfg(test)]
mod tests {
    use super::{bind_named, BindError};
    use crate::model::equipment::EquipmentKind;
    use crate::model::filter::{FilterSpec, Selection};
    use crate::query::compose::compose_find;
    use crate::query::condition::{Arg, NamedArgs};
    use rusqlite::types::Value;

    #[test]
    fn scalar_placeholders_become_numbered_slots() {
        let mut args = NamedArgs::default();
        args.insert("kind", Arg::Scalar(Value::Integer(1)));
        args.insert("limit", Arg::Scalar(Value::Integer(5)));

        let bound = bind_named("SELECT id FROM equipment WHERE kind = :kind LIMIT :limit", &args)
            .unwrap();
        assert_eq!(bound.sql, "SELECT id FROM equipment WHERE kind = ?1 LIMIT ?2");
        assert_eq!(bound.values, vec![Value::Integer(1), Value::Integer(5)]);
    }

    #[test]
    fn three_member_kind_set_expands_to_three_slots_in_order() {
        let filter = FilterSpec {
            kinds: Selection::Include(vec![
                EquipmentKind::RoboticArm,
                EquipmentKind::CNCMachine,
                EquipmentKind::DrillMachine,
            ]),
            ..FilterSpec::default()
        };
        let query = compose_find(&filter, None);
        let bound = bind_named(&query.sql, &query.args).unwrap();

        assert!(bound.sql.ends_with("WHERE kind IN (?1, ?2, ?3)"));
        assert_eq!(
            bound.values,
            vec![Value::Integer(3), Value::Integer(0), Value::Integer(2)]
        );
    }

    #[test]
    fn expansion_shifts_later_slots() {
        let mut args = NamedArgs::default();
        args.insert(
            "id",
            Arg::List(vec![Value::Text("a".into()), Value::Text("b".into())]),
        );
        args.insert("status", Arg::Scalar(Value::Integer(0)));

        let bound =
            bind_named("DELETE FROM equipment WHERE id IN (:id) AND status = :status", &args)
                .unwrap();
        assert_eq!(
            bound.sql,
            "DELETE FROM equipment WHERE id IN (?1, ?2) AND status = ?3"
        );
        assert_eq!(bound.values.len(), 3);
    }

    #[test]
    fn quoted_literals_are_not_treated_as_placeholders() {
        let mut args = NamedArgs::default();
        args.insert("kind", Arg::Scalar(Value::Integer(0)));

        let bound = bind_named("SELECT ':kind', 'it''s :x' WHERE kind = :kind", &args).unwrap();
        assert_eq!(bound.sql, "SELECT ':kind', 'it''s :x' WHERE kind = ?1");
        assert_eq!(bound.values, vec![Value::Integer(0)]);
    }

    #[test]
    fn missing_or_empty_arguments_are_reported() {
        let args = NamedArgs::default();
        assert_eq!(
            bind_named("WHERE kind = :kind", &args).unwrap_err(),
            BindError::MissingArgument("kind".to_string())
        );

        let mut empty = NamedArgs::default();
        empty.insert("id", Arg::List(Vec::new()));
        assert_eq!(
            bind_named("WHERE id IN (:id)", &empty).unwrap_err(),
            BindError::EmptyCollection("id".to_string())
        );
    }
}
