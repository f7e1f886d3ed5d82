//! Predicate generation from a validated `FilterSpec`.
//!
//! # Invariants
//! - Predicates are emitted in fixed dimension order: id, kind, status,
//!   created-since, created-until, updated-since, updated-until.
//! - Every predicate references named placeholders only; values travel in
//!   the argument bag and are never spliced into statement text.
//! - An absent dimension emits nothing.

use crate::model::filter::{FilterSpec, Selection, TimeBounds};
use rusqlite::types::Value;

/// One bound argument: a scalar or an ordered collection for IN-expansion.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Scalar(Value),
    List(Vec<Value>),
}

/// Ordered bag of named arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs {
    entries: Vec<(&'static str, Arg)>,
}

impl NamedArgs {
    pub fn insert(&mut self, name: &'static str, arg: Arg) {
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = arg,
            None => self.entries.push((name, arg)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.entries
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, arg)| arg)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_list(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, arg)| matches!(arg, Arg::List(_)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Arg)> {
        self.entries.iter().map(|(name, arg)| (*name, arg))
    }
}

/// Predicate shape chosen by set cardinality.
#[derive(Debug, Clone, PartialEq)]
pub enum Membership {
    Empty,
    Single(Value),
    Set(Vec<Value>),
}

impl Membership {
    pub fn of(mut values: Vec<Value>) -> Self {
        match values.len() {
            0 => Self::Empty,
            1 => Self::Single(values.remove(0)),
            _ => Self::Set(values),
        }
    }
}

/// Predicates joined by AND plus the arguments they reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    predicates: Vec<String>,
    args: NamedArgs,
}

impl Conditions {
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn args(&self) -> &NamedArgs {
        &self.args
    }

    pub fn into_args(self) -> NamedArgs {
        self.args
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Renders ` WHERE p1 AND p2 ...`, or an empty string with no predicates.
    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        format!(" WHERE {}", self.predicates.join(" AND "))
    }

    /// Emits the membership predicate of one set-valued column.
    ///
    /// The placeholder shares the column name.
    pub fn push_membership(&mut self, column: &'static str, negated: bool, shape: Membership) {
        match shape {
            Membership::Empty => {}
            Membership::Single(value) => {
                let operator = if negated { "<>" } else { "=" };
                self.predicates
                    .push(format!("{column} {operator} :{column}"));
                self.args.insert(column, Arg::Scalar(value));
            }
            Membership::Set(values) => {
                let operator = if negated { "NOT IN" } else { "IN" };
                self.predicates
                    .push(format!("{column} {operator} (:{column})"));
                self.args.insert(column, Arg::List(values));
            }
        }
    }

    /// Emits `column >= :since_name` and `column <= :until_name` when present.
    pub fn push_bounds(
        &mut self,
        column: &'static str,
        bounds: TimeBounds,
        since_name: &'static str,
        until_name: &'static str,
    ) {
        if let Some(since) = bounds.since {
            self.predicates.push(format!("{column} >= :{since_name}"));
            self.args.insert(since_name, Arg::Scalar(Value::Integer(since)));
        }
        if let Some(until) = bounds.until {
            self.predicates.push(format!("{column} <= :{until_name}"));
            self.args.insert(until_name, Arg::Scalar(Value::Integer(until)));
        }
    }
}

/// Builds the predicate list for a validated filter.
///
/// Sort and pagination are not predicates and are ignored here.
pub fn build_conditions(filter: &FilterSpec) -> Conditions {
    let mut conditions = Conditions::default();

    push_selection(&mut conditions, "id", &filter.ids, |id| {
        Value::Text(id.to_string())
    });
    push_selection(&mut conditions, "kind", &filter.kinds, |kind| {
        Value::Integer(kind.code())
    });
    push_selection(&mut conditions, "status", &filter.statuses, |status| {
        Value::Integer(status.code())
    });
    conditions.push_bounds("created_at", filter.created, "created_since", "created_until");
    conditions.push_bounds("updated_at", filter.updated, "updated_since", "updated_until");

    conditions
}

fn push_selection<T>(
    conditions: &mut Conditions,
    column: &'static str,
    selection: &Selection<T>,
    to_value: impl Fn(&T) -> Value,
) {
    let values = selection.values().iter().map(to_value).collect();
    conditions.push_membership(column, selection.is_negated(), Membership::of(values));
}
