//! Result shapes for multi-target operations.
//!
//! A multi-target operation that matched every requested id yields
//! `TargetOutcome::All`; one that matched some yields `Partial` with the
//! unmatched ids listed. Zero matches is not an outcome but
//! `RepoError::NotFound`.

use crate::model::equipment::EquipmentId;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};

/// HTTP-compatible code for a partially matched multi-target request.
pub const MULTI_STATUS: u16 = 207;

/// Requested ids split into matched items and unfound ids.
///
/// # Invariants
/// - `ids(matched) ∪ unfound` equals the distinct requested ids.
/// - `ids(matched) ∩ unfound` is empty.
/// - Both sides keep the request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition<T> {
    pub matched: Vec<T>,
    pub unfound: Vec<EquipmentId>,
}

impl<T> Partition<T> {
    /// Splits `requested` against the items a statement returned.
    ///
    /// Items whose id was not requested are dropped.
    pub fn split(
        requested: &[EquipmentId],
        matched: Vec<T>,
        id_of: impl Fn(&T) -> EquipmentId,
    ) -> Self {
        let mut by_id: HashMap<EquipmentId, T> = matched
            .into_iter()
            .map(|item| (id_of(&item), item))
            .collect();
        let mut seen = HashSet::with_capacity(requested.len());
        let mut partition = Self {
            matched: Vec::with_capacity(by_id.len()),
            unfound: Vec::new(),
        };

        for id in requested {
            if !seen.insert(*id) {
                continue;
            }
            match by_id.remove(id) {
                Some(item) => partition.matched.push(item),
                None => partition.unfound.push(*id),
            }
        }
        partition
    }

    pub fn is_complete(&self) -> bool {
        self.unfound.is_empty()
    }
}

impl<T: Serialize> Partition<T> {
    /// Renders `{"<label>": [...], "unfound": [...]}`.
    ///
    /// Labels used by the routing layer are `updated`, `deleted` and `found`.
    pub fn to_json(&self, label: &str) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(label.to_string(), json!(self.matched));
        body.insert("unfound".to_string(), json!(self.unfound));
        serde_json::Value::Object(body)
    }
}

/// Outcome of an operation addressed to explicit ids.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome<T> {
    All(Vec<T>),
    Partial(Partition<T>),
}

impl<T> TargetOutcome<T> {
    /// Builds the outcome from a split; callers handle the zero-match case.
    pub fn from_partition(partition: Partition<T>) -> Self {
        if partition.is_complete() {
            Self::All(partition.matched)
        } else {
            Self::Partial(partition)
        }
    }

    pub fn matched(&self) -> &[T] {
        match self {
            Self::All(items) => items,
            Self::Partial(partition) => &partition.matched,
        }
    }

    pub fn unfound(&self) -> &[EquipmentId] {
        match self {
            Self::All(_) => &[],
            Self::Partial(partition) => &partition.unfound,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }

    /// `complete_status` when every target matched, otherwise 207.
    pub fn status_code(&self, complete_status: u16) -> u16 {
        match self {
            Self::All(_) => complete_status,
            Self::Partial(_) => MULTI_STATUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Partition, TargetOutcome, MULTI_STATUS};
    use serde_json::json;
    use uuid::Uuid;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn split_keeps_request_order_and_is_disjoint() {
        let requested = [id(1), id(2), id(3), id(4)];
        let partition = Partition::split(&requested, vec![id(4), id(2)], |item| *item);

        assert_eq!(partition.matched, vec![id(2), id(4)]);
        assert_eq!(partition.unfound, vec![id(1), id(3)]);
        assert!(!partition.is_complete());
    }

    #[test]
    fn duplicate_requests_are_counted_once() {
        let requested = [id(1), id(1), id(2)];
        let partition = Partition::split(&requested, vec![id(1)], |item| *item);

        assert_eq!(partition.matched, vec![id(1)]);
        assert_eq!(partition.unfound, vec![id(2)]);
    }

    #[test]
    fn complete_partition_becomes_all_outcome() {
        let requested = [id(1), id(2)];
        let outcome = TargetOutcome::from_partition(Partition::split(
            &requested,
            vec![id(2), id(1)],
            |item| *item,
        ));

        assert_eq!(outcome, TargetOutcome::All(vec![id(1), id(2)]));
        assert_eq!(outcome.status_code(204), 204);
        assert!(outcome.unfound().is_empty());
    }

    #[test]
    fn partial_outcome_reports_multi_status_and_json_body() {
        let requested = [id(1), id(2)];
        let outcome =
            TargetOutcome::from_partition(Partition::split(&requested, vec![id(1)], |item| *item));

        assert_eq!(outcome.status_code(204), MULTI_STATUS);
        let TargetOutcome::Partial(partition) = outcome else {
            panic!("expected partial outcome");
        };
        assert_eq!(
            partition.to_json("deleted"),
            json!({
                "deleted": [id(1).to_string()],
                "unfound": [id(2).to_string()],
            })
        );
    }
}
