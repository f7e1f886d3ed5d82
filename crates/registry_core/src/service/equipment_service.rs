//! Equipment use-case service.
//!
//! # Responsibility
//! - Provide the CRUD entry points the routing layer calls.
//! - Turn repository id lists into single-target or partition outcomes.
//!
//! # Invariants
//! - The service depends only on the `EquipmentRepository` capability set.
//! - A targeted operation matching zero ids is `RepoError::NotFound`; a
//!   partial match is `TargetOutcome::Partial`, never an error.

use crate::model::equipment::{EquipmentCreate, EquipmentId, EquipmentRecord};
use crate::model::filter::FilterSpec;
use crate::model::patch::UpdatePatch;
use crate::model::validation::ValidationError;
use crate::repo::equipment_repo::{Action, Atomicity, EquipmentRepository, RepoError, RepoResult};
use crate::repo::outcome::{Partition, TargetOutcome};
use log::warn;
use std::collections::HashSet;

/// Use-case service wrapper for equipment CRUD operations.
pub struct EquipmentService<R: EquipmentRepository> {
    repo: R,
    atomicity: Atomicity,
}

impl<R: EquipmentRepository> EquipmentService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            atomicity: Atomicity::default(),
        }
    }

    /// Sets the default atomicity of batch creation.
    pub fn with_atomicity(mut self, atomicity: Atomicity) -> Self {
        self.atomicity = atomicity;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn create_one(&self, intent: &EquipmentCreate) -> RepoResult<EquipmentId> {
        self.repo.create_one(intent)
    }

    /// Creates records with the service's default atomicity.
    pub fn create_many(&self, intents: &[EquipmentCreate]) -> RepoResult<Vec<EquipmentId>> {
        self.create_many_with(intents, self.atomicity)
    }

    pub fn create_many_with(
        &self,
        intents: &[EquipmentCreate],
        atomicity: Atomicity,
    ) -> RepoResult<Vec<EquipmentId>> {
        if intents.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.create_many(intents, atomicity)
    }

    /// Updates explicit ids.
    ///
    /// # Contract
    /// - One id: matched -> `All([id])`, unmatched -> `NotFound`.
    /// - Several ids: all matched -> `All`, some -> `Partial`, none -> `NotFound`.
    pub fn update_targets(
        &self,
        ids: &[EquipmentId],
        patch: &UpdatePatch,
    ) -> RepoResult<TargetOutcome<EquipmentId>> {
        patch.validate()?;
        let ids = distinct_targets(ids)?;
        if let [id] = ids.as_slice() {
            return match self.repo.update_by_id(*id, patch)? {
                true => Ok(TargetOutcome::All(vec![*id])),
                false => Err(not_found(Action::Update, ids)),
            };
        }

        let updated = self.repo.update_by_ids(&ids, patch)?;
        reduce_targets(Action::Update, ids, updated, |id| *id)
    }

    /// Deletes explicit ids with the same outcome contract as updates.
    pub fn delete_targets(&self, ids: &[EquipmentId]) -> RepoResult<TargetOutcome<EquipmentId>> {
        let ids = distinct_targets(ids)?;
        if let [id] = ids.as_slice() {
            return match self.repo.delete_by_id(*id)? {
                true => Ok(TargetOutcome::All(vec![*id])),
                false => Err(not_found(Action::Delete, ids)),
            };
        }

        let deleted = self.repo.delete_by_ids(&ids)?;
        reduce_targets(Action::Delete, ids, deleted, |id| *id)
    }

    /// Finds explicit ids with the same outcome contract as updates.
    pub fn find_targets(
        &self,
        ids: &[EquipmentId],
    ) -> RepoResult<TargetOutcome<EquipmentRecord>> {
        let ids = distinct_targets(ids)?;
        if let [id] = ids.as_slice() {
            return match self.repo.find_by_id(*id)? {
                Some(record) => Ok(TargetOutcome::All(vec![record])),
                None => Err(not_found(Action::Search, ids)),
            };
        }

        let found = self.repo.find_by_ids(&ids)?;
        reduce_targets(Action::Search, ids, found, |record| record.id)
    }

    /// Updates every record matching `filter`; an empty match is `Ok([])`.
    ///
    /// Only the predicates narrow the write. `sort`, `limit` and `offset`
    /// are ignored, so a paginated filter still updates the whole match set.
    pub fn update_matching(
        &self,
        filter: &FilterSpec,
        patch: &UpdatePatch,
    ) -> RepoResult<Vec<EquipmentId>> {
        if filter.is_unconditional() {
            warn!("event=equipment_update module=service status=unconditional");
        }
        self.repo.update_by_conditions(filter, patch)
    }

    /// Deletes every record matching `filter`; an empty match is `Ok([])`.
    ///
    /// `sort`, `limit` and `offset` are ignored here as in `update_matching`.
    pub fn delete_matching(&self, filter: &FilterSpec) -> RepoResult<Vec<EquipmentId>> {
        if filter.is_unconditional() {
            warn!("event=equipment_delete module=service status=unconditional");
        }
        self.repo.delete_by_conditions(filter)
    }

    /// Finds records matching `filter`; an empty match is `Ok([])`.
    pub fn find_matching(&self, filter: &FilterSpec) -> RepoResult<Vec<EquipmentRecord>> {
        self.repo.find_by_conditions(filter)
    }
}

fn distinct_targets(ids: &[EquipmentId]) -> RepoResult<Vec<EquipmentId>> {
    if ids.is_empty() {
        return Err(ValidationError::EmptyTargetSet.into());
    }
    let mut seen = HashSet::with_capacity(ids.len());
    Ok(ids.iter().copied().filter(|id| seen.insert(*id)).collect())
}

fn not_found(action: Action, ids: Vec<EquipmentId>) -> RepoError {
    RepoError::NotFound { action, ids }
}

fn reduce_targets<T>(
    action: Action,
    requested: Vec<EquipmentId>,
    matched: Vec<T>,
    id_of: impl Fn(&T) -> EquipmentId,
) -> RepoResult<TargetOutcome<T>> {
    if matched.is_empty() {
        return Err(not_found(action, requested));
    }
    Ok(TargetOutcome::from_partition(Partition::split(
        &requested, matched, id_of,
    )))
}
