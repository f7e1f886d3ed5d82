//! Equipment domain model.
//!
//! # Responsibility
//! - Define the canonical equipment record and its closed enumerations.
//! - Provide storage codes and name parsing for kind/status values.
//!
//! # Invariants
//! - `id` is system-assigned and never reused for another record.
//! - `updated_at` is never earlier than `created_at`.
//! - `parameters` is always a JSON object, possibly empty, never absent.

use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an equipment record.
///
/// Rendered in canonical 36-character hyphenated form.
pub type EquipmentId = Uuid;

/// Free-form parameter document attached to a record. Opaque to core.
pub type EquipmentParameters = serde_json::Map<String, serde_json::Value>;

/// Closed set of equipment kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentKind {
    CNCMachine,
    ConveyorBelt,
    DrillMachine,
    RoboticArm,
}

impl EquipmentKind {
    pub const ALL: [EquipmentKind; 4] = [
        Self::CNCMachine,
        Self::ConveyorBelt,
        Self::DrillMachine,
        Self::RoboticArm,
    ];

    /// Storage code persisted in `equipment.kind`.
    pub fn code(self) -> i64 {
        match self {
            Self::CNCMachine => 0,
            Self::ConveyorBelt => 1,
            Self::DrillMachine => 2,
            Self::RoboticArm => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CNCMachine => "CNCMachine",
            Self::ConveyorBelt => "ConveyorBelt",
            Self::DrillMachine => "DrillMachine",
            Self::RoboticArm => "RoboticArm",
        }
    }

    /// Parses a kind by case-insensitive name or by numeric storage code.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
    }
}

/// Closed set of operational states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationalStatus {
    /// Default state assigned on creation.
    #[default]
    Operational,
    UnderMaintenance,
    Decommissioned,
}

impl OperationalStatus {
    pub const ALL: [OperationalStatus; 3] = [
        Self::Operational,
        Self::UnderMaintenance,
        Self::Decommissioned,
    ];

    /// Storage code persisted in `equipment.status`.
    pub fn code(self) -> i64 {
        match self {
            Self::Operational => 0,
            Self::UnderMaintenance => 1,
            Self::Decommissioned => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operational => "Operational",
            Self::UnderMaintenance => "UnderMaintenance",
            Self::Decommissioned => "Decommissioned",
        }
    }

    /// Parses a status by case-insensitive name or by numeric storage code.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
    }
}

/// Creation intent: everything the caller controls about a new record.
///
/// Identity, status and timestamps are assigned by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentCreate {
    pub kind: EquipmentKind,
    pub parameters: EquipmentParameters,
}

impl EquipmentCreate {
    pub fn new(kind: EquipmentKind, parameters: EquipmentParameters) -> Self {
        Self { kind, parameters }
    }

    /// Validates caller-provided fields before any persistence work.
    ///
    /// # Errors
    /// - `BlankParameterKey` when a parameter name is empty after trim.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_parameters(&self.parameters)
    }
}

/// Canonical persisted equipment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub id: EquipmentId,
    pub kind: EquipmentKind,
    pub status: OperationalStatus,
    pub parameters: EquipmentParameters,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Always >= `created_at`.
    pub updated_at: i64,
}

impl EquipmentRecord {
    /// Validates record-level invariants.
    ///
    /// Used when reducing persisted rows so invalid state is reported instead
    /// of masked.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.updated_at < self.created_at {
            return Err(ValidationError::OrderViolation {
                since: "created_at",
                until: "updated_at",
            });
        }
        validate_parameters(&self.parameters)
    }
}

pub(crate) fn validate_parameters(parameters: &EquipmentParameters) -> Result<(), ValidationError> {
    if parameters.keys().any(|key| key.trim().is_empty()) {
        return Err(ValidationError::BlankParameterKey);
    }
    Ok(())
}
