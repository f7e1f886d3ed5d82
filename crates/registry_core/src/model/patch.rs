//! Partial-update description for equipment records.

use crate::model::equipment::{validate_parameters, EquipmentParameters, OperationalStatus};
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};

/// Fields to change on matched records. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<EquipmentParameters>,
}

impl UpdatePatch {
    pub fn from_status(status: OperationalStatus) -> Self {
        Self {
            status: Some(status),
            parameters: None,
        }
    }

    pub fn from_parameters(parameters: EquipmentParameters) -> Self {
        Self {
            status: None,
            parameters: Some(parameters),
        }
    }

    pub fn with_status(mut self, status: OperationalStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_parameters(mut self, parameters: EquipmentParameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.parameters.is_none()
    }

    /// # Errors
    /// - `NothingToUpdate` when neither field is present.
    /// - `BlankParameterKey` when the new parameter document has a blank key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::NothingToUpdate);
        }
        if let Some(parameters) = &self.parameters {
            validate_parameters(parameters)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::UpdatePatch;
    use crate::model::equipment::{EquipmentParameters, OperationalStatus};
    use crate::model::validation::ValidationError;
    use serde_json::json;

    #[test]
    fn empty_patch_is_rejected() {
        assert_eq!(
            UpdatePatch::default().validate(),
            Err(ValidationError::NothingToUpdate)
        );
    }

    #[test]
    fn status_only_and_combined_patches_validate() {
        UpdatePatch::from_status(OperationalStatus::Decommissioned)
            .validate()
            .unwrap();

        let mut parameters = EquipmentParameters::new();
        parameters.insert("rpm".to_string(), json!(1200));
        UpdatePatch::from_status(OperationalStatus::UnderMaintenance)
            .with_parameters(parameters)
            .validate()
            .unwrap();
    }

    #[test]
    fn blank_parameter_key_is_rejected() {
        let mut parameters = EquipmentParameters::new();
        parameters.insert("  ".to_string(), json!(true));
        assert_eq!(
            UpdatePatch::from_parameters(parameters).validate(),
            Err(ValidationError::BlankParameterKey)
        );
    }
}
