//! Core of the equipment registry.
//! Filters and patches are validated here, composed into parameterized SQL
//! and executed against the `equipment` table behind one repository trait.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod request;
pub mod service;

pub use config::{ConfigError, RegistryConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_timeout, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::equipment::{
    EquipmentCreate, EquipmentId, EquipmentKind, EquipmentParameters, EquipmentRecord,
    OperationalStatus,
};
pub use model::filter::{FilterSpec, RawFilter, Selection, SortDirection, SortField, SortKey};
pub use model::patch::UpdatePatch;
pub use model::validation::ValidationError;
pub use repo::equipment_repo::{
    Action, Atomicity, EquipmentRepository, RepoError, RepoResult, SqliteEquipmentRepository,
};
pub use repo::outcome::{Partition, TargetOutcome};
pub use service::equipment_service::EquipmentService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
