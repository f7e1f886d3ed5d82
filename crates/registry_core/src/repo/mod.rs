//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the capability set the service layer consumes.
//! - Isolate SQLite statement execution from use-case orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Validation`) in
//!   addition to backing-store errors, never conflating the two.
//! - "Zero rows" from a single-target call is `false`/`None`, not an error.

pub mod equipment_repo;
pub mod outcome;
