//! Equipment domain model.
//!
//! # Responsibility
//! - Define the canonical equipment record and its closed enumerations.
//! - Describe selection (`FilterSpec`) and mutation (`UpdatePatch`) intent.
//!
//! # Invariants
//! - Filter and patch values are validated once, then consumed immutably.
//! - Validation failures carry the offending field names.

pub mod equipment;
pub mod filter;
pub mod patch;
pub mod validation;
