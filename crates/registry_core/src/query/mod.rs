//! Filter-to-statement composition.
//!
//! # Responsibility
//! - Turn validated filters and patches into parameterized SQL.
//! - Keep every caller-supplied value out of statement text.
//!
//! # Invariants
//! - Composition is a pure function of its inputs.
//! - Statements leave this module with positional placeholders only after
//!   `bind_named`.

pub mod bind;
pub mod compose;
pub mod condition;
