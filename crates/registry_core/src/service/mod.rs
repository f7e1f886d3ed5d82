//! Application service layer.
//!
//! # Responsibility
//! - Orchestrate repository calls into targeted and filtered use-cases.
//! - Keep single-target and multi-target outcome rules out of routing code.

pub mod equipment_service;
