//! Caller-input validation failures.
//!
//! Every variant names the offending field(s) so the boundary layer can
//! report them verbatim. Validation always completes before any statement is
//! built, so a `ValidationError` implies zero side effects.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Inclusion and exclusion sets of one dimension are both populated.
    ConflictingFilterFields {
        first: &'static str,
        second: &'static str,
    },
    /// A value does not belong to the field's domain.
    InvalidFieldValue { field: &'static str, value: String },
    /// A lower bound is strictly after its upper bound.
    OrderViolation {
        since: &'static str,
        until: &'static str,
    },
    /// Unknown, empty or repeated sort key. `position` is 1-based.
    InvalidSortKey { entry: String, position: usize },
    /// Query parameter name outside the supported filter vocabulary.
    UnknownParameter(String),
    /// Patch carries neither status nor parameters.
    NothingToUpdate,
    /// Identifier is not a canonical UUID.
    InvalidIdentifier(String),
    /// Multi-target operation was given no targets.
    EmptyTargetSet,
    /// Parameter document contains an empty or whitespace-only key.
    BlankParameterKey,
    /// Request body is not the expected JSON shape.
    InvalidBody(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictingFilterFields { first, second } => write!(
                f,
                "filter fields `{first}` and `{second}` are mutually exclusive"
            ),
            Self::InvalidFieldValue { field, value } => {
                write!(f, "invalid value `{value}` for field `{field}`")
            }
            Self::OrderViolation { since, until } => {
                write!(f, "`{since}` must not be after `{until}`")
            }
            Self::InvalidSortKey { entry, position } => {
                write!(f, "invalid sort key `{entry}` at position {position}")
            }
            Self::UnknownParameter(name) => write!(f, "unknown filter parameter `{name}`"),
            Self::NothingToUpdate => write!(f, "nothing to update"),
            Self::InvalidIdentifier(value) => write!(f, "invalid equipment id `{value}`"),
            Self::EmptyTargetSet => write!(f, "at least one equipment id is required"),
            Self::BlankParameterKey => write!(f, "equipment parameter names must not be blank"),
            Self::InvalidBody(message) => write!(f, "invalid request body: {message}"),
        }
    }
}

impl Error for ValidationError {}
