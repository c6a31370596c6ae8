//! Domain error model.

use thiserror::Error;

/// Domain-level error.
///
/// Deterministic business failures only: lookups, validation and lifecycle
/// preconditions. Storage problems are reported by the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. blank address, coordinates out of range).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced order, unit, depot or item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An order was placed against an item that is not in the catalog.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The order already has a unit bound to it.
    #[error("order {0} already has a unit assigned")]
    AlreadyAssigned(String),

    /// No unit is currently eligible (ACTIVE) for assignment.
    #[error("no units available for assignment")]
    NoUnitsAvailable,

    /// The selected unit is not eligible for assignment.
    #[error("unit {0} is not active")]
    UnitNotEligible(String),

    /// Delivery cannot be confirmed before a unit is bound.
    #[error("order {0} has no unit assigned")]
    NoUnitAssigned(String),

    /// Delivery was already confirmed.
    #[error("order {0} is already delivered")]
    AlreadyFinished(String),

    /// The depot directory is empty, so a unit cannot be placed.
    #[error("no depot available")]
    NoDepotAvailable,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        Self::InvalidReference(msg.into())
    }
}
