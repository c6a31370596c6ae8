//! Dispatch engine services.
//!
//! Each service loads aggregates through the store traits, runs the domain rule,
//! and writes the result back with a single `save`. A failed check never writes,
//! so every operation is all-or-nothing.
//!
//! ```text
//! UnitRegistry          provision / activate / deactivate / retire
//! OrderLedger           place / queue queries
//! AssignmentEngine      bind a unit to a pending order
//! DeliveryConfirmation  close an assigned order
//! ```
//!
//! Order writes use `ExpectedVersion::Exact(loaded)`. When two callers race on the
//! same order, the loser's save fails with `StoreError::Concurrency`; the service
//! then re-reads the order once to report what the winner did.

mod assignment;
mod confirmation;
mod ledger;
mod registry;

pub use assignment::AssignmentEngine;
pub use confirmation::DeliveryConfirmation;
pub use ledger::OrderLedger;
pub use registry::UnitRegistry;

use thiserror::Error;

use dronedispatch_core::DomainError;
use dronedispatch_delivery::{RandomSelector, UnitSelector};
use dronedispatch_fleet::Depot;

use crate::store::{DepotStore, StoreError};

/// Typed failure of an engine operation.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order {0} already has a unit assigned")]
    AlreadyAssigned(String),

    #[error("order {0} is already delivered")]
    AlreadyFinished(String),

    #[error("no units available for assignment")]
    NoUnitsAvailable,

    #[error("order {0} has no unit assigned")]
    NoUnitAssigned(String),

    #[error("unit {0} is not active")]
    UnitNotEligible(String),

    #[error("no depot available")]
    NoDepotAvailable,

    /// Lost a version race that could not be attributed to a known transition.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

/// Coarse grouping of [`DispatchError`] for callers that only need to know who is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    ClientInput,
    Unavailable,
    Infrastructure,
}

impl DispatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DispatchError::NotFound(_) => ErrorClass::NotFound,
            DispatchError::InvalidReference(_)
            | DispatchError::Validation(_)
            | DispatchError::AlreadyAssigned(_)
            | DispatchError::AlreadyFinished(_)
            | DispatchError::NoUnitsAvailable
            | DispatchError::NoUnitAssigned(_)
            | DispatchError::UnitNotEligible(_)
            | DispatchError::Conflict(_) => ErrorClass::ClientInput,
            DispatchError::NoDepotAvailable => ErrorClass::Unavailable,
            DispatchError::Store(_) => ErrorClass::Infrastructure,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::NotFound(_) => "not_found",
            DispatchError::InvalidReference(_) => "invalid_reference",
            DispatchError::Validation(_) => "validation",
            DispatchError::AlreadyAssigned(_) => "already_assigned",
            DispatchError::AlreadyFinished(_) => "already_finished",
            DispatchError::NoUnitsAvailable => "no_units_available",
            DispatchError::NoUnitAssigned(_) => "no_unit_assigned",
            DispatchError::UnitNotEligible(_) => "unit_not_eligible",
            DispatchError::NoDepotAvailable => "no_depot_available",
            DispatchError::Conflict(_) => "conflict",
            DispatchError::Store(_) => "storage_error",
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::NotFound(what) => DispatchError::NotFound(what),
            DomainError::InvalidReference(msg) => DispatchError::InvalidReference(msg),
            DomainError::AlreadyAssigned(id) => DispatchError::AlreadyAssigned(id),
            DomainError::NoUnitsAvailable => DispatchError::NoUnitsAvailable,
            DomainError::UnitNotEligible(id) => DispatchError::UnitNotEligible(id),
            DomainError::NoUnitAssigned(id) => DispatchError::NoUnitAssigned(id),
            DomainError::AlreadyFinished(id) => DispatchError::AlreadyFinished(id),
            DomainError::NoDepotAvailable => DispatchError::NoDepotAvailable,
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DispatchError::Conflict(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// All four services over one shared store handle.
///
/// `S` is usually an `Arc` (e.g. `Arc<InMemoryStorage>` or `Arc<dyn Storage>`)
/// so every service sees the same records.
#[derive(Debug)]
pub struct DispatchEngine<S, R = RandomSelector> {
    store: S,
    registry: UnitRegistry<S>,
    ledger: OrderLedger<S>,
    assignment: AssignmentEngine<S, R>,
    confirmation: DeliveryConfirmation<S>,
}

impl<S, R> DispatchEngine<S, R>
where
    S: Clone,
    R: UnitSelector,
{
    pub fn new(store: S, selector: R) -> Self {
        Self {
            registry: UnitRegistry::new(store.clone()),
            ledger: OrderLedger::new(store.clone()),
            assignment: AssignmentEngine::new(store.clone(), selector),
            confirmation: DeliveryConfirmation::new(store.clone()),
            store,
        }
    }
}

impl<S, R> DispatchEngine<S, R> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &UnitRegistry<S> {
        &self.registry
    }

    pub fn ledger(&self) -> &OrderLedger<S> {
        &self.ledger
    }

    pub fn assignment(&self) -> &AssignmentEngine<S, R> {
        &self.assignment
    }

    pub fn confirmation(&self) -> &DeliveryConfirmation<S> {
        &self.confirmation
    }
}

impl<S, R> DispatchEngine<S, R>
where
    S: DepotStore,
{
    /// Depot directory in creation order.
    pub fn depots(&self) -> Result<Vec<Depot>, DispatchError> {
        Ok(DepotStore::list_all(&self.store)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_meaning() {
        let err: DispatchError = DomainError::AlreadyAssigned("o-1".into()).into();
        assert!(matches!(err, DispatchError::AlreadyAssigned(ref id) if id == "o-1"));

        let err: DispatchError = DomainError::invalid_id("bad").into();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn store_concurrency_surfaces_as_conflict() {
        let err: DispatchError = StoreError::Concurrency("v1 != v2".into()).into();
        assert!(matches!(err, DispatchError::Conflict(_)));

        let err: DispatchError = StoreError::Backend("down".into()).into();
        assert_eq!(err.class(), ErrorClass::Infrastructure);
    }

    #[test]
    fn classes_follow_fault() {
        assert_eq!(DispatchError::NotFound("x".into()).class(), ErrorClass::NotFound);
        assert_eq!(DispatchError::NoUnitsAvailable.class(), ErrorClass::ClientInput);
        assert_eq!(DispatchError::Conflict("x".into()).class(), ErrorClass::ClientInput);
        assert_eq!(DispatchError::NoDepotAvailable.class(), ErrorClass::Unavailable);
        assert_eq!(DispatchError::NoDepotAvailable.code(), "no_depot_available");
    }
}
