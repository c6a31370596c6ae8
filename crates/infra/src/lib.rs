//! Infrastructure layer: storage collaborators and the dispatch engine services.
//!
//! Domain rules live in `dronedispatch-fleet` / `dronedispatch-delivery`; this crate
//! loads aggregates through the [`store`] traits, runs those rules, and writes the
//! result back under an optimistic version check.

pub mod engine;
pub mod store;

mod integration_tests;

pub use engine::{
    AssignmentEngine, DeliveryConfirmation, DispatchEngine, DispatchError, ErrorClass,
    OrderLedger, UnitRegistry,
};
pub use store::{
    DepotStore, InMemoryStorage, ItemCatalog, OrderStore, Storage, StoreError, UnitStore,
};
#[cfg(feature = "postgres")]
pub use store::PostgresStorage;
