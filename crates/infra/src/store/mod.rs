//! Storage collaborator boundary.
//!
//! The engine talks to depots, units, orders and the item catalog only through
//! the traits in [`r#trait`]. Every save carries an [`ExpectedVersion`] so a
//! write based on a stale read is rejected instead of silently overwriting.
//!
//! [`ExpectedVersion`]: dronedispatch_core::ExpectedVersion

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStorage;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;
pub use r#trait::{DepotStore, ItemCatalog, OrderStore, Storage, StoreError, UnitStore};
