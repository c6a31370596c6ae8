//! Fleet domain module: depots, delivery units and unit placement.
//!
//! This crate contains business rules for the fleet, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod depot;
pub mod placement;
pub mod unit;

pub use depot::{Depot, DepotId, GeoPoint};
pub use placement::least_loaded;
pub use unit::{SerialNumber, Unit, UnitId, UnitStatus};
