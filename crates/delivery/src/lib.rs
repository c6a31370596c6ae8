//! Delivery domain module: catalog items, orders and unit selection.
//!
//! This crate contains the order lifecycle rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Randomness is only
//! ever drawn from an injected [`UnitSelector`].

pub mod item;
pub mod order;
pub mod selection;

pub use item::{Item, ItemId};
pub use order::{DEFAULT_LEAD_TIME_MINUTES, Order, OrderId, OrderParts, OrderStatus};
pub use selection::{RandomSelector, UnitSelector};
