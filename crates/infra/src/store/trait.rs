use std::sync::Arc;

use thiserror::Error;

use dronedispatch_core::ExpectedVersion;
use dronedispatch_delivery::{Item, ItemId, Order, OrderId};
use dronedispatch_fleet::{Depot, DepotId, Unit, UnitId};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors. The engine
/// passes them through uninterpreted, except for `Concurrency`, which it uses to
/// detect a lost race on a single record.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored record's version did not match the expected one.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A uniqueness constraint was violated (record id, unit serial).
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// The backend failed (connection, lock poisoning, query error).
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// A persisted record could not be turned back into a domain aggregate.
    #[error("failed to decode stored record: {0}")]
    Decode(String),
}

/// Depot directory. Read-mostly; depots are never deleted.
pub trait DepotStore: Send + Sync {
    /// All depots in a stable (creation) order.
    fn list_all(&self) -> Result<Vec<Depot>, StoreError>;

    /// Number of units currently placed at `depot_id`, whatever their status.
    fn count_units_for(&self, depot_id: DepotId) -> Result<u64, StoreError>;

    /// Administrative creation. Fails with `Duplicate` if the id already exists.
    fn insert(&self, depot: Depot) -> Result<Depot, StoreError>;
}

/// Unit records.
pub trait UnitStore: Send + Sync {
    fn find_by_id(&self, id: UnitId) -> Result<Option<Unit>, StoreError>;

    /// Insert or update `unit` if the stored version satisfies `expected`.
    ///
    /// Returns the unit stamped with its new version. Serial numbers must stay
    /// unique across all units.
    fn save(&self, unit: Unit, expected: ExpectedVersion) -> Result<Unit, StoreError>;

    fn list_all(&self) -> Result<Vec<Unit>, StoreError>;
}

/// Order records.
pub trait OrderStore: Send + Sync {
    fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Insert or update `order` if the stored version satisfies `expected`.
    fn save(&self, order: Order, expected: ExpectedVersion) -> Result<Order, StoreError>;

    fn list_all(&self) -> Result<Vec<Order>, StoreError>;

    /// Orders with no unit bound and no delivery time recorded.
    fn list_pending_unassigned(&self) -> Result<Vec<Order>, StoreError>;
}

/// Item catalog used to validate order placement.
pub trait ItemCatalog: Send + Sync {
    fn find_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    fn list_all(&self) -> Result<Vec<Item>, StoreError>;

    fn insert(&self, item: Item) -> Result<Item, StoreError>;
}

/// Every store capability behind one object, for callers that pick a backend at runtime.
pub trait Storage: DepotStore + UnitStore + OrderStore + ItemCatalog {}

impl<T> Storage for T where T: DepotStore + UnitStore + OrderStore + ItemCatalog + ?Sized {}

impl<S> DepotStore for Arc<S>
where
    S: DepotStore + ?Sized,
{
    fn list_all(&self) -> Result<Vec<Depot>, StoreError> {
        DepotStore::list_all(&**self)
    }

    fn count_units_for(&self, depot_id: DepotId) -> Result<u64, StoreError> {
        (**self).count_units_for(depot_id)
    }

    fn insert(&self, depot: Depot) -> Result<Depot, StoreError> {
        DepotStore::insert(&**self, depot)
    }
}

impl<S> UnitStore for Arc<S>
where
    S: UnitStore + ?Sized,
{
    fn find_by_id(&self, id: UnitId) -> Result<Option<Unit>, StoreError> {
        UnitStore::find_by_id(&**self, id)
    }

    fn save(&self, unit: Unit, expected: ExpectedVersion) -> Result<Unit, StoreError> {
        UnitStore::save(&**self, unit, expected)
    }

    fn list_all(&self) -> Result<Vec<Unit>, StoreError> {
        UnitStore::list_all(&**self)
    }
}

impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        OrderStore::find_by_id(&**self, id)
    }

    fn save(&self, order: Order, expected: ExpectedVersion) -> Result<Order, StoreError> {
        OrderStore::save(&**self, order, expected)
    }

    fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        OrderStore::list_all(&**self)
    }

    fn list_pending_unassigned(&self) -> Result<Vec<Order>, StoreError> {
        (**self).list_pending_unassigned()
    }
}

impl<S> ItemCatalog for Arc<S>
where
    S: ItemCatalog + ?Sized,
{
    fn find_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        ItemCatalog::find_by_id(&**self, id)
    }

    fn list_all(&self) -> Result<Vec<Item>, StoreError> {
        ItemCatalog::list_all(&**self)
    }

    fn insert(&self, item: Item) -> Result<Item, StoreError> {
        ItemCatalog::insert(&**self, item)
    }
}
