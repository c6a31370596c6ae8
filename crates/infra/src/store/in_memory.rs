use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use dronedispatch_core::{AggregateRoot, ExpectedVersion};
use dronedispatch_delivery::{Item, ItemId, Order, OrderId};
use dronedispatch_fleet::{Depot, DepotId, Unit, UnitId};

use super::r#trait::{DepotStore, ItemCatalog, OrderStore, StoreError, UnitStore};

/// Re-stamps an aggregate with the version the store assigned to it.
trait Stamp {
    fn stamp(self, version: u64) -> Self;
}

impl Stamp for Depot {
    fn stamp(self, version: u64) -> Self {
        self.with_version(version)
    }
}

impl Stamp for Unit {
    fn stamp(self, version: u64) -> Self {
        self.with_version(version)
    }
}

impl Stamp for Order {
    fn stamp(self, version: u64) -> Self {
        self.with_version(version)
    }
}

impl Stamp for Item {
    fn stamp(self, version: u64) -> Self {
        self.with_version(version)
    }
}

/// Rows keyed by id, remembering insertion order for stable listings.
#[derive(Debug)]
struct Table<K, V> {
    rows: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K, V> Table<K, V>
where
    K: Copy + Eq + Hash + core::fmt::Display,
    V: AggregateRoot<Id = K> + Stamp + Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).cloned()
    }

    fn values(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.rows.get(k))
    }

    fn current_version(&self, key: &K) -> u64 {
        self.rows.get(key).map(|v| v.version()).unwrap_or(0)
    }

    /// Compare-and-swap on the record version, then store `value` at version + 1.
    fn upsert(&mut self, value: V, expected: ExpectedVersion) -> Result<V, StoreError> {
        let key = *value.id();
        let current = self.current_version(&key);
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "record {key}: expected {expected:?}, found {current}"
            )));
        }

        let stored = value.stamp(current + 1);
        if self.rows.insert(key, stored.clone()).is_none() {
            self.order.push(key);
        }
        Ok(stored)
    }

    fn insert_new(&mut self, value: V) -> Result<V, StoreError> {
        let key = *value.id();
        if self.rows.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("record {key} already exists")));
        }
        self.upsert(value, ExpectedVersion::Exact(0))
    }
}

/// In-memory storage collaborator implementing every store trait.
///
/// Intended for tests/dev. Each table sits behind its own `RwLock`; a save holds
/// the write lock across the version check and the write, which makes it an
/// atomic compare-and-swap per record.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    depots: RwLock<Table<DepotId, Depot>>,
    units: RwLock<Table<UnitId, Unit>>,
    orders: RwLock<Table<OrderId, Order>>,
    items: RwLock<Table<ItemId, Item>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StoreError> {
    lock.write()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DepotStore for InMemoryStorage {
    fn list_all(&self) -> Result<Vec<Depot>, StoreError> {
        Ok(read(&self.depots)?.values().cloned().collect())
    }

    fn count_units_for(&self, depot_id: DepotId) -> Result<u64, StoreError> {
        let units = read(&self.units)?;
        Ok(units.values().filter(|u| u.depot_id() == depot_id).count() as u64)
    }

    fn insert(&self, depot: Depot) -> Result<Depot, StoreError> {
        write(&self.depots)?.insert_new(depot)
    }
}

impl UnitStore for InMemoryStorage {
    fn find_by_id(&self, id: UnitId) -> Result<Option<Unit>, StoreError> {
        Ok(read(&self.units)?.get(&id))
    }

    fn save(&self, unit: Unit, expected: ExpectedVersion) -> Result<Unit, StoreError> {
        let mut units = write(&self.units)?;

        let serial_taken = units
            .values()
            .any(|u| u.serial() == unit.serial() && u.id_typed() != unit.id_typed());
        if serial_taken {
            return Err(StoreError::Duplicate(format!(
                "unit serial {} already in use",
                unit.serial()
            )));
        }

        units.upsert(unit, expected)
    }

    fn list_all(&self) -> Result<Vec<Unit>, StoreError> {
        Ok(read(&self.units)?.values().cloned().collect())
    }
}

impl OrderStore for InMemoryStorage {
    fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(read(&self.orders)?.get(&id))
    }

    fn save(&self, order: Order, expected: ExpectedVersion) -> Result<Order, StoreError> {
        write(&self.orders)?.upsert(order, expected)
    }

    fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        Ok(read(&self.orders)?.values().cloned().collect())
    }

    fn list_pending_unassigned(&self) -> Result<Vec<Order>, StoreError> {
        Ok(read(&self.orders)?
            .values()
            .filter(|o| o.is_pending_unassigned())
            .cloned()
            .collect())
    }
}

impl ItemCatalog for InMemoryStorage {
    fn find_by_id(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(read(&self.items)?.get(&id))
    }

    fn list_all(&self) -> Result<Vec<Item>, StoreError> {
        Ok(read(&self.items)?.values().cloned().collect())
    }

    fn insert(&self, item: Item) -> Result<Item, StoreError> {
        write(&self.items)?.insert_new(item)
    }
}
