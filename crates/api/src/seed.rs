//! Demo data for local runs.
//!
//! Only ever written into an empty store so restarting against a persistent
//! database does not duplicate anything.

use chrono::{Duration, Utc};
use tracing::info;

use dronedispatch_core::ExpectedVersion;
use dronedispatch_delivery::{Item, ItemId, Order, OrderId};
use dronedispatch_fleet::{Depot, DepotId, GeoPoint, Unit, UnitId, UnitStatus};
use dronedispatch_infra::{
    DepotStore, DispatchError, ItemCatalog, OrderStore, Storage, UnitStore,
};

const DEMO_DEPOTS: [(f64, f64); 3] = [(55.41, 12.34), (55.42, 12.33), (55.40, 12.36)];

const DEMO_ITEMS: [(&str, u64); 5] = [
    ("Margherita", 65),
    ("Pepperoni", 75),
    ("Hawaii", 80),
    ("Vegetariana", 70),
    ("Meat Lovers", 90),
];

/// One unit per depot, in depot order.
const DEMO_UNIT_STATUSES: [UnitStatus; 3] =
    [UnitStatus::Active, UnitStatus::Inactive, UnitStatus::Retired];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub depots: usize,
    pub items: usize,
    pub units: usize,
    pub orders: usize,
}

/// Seed demo records. Returns `None` without writing when the store has any data.
pub fn seed_demo_data(store: &dyn Storage) -> Result<Option<SeedReport>, DispatchError> {
    let populated = !DepotStore::list_all(store)?.is_empty()
        || !UnitStore::list_all(store)?.is_empty()
        || !ItemCatalog::list_all(store)?.is_empty()
        || !OrderStore::list_all(store)?.is_empty();
    if populated {
        info!("store already holds data; demo seeding skipped");
        return Ok(None);
    }

    let mut depots = Vec::with_capacity(DEMO_DEPOTS.len());
    for (lat, lon) in DEMO_DEPOTS {
        let depot = Depot::new(DepotId::generate(), GeoPoint::new(lat, lon)?);
        depots.push(DepotStore::insert(store, depot)?);
    }

    let mut items = Vec::with_capacity(DEMO_ITEMS.len());
    for (title, price) in DEMO_ITEMS {
        items.push(ItemCatalog::insert(store, Item::new(ItemId::generate(), title, price)?)?);
    }

    let mut units = Vec::with_capacity(DEMO_UNIT_STATUSES.len());
    for (depot, status) in depots.iter().zip(DEMO_UNIT_STATUSES) {
        let mut unit = Unit::provision(UnitId::generate(), depot.id_typed());
        unit.transition_to(status);
        units.push(UnitStore::save(store, unit, ExpectedVersion::Exact(0))?);
    }

    let now = Utc::now();
    let pending = Order::place(OrderId::generate(), items[0].id_typed(), "Torvet 1, 4600 Køge", now)?;
    OrderStore::save(store, pending, ExpectedVersion::Exact(0))?;

    let mut delivered = Order::place(
        OrderId::generate(),
        items[1].id_typed(),
        "Nørregade 12, 4600 Køge",
        now - Duration::hours(1),
    )?;
    delivered.assign(&units[0])?;
    delivered.confirm(now - Duration::minutes(35))?;
    OrderStore::save(store, delivered, ExpectedVersion::Exact(0))?;

    let report = SeedReport {
        depots: depots.len(),
        items: items.len(),
        units: units.len(),
        orders: 2,
    };
    info!(?report, "demo data seeded");
    Ok(Some(report))
}
