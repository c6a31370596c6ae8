//! Integration tests for the full dispatch flow.
//!
//! Tests: provision → place → assign → confirm, over `InMemoryStorage`
//!
//! Verifies:
//! - Placement picks the least-loaded depot
//! - Only ACTIVE units are ever assigned
//! - Concurrent assignment of one order has exactly one winner
//! - Delivery confirmation is ordered after assignment and happens once

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{Duration, Utc};

    use dronedispatch_delivery::{Item, ItemId, OrderStatus, RandomSelector};
    use dronedispatch_fleet::{Depot, DepotId, GeoPoint, Unit, UnitId, UnitStatus};

    use crate::engine::{DispatchEngine, DispatchError};
    use crate::store::{DepotStore, InMemoryStorage, ItemCatalog, UnitStore};
    use dronedispatch_core::ExpectedVersion;

    type Engine = DispatchEngine<Arc<InMemoryStorage>, RandomSelector>;

    fn test_depot(lat: f64) -> Depot {
        Depot::new(DepotId::generate(), GeoPoint::new(lat, 12.34).unwrap())
    }

    fn setup(depots: usize) -> (Engine, Vec<DepotId>, ItemId) {
        let store = Arc::new(InMemoryStorage::new());
        let ids = (0..depots)
            .map(|i| {
                DepotStore::insert(&store, test_depot(55.40 + i as f64 * 0.01))
                    .unwrap()
                    .id_typed()
            })
            .collect();
        let item = Item::new(ItemId::generate(), "Hawaii", 80).unwrap();
        let item_id = ItemCatalog::insert(&store, item).unwrap().id_typed();

        (DispatchEngine::new(store, RandomSelector::seeded(7)), ids, item_id)
    }

    #[test]
    fn new_unit_goes_to_emptier_depot() {
        let (engine, depots, _) = setup(2);
        let (d1, d2) = (depots[0], depots[1]);
        for _ in 0..3 {
            let unit = Unit::provision(UnitId::generate(), d2);
            UnitStore::save(engine.store(), unit, ExpectedVersion::Exact(0)).unwrap();
        }

        let unit = engine.registry().provision().unwrap();
        assert_eq!(unit.depot_id(), d1);
        assert_eq!(unit.status(), UnitStatus::Active);
    }

    #[test]
    fn full_lifecycle_from_placement_to_delivery() {
        let (engine, _, item_id) = setup(3);
        let unit = engine.registry().provision().unwrap();

        let order = engine.ledger().place(item_id, "Strøget 1").unwrap();
        assert_eq!(engine.ledger().pending_unassigned().unwrap().len(), 1);

        let assigned = engine.assignment().assign(order.id_typed()).unwrap();
        assert_eq!(assigned.unit_id(), Some(unit.id_typed()));
        assert!(engine.ledger().pending_unassigned().unwrap().is_empty());
        assert_eq!(engine.ledger().non_finished().unwrap().len(), 1);

        let delivered = engine.confirmation().confirm(order.id_typed()).unwrap();
        assert_eq!(delivered.status(), OrderStatus::Delivered);
        assert!(Utc::now() - delivered.delivered_at().unwrap() < Duration::seconds(5));
        assert!(engine.ledger().non_finished().unwrap().is_empty());

        let err = engine.confirmation().confirm(order.id_typed()).unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyFinished(_)));
    }

    #[test]
    fn only_inactive_units_means_nothing_to_assign() {
        let (engine, _, item_id) = setup(1);
        let unit = engine.registry().provision().unwrap();
        engine.registry().deactivate(unit.id_typed()).unwrap();

        let order = engine.ledger().place(item_id, "Nyhavn 17").unwrap();
        let err = engine.assignment().assign(order.id_typed()).unwrap_err();
        assert!(matches!(err, DispatchError::NoUnitsAvailable));
        assert_eq!(
            engine.ledger().get(order.id_typed()).unwrap().status(),
            OrderStatus::Pending
        );
    }

    #[test]
    fn reactivated_unit_becomes_assignable_again() {
        let (engine, _, item_id) = setup(1);
        let unit = engine.registry().provision().unwrap();
        engine.registry().retire(unit.id_typed()).unwrap();
        engine.registry().activate(unit.id_typed()).unwrap();

        let order = engine.ledger().place(item_id, "Nyhavn 18").unwrap();
        let assigned = engine.assignment().assign(order.id_typed()).unwrap();
        assert_eq!(assigned.unit_id(), Some(unit.id_typed()));
    }

    #[test]
    fn confirm_before_assign_is_rejected() {
        let (engine, _, item_id) = setup(1);
        engine.registry().provision().unwrap();
        let order = engine.ledger().place(item_id, "Bredgade 30").unwrap();

        let err = engine.confirmation().confirm(order.id_typed()).unwrap_err();
        assert!(matches!(err, DispatchError::NoUnitAssigned(_)));
        assert!(engine.ledger().get(order.id_typed()).unwrap().delivered_at().is_none());
    }

    #[test]
    fn delivered_order_cannot_be_reassigned() {
        let (engine, _, item_id) = setup(1);
        engine.registry().provision().unwrap();
        let order = engine.ledger().place(item_id, "Bredgade 31").unwrap();
        engine.assignment().assign(order.id_typed()).unwrap();
        let delivered = engine.confirmation().confirm(order.id_typed()).unwrap();

        let err = engine.assignment().assign(order.id_typed()).unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyAssigned(_)));
        assert_eq!(engine.ledger().get(order.id_typed()).unwrap(), delivered);
    }

    #[test]
    fn one_unit_can_serve_several_orders() {
        let (engine, _, item_id) = setup(1);
        let unit = engine.registry().provision().unwrap();

        for n in 0..3 {
            let order = engine.ledger().place(item_id, &format!("Gothersgade {n}")).unwrap();
            let assigned = engine.assignment().assign(order.id_typed()).unwrap();
            assert_eq!(assigned.unit_id(), Some(unit.id_typed()));
        }
    }

    #[test]
    fn concurrent_assign_has_exactly_one_winner() {
        const CONTENDERS: usize = 8;

        let (engine, _, item_id) = setup(2);
        for _ in 0..4 {
            engine.registry().provision().unwrap();
        }
        let order = engine.ledger().place(item_id, "Rådhuspladsen 1").unwrap();
        let order_id = order.id_typed();

        let engine = Arc::new(engine);
        let barrier = Arc::new(Barrier::new(CONTENDERS));
        let handles: Vec<_> = (0..CONTENDERS)
            .map(|_| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine.assignment().assign(order_id)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        for result in &results {
            if let Err(e) = result {
                assert!(
                    matches!(e, DispatchError::AlreadyAssigned(_)),
                    "unexpected loser error: {e:?}"
                );
            }
        }

        let stored = engine.ledger().get(order_id).unwrap();
        assert_eq!(stored.unit_id(), winners[0].unit_id());
    }

    #[test]
    fn concurrent_confirm_has_exactly_one_winner() {
        const CONTENDERS: usize = 6;

        let (engine, _, item_id) = setup(1);
        engine.registry().provision().unwrap();
        let order = engine.ledger().place(item_id, "Kongens Nytorv 2").unwrap();
        engine.assignment().assign(order.id_typed()).unwrap();
        let order_id = order.id_typed();

        let engine = Arc::new(engine);
        let barrier = Arc::new(Barrier::new(CONTENDERS));
        let handles: Vec<_> = (0..CONTENDERS)
            .map(|_| {
                let engine = engine.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    engine.confirmation().confirm(order_id)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, DispatchError::AlreadyFinished(_))));

        let stored = engine.ledger().get(order_id).unwrap();
        assert_eq!(stored.delivered_at(), winners[0].delivered_at());
    }

    #[test]
    fn concurrent_provisioning_keeps_depots_balanced() {
        let (engine, depots, _) = setup(3);
        let engine = Arc::new(engine);

        // Sequential rounds: each round of three lands one unit per depot.
        for _ in 0..4 {
            for _ in 0..3 {
                engine.registry().provision().unwrap();
            }
        }

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let engine = engine.clone();
                thread::spawn(move || engine.registry().provision().map(|u| u.serial()))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        let units = engine.registry().list().unwrap();
        assert_eq!(units.len(), 18);
        for depot in depots {
            let count = engine.store().count_units_for(depot).unwrap();
            assert!(count >= 4, "depot {depot} starved: {count}");
        }
    }
}
