use tracing::{info, instrument};

use dronedispatch_core::ExpectedVersion;
use dronedispatch_fleet::placement::least_loaded;
use dronedispatch_fleet::{Unit, UnitId, UnitStatus};

use crate::engine::DispatchError;
use crate::store::{DepotStore, UnitStore};

/// Unit Registry: provisioning and status transitions.
///
/// Status transitions are unconditional. Any status may move to any other,
/// including RETIRED back to ACTIVE, and repeating a transition is a no-op in
/// effect. Status writes therefore use `ExpectedVersion::Any`: last writer wins.
#[derive(Debug, Clone)]
pub struct UnitRegistry<S> {
    store: S,
}

impl<S> UnitRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> UnitRegistry<S>
where
    S: DepotStore + UnitStore,
{
    /// Create an ACTIVE unit at the depot with the fewest units.
    #[instrument(skip_all, err)]
    pub fn provision(&self) -> Result<Unit, DispatchError> {
        let depots = DepotStore::list_all(&self.store)?;
        let depot = least_loaded(&depots, |d| {
            self.store
                .count_units_for(d.id_typed())
                .map_err(DispatchError::from)
        })?;

        let unit = Unit::provision(UnitId::generate(), depot.id_typed());
        let unit = UnitStore::save(&self.store, unit, ExpectedVersion::Exact(0))?;

        info!(
            unit_id = %unit.id_typed(),
            depot_id = %unit.depot_id(),
            serial = %unit.serial(),
            "unit provisioned"
        );
        Ok(unit)
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub fn activate(&self, id: UnitId) -> Result<Unit, DispatchError> {
        self.set_status(id, UnitStatus::Active)
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub fn deactivate(&self, id: UnitId) -> Result<Unit, DispatchError> {
        self.set_status(id, UnitStatus::Inactive)
    }

    #[instrument(skip(self), fields(unit_id = %id), err)]
    pub fn retire(&self, id: UnitId) -> Result<Unit, DispatchError> {
        self.set_status(id, UnitStatus::Retired)
    }

    pub fn get(&self, id: UnitId) -> Result<Unit, DispatchError> {
        UnitStore::find_by_id(&self.store, id)?
            .ok_or_else(|| DispatchError::NotFound(format!("unit {id}")))
    }

    pub fn list(&self) -> Result<Vec<Unit>, DispatchError> {
        Ok(UnitStore::list_all(&self.store)?)
    }

    fn set_status(&self, id: UnitId, status: UnitStatus) -> Result<Unit, DispatchError> {
        let mut unit = self.get(id)?;
        let previous = unit.transition_to(status);
        let unit = UnitStore::save(&self.store, unit, ExpectedVersion::Any)?;

        info!(unit_id = %id, from = %previous, to = %status, "unit status changed");
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStorage;
    use dronedispatch_core::AggregateRoot;
    use dronedispatch_fleet::{Depot, DepotId, GeoPoint};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn registry_with_depots(n: usize) -> (UnitRegistry<Arc<InMemoryStorage>>, Vec<DepotId>) {
        let store = Arc::new(InMemoryStorage::new());
        let ids = (0..n)
            .map(|i| {
                let location = GeoPoint::new(55.40 + i as f64 * 0.01, 12.34).unwrap();
                DepotStore::insert(&store, Depot::new(DepotId::generate(), location))
                    .unwrap()
                    .id_typed()
            })
            .collect();
        (UnitRegistry::new(store), ids)
    }

    #[test]
    fn provision_without_depots_fails() {
        let (registry, _) = registry_with_depots(0);
        let err = registry.provision().unwrap_err();
        assert!(matches!(err, DispatchError::NoDepotAvailable));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn provisioned_units_are_active_unique_and_placed() {
        let (registry, depots) = registry_with_depots(2);
        let units: Vec<Unit> = (0..6).map(|_| registry.provision().unwrap()).collect();

        let serials: HashSet<_> = units.iter().map(|u| u.serial()).collect();
        assert_eq!(serials.len(), units.len());
        for unit in &units {
            assert_eq!(unit.status(), UnitStatus::Active);
            assert!(depots.contains(&unit.depot_id()));
            assert_eq!(unit.version(), 1);
        }
    }

    #[test]
    fn provisioning_spreads_units_evenly() {
        let (registry, depots) = registry_with_depots(3);
        for _ in 0..9 {
            registry.provision().unwrap();
        }
        for depot in depots {
            assert_eq!(registry.store.count_units_for(depot).unwrap(), 3);
        }
    }

    #[test]
    fn retired_unit_can_be_reactivated() {
        let (registry, _) = registry_with_depots(1);
        let unit = registry.provision().unwrap();

        let retired = registry.retire(unit.id_typed()).unwrap();
        assert_eq!(retired.status(), UnitStatus::Retired);

        let active = registry.activate(unit.id_typed()).unwrap();
        assert_eq!(active.status(), UnitStatus::Active);
        assert_eq!(registry.get(unit.id_typed()).unwrap().status(), UnitStatus::Active);
    }

    #[test]
    fn repeated_transition_is_idempotent() {
        let (registry, _) = registry_with_depots(1);
        let unit = registry.provision().unwrap();

        registry.deactivate(unit.id_typed()).unwrap();
        let again = registry.deactivate(unit.id_typed()).unwrap();
        assert_eq!(again.status(), UnitStatus::Inactive);
        assert_eq!(again.serial(), unit.serial());
        assert_eq!(again.depot_id(), unit.depot_id());
    }

    #[test]
    fn unknown_unit_is_not_found() {
        let (registry, _) = registry_with_depots(1);
        let err = registry.activate(UnitId::generate()).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }
}
