use tracing::{debug, info, instrument};

use dronedispatch_core::ExpectedVersion;
use dronedispatch_delivery::{Order, OrderId, RandomSelector, UnitSelector};
use dronedispatch_fleet::{Unit, UnitId};

use crate::engine::DispatchError;
use crate::store::{OrderStore, StoreError, UnitStore};

/// Assignment Engine: binds an eligible unit to a pending order.
///
/// Eligibility is status only (ACTIVE); the unit's depot plays no part. A unit
/// may serve several open orders at once.
#[derive(Debug)]
pub struct AssignmentEngine<S, R = RandomSelector> {
    store: S,
    selector: R,
}

impl<S, R> AssignmentEngine<S, R> {
    pub fn new(store: S, selector: R) -> Self {
        Self { store, selector }
    }
}

impl<S, R> AssignmentEngine<S, R>
where
    S: OrderStore + UnitStore,
    R: UnitSelector,
{
    /// Bind a randomly chosen ACTIVE unit to the order.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub fn assign(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        let mut order = self.load_unassigned(order_id)?;

        let eligible: Vec<Unit> = UnitStore::list_all(&self.store)?
            .into_iter()
            .filter(Unit::is_eligible)
            .collect();
        let unit = self
            .selector
            .select(&eligible)
            .ok_or(DispatchError::NoUnitsAvailable)?;

        order.assign(unit)?;
        self.commit(order, unit.id_typed())
    }

    /// Bind a specific unit to the order. The unit must be ACTIVE.
    #[instrument(skip(self), fields(order_id = %order_id, unit_id = %unit_id), err)]
    pub fn assign_to(&self, order_id: OrderId, unit_id: UnitId) -> Result<Order, DispatchError> {
        let mut order = self.load_unassigned(order_id)?;

        let unit = UnitStore::find_by_id(&self.store, unit_id)?
            .ok_or_else(|| DispatchError::NotFound(format!("unit {unit_id}")))?;

        order.assign(&unit)?;
        self.commit(order, unit_id)
    }

    fn load_unassigned(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        let order = OrderStore::find_by_id(&self.store, order_id)?
            .ok_or_else(|| DispatchError::NotFound(format!("order {order_id}")))?;
        if order.unit_id().is_some() {
            return Err(DispatchError::AlreadyAssigned(order_id.to_string()));
        }
        Ok(order)
    }

    fn commit(&self, order: Order, unit_id: UnitId) -> Result<Order, DispatchError> {
        let order_id = order.id_typed();
        let expected = ExpectedVersion::of(&order);

        match OrderStore::save(&self.store, order, expected) {
            Ok(saved) => {
                info!(order_id = %order_id, unit_id = %unit_id, "order assigned");
                Ok(saved)
            }
            Err(StoreError::Concurrency(detail)) => {
                debug!(order_id = %order_id, %detail, "lost assignment race");
                Err(self.classify_lost_race(order_id, detail))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-read the order once to report what the concurrent writer did.
    fn classify_lost_race(&self, order_id: OrderId, detail: String) -> DispatchError {
        match OrderStore::find_by_id(&self.store, order_id) {
            Ok(Some(current)) if current.unit_id().is_some() => {
                DispatchError::AlreadyAssigned(order_id.to_string())
            }
            Ok(Some(current)) if current.is_finished() => {
                DispatchError::AlreadyFinished(order_id.to_string())
            }
            Ok(_) => DispatchError::Conflict(detail),
            Err(e) => e.into(),
        }
    }
}
