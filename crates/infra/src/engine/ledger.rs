use chrono::Utc;
use tracing::{info, instrument};

use dronedispatch_core::ExpectedVersion;
use dronedispatch_delivery::{Item, ItemId, Order, OrderId};

use crate::engine::DispatchError;
use crate::store::{ItemCatalog, OrderStore};

/// Order Ledger: order creation and the queue views over orders.
#[derive(Debug, Clone)]
pub struct OrderLedger<S> {
    store: S,
}

impl<S> OrderLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> OrderLedger<S>
where
    S: OrderStore + ItemCatalog,
{
    /// Place a new order for `item_id`. The item must exist in the catalog.
    #[instrument(skip(self, address), fields(item_id = %item_id), err)]
    pub fn place(&self, item_id: ItemId, address: &str) -> Result<Order, DispatchError> {
        if ItemCatalog::find_by_id(&self.store, item_id)?.is_none() {
            return Err(DispatchError::InvalidReference(format!(
                "item {item_id} is not in the catalog"
            )));
        }

        let order = Order::place(OrderId::generate(), item_id, address, Utc::now())?;
        let order = OrderStore::save(&self.store, order, ExpectedVersion::Exact(0))?;

        info!(
            order_id = %order.id_typed(),
            item_id = %item_id,
            due_at = %order.due_at(),
            "order placed"
        );
        Ok(order)
    }

    /// Orders waiting for a unit. Recomputed from the store on every call.
    pub fn pending_unassigned(&self) -> Result<Vec<Order>, DispatchError> {
        Ok(self.store.list_pending_unassigned()?)
    }

    /// Orders whose delivery is not confirmed yet, assigned or not.
    pub fn non_finished(&self) -> Result<Vec<Order>, DispatchError> {
        Ok(OrderStore::list_all(&self.store)?
            .into_iter()
            .filter(|o| !o.is_finished())
            .collect())
    }

    pub fn get(&self, id: OrderId) -> Result<Order, DispatchError> {
        OrderStore::find_by_id(&self.store, id)?
            .ok_or_else(|| DispatchError::NotFound(format!("order {id}")))
    }

    /// Catalog entries orders can be placed against.
    pub fn items(&self) -> Result<Vec<Item>, DispatchError> {
        Ok(ItemCatalog::list_all(&self.store)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStorage;
    use chrono::Duration;
    use dronedispatch_delivery::OrderStatus;
    use dronedispatch_fleet::{DepotId, Unit, UnitId};
    use std::sync::Arc;

    fn ledger_with_item() -> (OrderLedger<Arc<InMemoryStorage>>, ItemId) {
        let store = Arc::new(InMemoryStorage::new());
        let item = Item::new(ItemId::generate(), "Margherita", 65).unwrap();
        let item_id = ItemCatalog::insert(&store, item).unwrap().id_typed();
        (OrderLedger::new(store), item_id)
    }

    #[test]
    fn place_creates_pending_order_due_in_thirty_minutes() {
        let (ledger, item_id) = ledger_with_item();
        let before = Utc::now();
        let order = ledger.place(item_id, "Vesterbrogade 3").unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.item_id(), item_id);
        assert!(order.placed_at() >= before);
        assert_eq!(order.due_at() - order.placed_at(), Duration::minutes(30));
        assert_eq!(ledger.get(order.id_typed()).unwrap(), order);
    }

    #[test]
    fn place_rejects_unknown_item() {
        let (ledger, _) = ledger_with_item();
        let err = ledger.place(ItemId::generate(), "Vesterbrogade 3").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidReference(_)));
        assert!(ledger.non_finished().unwrap().is_empty());
    }

    #[test]
    fn place_rejects_blank_address() {
        let (ledger, item_id) = ledger_with_item();
        let err = ledger.place(item_id, "  ").unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn queue_views_track_order_progress() {
        let (ledger, item_id) = ledger_with_item();
        let waiting = ledger.place(item_id, "Amagerbrogade 1").unwrap();
        let moving = ledger.place(item_id, "Amagerbrogade 2").unwrap();
        let done = ledger.place(item_id, "Amagerbrogade 3").unwrap();

        let unit = Unit::provision(UnitId::generate(), DepotId::generate());
        let mut assigned = moving.clone();
        assigned.assign(&unit).unwrap();
        OrderStore::save(&ledger.store, assigned, ExpectedVersion::Exact(1)).unwrap();

        let mut delivered = done.clone();
        delivered.assign(&unit).unwrap();
        delivered.confirm(Utc::now()).unwrap();
        OrderStore::save(&ledger.store, delivered, ExpectedVersion::Exact(1)).unwrap();

        let pending: Vec<OrderId> = ledger
            .pending_unassigned()
            .unwrap()
            .iter()
            .map(|o| o.id_typed())
            .collect();
        assert_eq!(pending, vec![waiting.id_typed()]);

        let open: Vec<OrderId> = ledger
            .non_finished()
            .unwrap()
            .iter()
            .map(|o| o.id_typed())
            .collect();
        assert_eq!(open, vec![waiting.id_typed(), moving.id_typed()]);
    }

    #[test]
    fn unknown_order_is_not_found() {
        let (ledger, _) = ledger_with_item();
        let err = ledger.get(OrderId::generate()).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }
}
