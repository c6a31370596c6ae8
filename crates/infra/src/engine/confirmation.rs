use chrono::Utc;
use tracing::{debug, info, instrument};

use dronedispatch_core::ExpectedVersion;
use dronedispatch_delivery::{Order, OrderId};

use crate::engine::DispatchError;
use crate::store::{OrderStore, StoreError};

/// Delivery Confirmation: records completion of an assigned order.
#[derive(Debug, Clone)]
pub struct DeliveryConfirmation<S> {
    store: S,
}

impl<S> DeliveryConfirmation<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> DeliveryConfirmation<S>
where
    S: OrderStore,
{
    /// Stamp `delivered_at = now` on an assigned, undelivered order.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub fn confirm(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        let mut order = self
            .store
            .find_by_id(order_id)?
            .ok_or_else(|| DispatchError::NotFound(format!("order {order_id}")))?;

        let delivered_at = order.confirm(Utc::now())?;
        let expected = ExpectedVersion::of(&order);

        match self.store.save(order, expected) {
            Ok(saved) => {
                info!(order_id = %order_id, %delivered_at, "delivery confirmed");
                Ok(saved)
            }
            Err(StoreError::Concurrency(detail)) => {
                debug!(order_id = %order_id, %detail, "lost confirmation race");
                match self.store.find_by_id(order_id) {
                    Ok(Some(current)) if current.is_finished() => {
                        Err(DispatchError::AlreadyFinished(order_id.to_string()))
                    }
                    Ok(_) => Err(DispatchError::Conflict(detail)),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
