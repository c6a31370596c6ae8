use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use dronedispatch_core::{AggregateRoot, DomainError};
use dronedispatch_fleet::{Unit, UnitId};

use crate::item::ItemId;

dronedispatch_core::aggregate_id!(
    /// Order identifier.
    OrderId
);

/// Fixed interval between placing an order and its requested completion.
pub const DEFAULT_LEAD_TIME_MINUTES: i64 = 30;

/// Order lifecycle, derived from which fields are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// No unit bound yet.
    Pending,
    /// Unit bound, delivery not confirmed.
    Assigned,
    /// Delivery confirmed (terminal).
    Delivered,
}

/// Plain field set of an order, used by stores to persist and rebuild it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParts {
    pub id: OrderId,
    pub item_id: ItemId,
    pub address: String,
    pub placed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub unit_id: Option<UnitId>,
    pub version: u64,
}

/// Aggregate root: Order.
///
/// Invariants:
/// - `delivered_at` is only ever set while a unit is bound;
/// - once `delivered_at` is set, nothing else changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    item_id: ItemId,
    address: String,
    placed_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    unit_id: Option<UnitId>,
    version: u64,
}

impl Order {
    /// Place a new order due [`DEFAULT_LEAD_TIME_MINUTES`] after `now`.
    pub fn place(
        id: OrderId,
        item_id: ItemId,
        address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(DomainError::validation("delivery address must not be empty"));
        }

        Ok(Self {
            id,
            item_id,
            address,
            placed_at: now,
            due_at: now + Duration::minutes(DEFAULT_LEAD_TIME_MINUTES),
            delivered_at: None,
            unit_id: None,
            version: 0,
        })
    }

    /// Rebuild from persisted fields. Rejects records that break the lifecycle invariants.
    pub fn from_parts(parts: OrderParts) -> Result<Self, DomainError> {
        if parts.delivered_at.is_some() && parts.unit_id.is_none() {
            return Err(DomainError::validation(format!(
                "order {} is delivered without a unit",
                parts.id
            )));
        }
        Ok(Self {
            id: parts.id,
            item_id: parts.item_id,
            address: parts.address,
            placed_at: parts.placed_at,
            due_at: parts.due_at,
            delivered_at: parts.delivered_at,
            unit_id: parts.unit_id,
            version: parts.version,
        })
    }

    pub fn to_parts(&self) -> OrderParts {
        OrderParts {
            id: self.id,
            item_id: self.item_id,
            address: self.address.clone(),
            placed_at: self.placed_at,
            due_at: self.due_at,
            delivered_at: self.delivered_at,
            unit_id: self.unit_id,
            version: self.version,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn unit_id(&self) -> Option<UnitId> {
        self.unit_id
    }

    pub fn status(&self) -> OrderStatus {
        match (self.unit_id, self.delivered_at) {
            (_, Some(_)) => OrderStatus::Delivered,
            (Some(_), None) => OrderStatus::Assigned,
            (None, None) => OrderStatus::Pending,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.delivered_at.is_some()
    }

    /// Waiting in the assignment queue: no unit and not delivered.
    pub fn is_pending_unassigned(&self) -> bool {
        self.unit_id.is_none() && self.delivered_at.is_none()
    }

    /// Bind `unit` to this order.
    pub fn assign(&mut self, unit: &Unit) -> Result<(), DomainError> {
        if self.unit_id.is_some() {
            return Err(DomainError::AlreadyAssigned(self.id.to_string()));
        }
        if !unit.is_eligible() {
            return Err(DomainError::UnitNotEligible(unit.id_typed().to_string()));
        }

        self.unit_id = Some(unit.id_typed());
        Ok(())
    }

    /// Record delivery completion at `now`.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        if self.unit_id.is_none() {
            return Err(DomainError::NoUnitAssigned(self.id.to_string()));
        }
        if self.delivered_at.is_some() {
            return Err(DomainError::AlreadyFinished(self.id.to_string()));
        }

        self.delivered_at = Some(now);
        Ok(now)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
