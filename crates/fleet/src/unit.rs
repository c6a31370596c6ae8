use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dronedispatch_core::AggregateRoot;

use crate::depot::DepotId;

dronedispatch_core::aggregate_id!(
    /// Delivery unit identifier.
    UnitId
);

/// Globally unique serial token stamped on a unit at provisioning.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialNumber(Uuid);

impl SerialNumber {
    /// Fresh random (v4) serial.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Operational status of a unit.
///
/// Every status may move to every other status; none of them is terminal.
/// A retired unit can be re-activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Active,
    Inactive,
    Retired,
}

impl UnitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Active => "active",
            UnitStatus::Inactive => "inactive",
            UnitStatus::Retired => "retired",
        }
    }

    /// Inverse of [`UnitStatus::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(UnitStatus::Active),
            "inactive" => Some(UnitStatus::Inactive),
            "retired" => Some(UnitStatus::Retired),
            _ => None,
        }
    }
}

impl core::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Unit.
///
/// A unit is placed at exactly one depot when it is provisioned and never moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    id: UnitId,
    serial: SerialNumber,
    status: UnitStatus,
    depot_id: DepotId,
    version: u64,
}

impl Unit {
    /// A freshly provisioned unit: ACTIVE, new serial, placed at `depot_id`.
    pub fn provision(id: UnitId, depot_id: DepotId) -> Self {
        Self {
            id,
            serial: SerialNumber::generate(),
            status: UnitStatus::Active,
            depot_id,
            version: 0,
        }
    }

    /// Rebuild a unit from a persisted record.
    pub fn restore(
        id: UnitId,
        serial: SerialNumber,
        status: UnitStatus,
        depot_id: DepotId,
        version: u64,
    ) -> Self {
        Self {
            id,
            serial,
            status,
            depot_id,
            version,
        }
    }

    /// Stamp the version assigned by the store after a successful save.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn id_typed(&self) -> UnitId {
        self.id
    }

    pub fn serial(&self) -> SerialNumber {
        self.serial
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn depot_id(&self) -> DepotId {
        self.depot_id
    }

    /// Eligible for a new order assignment. The depot plays no part.
    pub fn is_eligible(&self) -> bool {
        self.status == UnitStatus::Active
    }

    /// Move to `status` unconditionally; returns the previous status.
    pub fn transition_to(&mut self, status: UnitStatus) -> UnitStatus {
        core::mem::replace(&mut self.status, status)
    }

    pub fn activate(&mut self) -> UnitStatus {
        self.transition_to(UnitStatus::Active)
    }

    pub fn deactivate(&mut self) -> UnitStatus {
        self.transition_to(UnitStatus::Inactive)
    }

    pub fn retire(&mut self) -> UnitStatus {
        self.transition_to(UnitStatus::Retired)
    }
}

impl AggregateRoot for Unit {
    type Id = UnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
