use serde::{Deserialize, Serialize};

use dronedispatch_core::{AggregateRoot, DomainError, ValueObject};

dronedispatch_core::aggregate_id!(
    /// Depot identifier.
    DepotId
);

/// Geocoordinate pair of a depot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::validation(format!(
                "latitude must be within [-90, 90], got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::validation(format!(
                "longitude must be within [-180, 180], got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl ValueObject for GeoPoint {}

/// Aggregate root: Depot.
///
/// Created administratively and immutable afterwards; units reference it by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Depot {
    id: DepotId,
    location: GeoPoint,
    version: u64,
}

impl Depot {
    pub fn new(id: DepotId, location: GeoPoint) -> Self {
        Self {
            id,
            location,
            version: 0,
        }
    }

    /// Stamp the version assigned by the store after a successful save/load.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn id_typed(&self) -> DepotId {
        self.id
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }
}

impl AggregateRoot for Depot {
    type Id = DepotId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
