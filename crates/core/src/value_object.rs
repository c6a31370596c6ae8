//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity**; two value objects with the same attribute
//! values are interchangeable. A depot's geocoordinate pair is the canonical
//! example in this workspace: depots are entities, their locations are values.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by value. To "modify" one, build a
/// new one. Constructors are expected to validate, so an existing instance is
/// always well-formed.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// struct GeoPoint { latitude: f64, longitude: f64 }
///
/// impl ValueObject for GeoPoint {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
