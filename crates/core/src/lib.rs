//! `dronedispatch-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the fleet and delivery
//! modules (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::DomainError;
pub use id::AggregateId;
pub use value_object::ValueObject;
