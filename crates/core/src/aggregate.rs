//! Aggregate root trait and optimistic concurrency expectations.

/// Aggregate root marker + minimal interface.
///
/// Depots, units and orders are independent aggregates linked by reference only.
/// Each one tracks the version it was loaded at so the storage collaborator can
/// reject writes based on a stale read.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Version of the persisted record this instance was read from.
    ///
    /// `0` means the aggregate has never been saved. Stores bump the version by
    /// one on every successful save.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a save.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (last writer wins).
    Any,
    /// Require the stored record to be at an exact version (`0` = must not exist yet).
    Exact(u64),
}

impl ExpectedVersion {
    /// Expectation for a write that must be based on `aggregate`'s current state.
    pub fn of<A: AggregateRoot>(aggregate: &A) -> Self {
        ExpectedVersion::Exact(aggregate.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
