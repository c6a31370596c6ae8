//! Unit selection policy for the assignment engine.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use dronedispatch_fleet::Unit;

/// Chooses which eligible unit gets bound to a pending order.
///
/// Implementations may weigh units however they like (geo-aware, round-robin)
/// as long as they only ever return a member of `eligible`.
pub trait UnitSelector: Send + Sync {
    /// Pick one unit, or `None` when `eligible` is empty.
    fn select<'a>(&self, eligible: &'a [Unit]) -> Option<&'a Unit>;
}

impl<S> UnitSelector for Arc<S>
where
    S: UnitSelector + ?Sized,
{
    fn select<'a>(&self, eligible: &'a [Unit]) -> Option<&'a Unit> {
        (**self).select(eligible)
    }
}

/// Uniform random choice over the eligible set.
///
/// The generator is owned by the selector; seed it in tests for reproducible runs.
#[derive(Debug)]
pub struct RandomSelector {
    rng: Mutex<StdRng>,
}

impl RandomSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl UnitSelector for RandomSelector {
    fn select<'a>(&self, eligible: &'a [Unit]) -> Option<&'a Unit> {
        if eligible.is_empty() {
            return None;
        }

        // A poisoned generator is still a usable generator.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let idx = rng.gen_range(0..eligible.len());
        eligible.get(idx)
    }
}
