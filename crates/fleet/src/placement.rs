//! Placement policy: which depot a newly provisioned unit joins.

use dronedispatch_core::DomainError;

use crate::depot::Depot;

/// Pick the depot with the fewest units.
///
/// Ties go to the depot encountered first, so the result is deterministic for a
/// stable enumeration order. `count_for` is queried exactly once per depot and
/// its errors are returned unchanged.
///
/// Fails with [`DomainError::NoDepotAvailable`] when `depots` is empty.
pub fn least_loaded<'a, E>(
    depots: &'a [Depot],
    mut count_for: impl FnMut(&Depot) -> Result<u64, E>,
) -> Result<&'a Depot, E>
where
    E: From<DomainError>,
{
    let mut best: Option<(&'a Depot, u64)> = None;
    for depot in depots {
        let count = count_for(depot)?;
        match best {
            Some((_, lowest)) if count >= lowest => {}
            _ => best = Some((depot, count)),
        }
    }

    best.map(|(depot, _)| depot)
        .ok_or_else(|| E::from(DomainError::NoDepotAvailable))
}
