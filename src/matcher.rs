//! Forward lookup from a requested morphology to its subroutine.

use crate::store::SubroutineStore;
use morpho_protocol::Subroutine;

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

pub fn matches_target(sub: &Subroutine, organ: &str, species: &str) -> bool {
    eq_ignore_case(sub.organ(), organ) && eq_ignore_case(sub.species(), species)
}

/// First record in store order whose organ and species match, ignoring case.
///
/// A store holding two records for the same target always answers with the
/// earlier one; `SubroutineStore::validate` reports the shadowed entry.
pub fn find_subroutine<'a>(
    store: &'a SubroutineStore,
    organ: &str,
    species: &str,
) -> Option<&'a Subroutine> {
    store.iter().find(|sub| matches_target(sub, organ, species))
}
