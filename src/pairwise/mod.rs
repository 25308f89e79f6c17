//! Pairwise reaction-pathway inference
//!
//! Solid-state reactions are assumed to proceed between two phases at a time.
//! [`retroanalyze`] decomposes an observed outcome into such pairwise steps,
//! [`ReactionDatabase`] accumulates what has been learned, and
//! [`pred_evolution`] projects a precursor set forward through the known
//! reactions.

pub mod database;
pub mod evolution;
pub mod persist;
pub mod retro;
pub mod routes;

pub use database::{
    KnownReaction, ReactantKey, ReactionDatabase, Report, Scope, TemperatureBounds,
    MAX_TEMPERATURE,
};
pub use evolution::{pred_evolution, EvolutionOptions};
pub use retro::{retroanalyze, RetroMessage, RetroOutcome, RetroRequest, SuspectedReaction};
pub use routes::{ProbedRoute, ProbedRoutes};

use tracing::warn;

use crate::reactions::{apply_reaction, balance_with_uptake, Inventory, UNLIMITED_GAS};
use crate::Result;

/// Apply a known reaction to an inventory.
///
/// The reaction's solids are taken from `inventory`; O2/CO2 are added from
/// the atmosphere when the solids alone do not balance. Compounds not involved in the reaction are carried over and
/// volatile species are dropped from the result.
///
/// Returns `Ok(None)` if the reaction has unknown products or cannot be
/// balanced.
pub(crate) fn fold_known_reaction(
    inventory: &Inventory,
    reaction: &KnownReaction,
) -> Result<Option<Inventory>> {
    let products = reaction.product_list();
    if products.is_empty() {
        return Ok(None);
    }
    let solids = reaction.reactants.formulas();
    let Some((reactants, coeffs)) = balance_with_uptake(solids, &products) else {
        warn!(
            reactants = %reaction.reactants,
            products = %crate::composition::join(&products),
            "known reaction cannot be balanced"
        );
        return Ok(None);
    };

    let available: Vec<f64> = reactants
        .iter()
        .map(|r| {
            if r.is_oxidant() {
                UNLIMITED_GAS
            } else {
                inventory.amount(r).unwrap_or(0.0)
            }
        })
        .collect();
    let mut next = apply_reaction(
        &reactants,
        &available,
        coeffs.reactants(),
        &products,
        coeffs.products(),
    )?;
    for (compound, amount) in inventory.iter() {
        if !next.contains(compound) && !reactants.contains(compound) {
            next.add(compound.clone(), amount);
        }
    }
    Ok(Some(next.without_volatiles()))
}
