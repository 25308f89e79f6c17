//! Retro-analysis of an observed synthesis outcome
//!
//! Given what was loaded into the furnace and what came out, find every
//! pairwise (or single-phase) reaction that balances against the observed
//! products, after first replaying reactions already known to happen to this
//! precursor set at lower temperatures.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use super::database::{ReactantKey, ReactionDatabase};
use super::routes::{ProbedRoute, ProbedRoutes};
use crate::composition::{join, weight_fractions, Formula};
use crate::reactions::{balance, combinations_of, subsets, Energetics, Inventory};
use crate::{Error, Result};

/// Minimum weight-fraction increase counted as a formed product.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

/// One observed experiment to analyse.
#[derive(Debug, Clone)]
pub struct RetroRequest {
    /// Starting materials
    pub precursors: Vec<Formula>,
    /// Molar amounts of the starting materials
    pub initial_amounts: Vec<f64>,
    /// Observed phases
    pub products: Vec<Formula>,
    /// Weight fractions of the observed phases (sum to 1)
    pub final_amounts: Vec<f64>,
    /// Temperature (°C)
    pub temperature: i64,
    /// Phases tolerated alongside the target
    pub allowed_byproducts: Vec<Formula>,
    /// Allow O2/CO2 exchange with the atmosphere
    pub open_system: bool,
    /// Only accept reactions with negative reaction energy
    pub enforce_thermo: bool,
}

/// Summary of what an analysis established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetroMessage {
    /// Precursors (or folded intermediates) already analysed at this temperature
    AlreadyProbed,
    /// Products equal the precursors
    NoReaction,
    /// Everything observed is explained by previously known reactions
    OnlyKnownIntermediates,
    /// Every product has exactly one explaining reaction
    FullyDetermined,
    /// Some products have a unique origin
    PartiallyDetermined,
    /// No product has a unique origin
    NoneDiscovered,
}

impl fmt::Display for RetroMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AlreadyProbed => "Reaction already probed.",
            Self::NoReaction => "No reactions occured.",
            Self::OnlyKnownIntermediates => "Only known intermediate reactions occured.",
            Self::FullyDetermined => "Reaction pathway fully determined.",
            Self::PartiallyDetermined => "Reaction pathway partially determined.",
            Self::NoneDiscovered => "No reactions discovered",
        };
        f.write_str(text)
    }
}

/// A balanced candidate reaction consistent with the observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SuspectedReaction {
    /// Reactants, solids first
    pub reactants: Vec<Formula>,
    /// Products, solids first
    pub products: Vec<Formula>,
}

impl fmt::Display for SuspectedReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", join(&self.reactants), join(&self.products))
    }
}

/// Result of [`retroanalyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetroOutcome {
    /// Classification
    pub message: RetroMessage,
    /// Candidate reactions
    pub suspected: Vec<SuspectedReaction>,
    /// Products explained by exactly one candidate (no gases)
    pub known_products: Vec<Formula>,
    /// Molar inventory after replaying known local reactions, if any applied
    pub intermediates: Option<Inventory>,
    /// Precursor pairs that survived unchanged
    pub inert_pairs: Vec<ReactantKey>,
}

impl RetroOutcome {
    fn early(message: RetroMessage) -> Self {
        Self {
            message,
            suspected: Vec::new(),
            known_products: Vec::new(),
            intermediates: None,
            inert_pairs: Vec::new(),
        }
    }

    /// Intermediate compounds, if any known reaction was replayed.
    #[must_use]
    pub fn intermediate_compounds(&self) -> Option<&[Formula]> {
        self.intermediates.as_ref().map(Inventory::compounds)
    }
}

/// Analyse one experiment.
///
/// `energetics` is required when `request.enforce_thermo` is set; candidates
/// whose energy cannot be evaluated are dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on mismatched amount lengths or zero total
/// mass, and [`Error::Thermo`] if thermodynamic filtering is requested
/// without an oracle.
pub fn retroanalyze(
    request: &RetroRequest,
    database: &ReactionDatabase,
    probed: &ProbedRoutes,
    energetics: Option<&Energetics<'_>>,
) -> Result<RetroOutcome> {
    if request.products.len() != request.final_amounts.len() {
        return Err(Error::InvalidInput(format!(
            "{} products but {} weight fractions",
            request.products.len(),
            request.final_amounts.len()
        )));
    }
    if request.enforce_thermo && energetics.is_none() {
        return Err(Error::Thermo(
            "thermodynamic filtering requires an energetics oracle".to_string(),
        ));
    }
    let temperature = request.temperature;

    if probed.contains(&ProbedRoute::new(&request.precursors, temperature)) {
        debug!(precursors = %join(&request.precursors), temperature, "route already probed");
        return Ok(RetroOutcome::early(RetroMessage::AlreadyProbed));
    }

    let mut inventory =
        Inventory::from_parts(request.precursors.clone(), request.initial_amounts.clone())?;

    // Replay local reactions known to occur at or below this temperature
    let mut intermediates = None;
    if !database.is_empty() {
        for known in database.as_sorted_list(true) {
            if known.upper > temperature || known.products.is_none() {
                continue;
            }
            if !known.reactants.is_subset_of(inventory.compounds()) {
                continue;
            }
            let Some(next) = super::fold_known_reaction(&inventory, &known)? else {
                continue;
            };
            debug!(
                reactants = %known.reactants,
                products = %join(&known.product_list()),
                upper = known.upper,
                "folded known local reaction"
            );
            inventory = next;
            intermediates = Some(inventory.clone());
        }
    }

    if intermediates.is_some()
        && probed.contains(&ProbedRoute::new(inventory.compounds(), temperature))
    {
        debug!(intermediates = %join(inventory.compounds()), temperature, "intermediates already probed");
        return Ok(RetroOutcome::early(RetroMessage::AlreadyProbed));
    }

    let precursors = inventory.compounds().to_vec();
    let initial_wts = weight_fractions(&precursors, inventory.amounts())?;

    let inert_pairs: Vec<ReactantKey> = combinations_of(&precursors, 2)
        .into_iter()
        .filter(|pair| pair.iter().all(|c| request.products.contains(c) && !c.is_oxidant()))
        .map(|pair| ReactantKey::new(&pair))
        .collect();

    let observed = observed_products(&precursors, &initial_wts, request);

    if observed.is_empty() {
        let message = if intermediates.is_some() {
            RetroMessage::OnlyKnownIntermediates
        } else {
            RetroMessage::NoReaction
        };
        info!(%message, temperature);
        return Ok(RetroOutcome {
            message,
            suspected: Vec::new(),
            known_products: Vec::new(),
            intermediates,
            inert_pairs,
        });
    }

    let reactant_sets = candidate_reactant_sets(&precursors, &observed, request.open_system);
    let product_sets = candidate_product_sets(&observed, &request.allowed_byproducts);

    let mut suspected = Vec::new();
    for products in &product_sets {
        let product_set: BTreeSet<&Formula> = products.iter().collect();
        for reactants in &reactant_sets {
            if reactants.iter().collect::<BTreeSet<_>>() == product_set {
                continue;
            }
            if database.is_inert(&ReactantKey::new(reactants), temperature) {
                continue;
            }
            if balance(reactants, products).is_err() {
                continue;
            }
            if request.enforce_thermo {
                let favourable = energetics
                    .map(|e| e.reaction_energy(reactants, products, temperature))
                    .is_some_and(|energy| matches!(energy, Ok(value) if value < 0.0));
                if !favourable {
                    continue;
                }
            }
            suspected.push(SuspectedReaction {
                reactants: reactants.clone(),
                products: products.clone(),
            });
        }
    }

    let (message, known_products) = classify(&observed, &suspected);
    info!(%message, temperature, suspected = suspected.len());
    for rxn in &suspected {
        debug!(reaction = %rxn, "suspected reaction");
    }
    Ok(RetroOutcome {
        message,
        suspected,
        known_products,
        intermediates,
        inert_pairs,
    })
}

/// Compounds whose weight fraction grew, followed by newly formed ones.
/// Oxidant gases are never reported.
fn observed_products(precursors: &[Formula], initial_wts: &[f64], request: &RetroRequest) -> Vec<Formula> {
    let mut observed = Vec::new();
    for (compound, start) in precursors.iter().zip(initial_wts) {
        let grew = request
            .products
            .iter()
            .zip(&request.final_amounts)
            .any(|(p, end)| p == compound && *end > start + AMOUNT_TOLERANCE);
        if grew {
            observed.push(compound.clone());
        }
    }
    for product in &request.products {
        if !precursors.contains(product) && !observed.contains(product) {
            observed.push(product.clone());
        }
    }
    observed.retain(|c| !c.is_oxidant());
    observed
}

fn push_unique(sets: &mut Vec<Vec<Formula>>, seen: &mut BTreeSet<BTreeSet<Formula>>, set: Vec<Formula>) {
    let key: BTreeSet<Formula> = set.iter().cloned().collect();
    if seen.insert(key) {
        sets.push(set);
    }
}

fn gas_variants() -> [Vec<Formula>; 3] {
    [
        vec![Formula::o2()],
        vec![Formula::co2()],
        vec![Formula::o2(), Formula::co2()],
    ]
}

/// Singletons and pairs drawn from precursors and observed products,
/// optionally with O2/CO2 uptake.
fn candidate_reactant_sets(precursors: &[Formula], observed: &[Formula], open_system: bool) -> Vec<Vec<Formula>> {
    let mut pool: Vec<Formula> = precursors.to_vec();
    for compound in observed {
        if !pool.contains(compound) {
            pool.push(compound.clone());
        }
    }
    let mut solids: Vec<Vec<Formula>> = pool.iter().map(|c| vec![c.clone()]).collect();
    solids.extend(combinations_of(&pool, 2));

    let mut sets = Vec::new();
    let mut seen = BTreeSet::new();
    for set in &solids {
        push_unique(&mut sets, &mut seen, set.clone());
    }
    if open_system {
        for set in &solids {
            for gases in gas_variants() {
                let mut with_gas = set.clone();
                with_gas.extend(gases);
                push_unique(&mut sets, &mut seen, with_gas);
            }
        }
    }
    sets
}

/// Non-empty subsets of the observed products, with optional gas release,
/// each further extended by every combination of solid byproducts.
fn candidate_product_sets(observed: &[Formula], allowed_byproducts: &[Formula]) -> Vec<Vec<Formula>> {
    let mut base = subsets(observed);
    for set in subsets(observed) {
        for gases in gas_variants() {
            let mut with_gas = set.clone();
            with_gas.extend(gases);
            base.push(with_gas);
        }
    }

    let solid_byproducts: Vec<Formula> = allowed_byproducts
        .iter()
        .filter(|b| !b.is_oxidant())
        .cloned()
        .collect();
    let mut all = base.clone();
    for set in &base {
        for extra in subsets(&solid_byproducts) {
            let mut extended = set.clone();
            extended.extend(extra);
            all.push(extended);
        }
    }

    let mut sets = Vec::new();
    let mut seen = BTreeSet::new();
    for set in all {
        push_unique(&mut sets, &mut seen, set);
    }
    sets
}

fn classify(observed: &[Formula], suspected: &[SuspectedReaction]) -> (RetroMessage, Vec<Formula>) {
    let formed: Vec<&Formula> = suspected.iter().flat_map(|rxn| &rxn.products).collect();
    let count = |compound: &Formula| formed.iter().filter(|f| **f == compound).count();

    let mystery = observed.iter().any(|c| count(c) == 0);
    let redundant: Vec<&Formula> = observed.iter().filter(|c| count(c) > 1).collect();

    let mut known = Vec::new();
    for compound in &formed {
        if compound.is_volatile() || redundant.contains(compound) || known.contains(*compound) {
            continue;
        }
        known.push((*compound).clone());
    }

    let message = if !mystery && redundant.is_empty() {
        RetroMessage::FullyDetermined
    } else if !known.is_empty() {
        RetroMessage::PartiallyDetermined
    } else {
        RetroMessage::NoneDiscovered
    };
    (message, known)
}
