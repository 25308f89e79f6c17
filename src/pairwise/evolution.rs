//! Forward prediction of a precursor set through known reactions

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::database::{KnownReaction, ReactantKey, ReactionDatabase};
use crate::composition::{join, Formula};
use crate::reactions::{combinations_of, Inventory};
use crate::{Error, Result};

/// Margin added above the highest known reaction temperature when searching
/// for the first reaction.
const FIRST_REACTION_MARGIN: i64 = 100;

/// Policy for [`pred_evolution`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionOptions {
    /// Assume reactions known at or below the lowest temperature always
    /// happen first, even when other pairs are uncharacterized.
    pub greedy: bool,
    /// Campaign temperatures; the minimum drives greedy selection and the
    /// maximum is the ceiling for any folded reaction.
    pub temperatures: Vec<i64>,
}

/// Predict the phases a precursor set evolves into.
///
/// Each step selects the known reaction with the lowest upper temperature
/// among the set's single phases and pairs. Outside greedy mode every pair
/// must be characterized first, and two known reactions tied for the lowest
/// temperature stop the prediction. A known reaction whose solids do not
/// balance on their own is applied with O2/CO2 uptake from the atmosphere.
/// Compounds with zero amount are dropped from the result.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if no temperatures are given or the
/// amounts do not match the precursors.
pub fn pred_evolution(
    precursors: &[Formula],
    amounts: &[f64],
    database: &ReactionDatabase,
    options: &EvolutionOptions,
) -> Result<Inventory> {
    let initial = Inventory::from_parts(precursors.to_vec(), amounts.to_vec())?;
    let (Some(&min_t), Some(&max_t)) = (options.temperatures.iter().min(), options.temperatures.iter().max())
    else {
        return Err(Error::InvalidInput("no temperatures given".to_string()));
    };
    if database.is_empty() {
        return Ok(initial.without_depleted());
    }

    let known = database.as_sorted_list(false);
    let ceiling = known.iter().map(|r| r.upper).max().unwrap_or(0) + FIRST_REACTION_MARGIN;

    let mut seen: Vec<BTreeSet<Formula>> = Vec::new();
    let mut current = initial.clone();
    let mut result = initial;
    loop {
        let set: BTreeSet<Formula> = current.compounds().iter().cloned().collect();
        if seen.contains(&set) {
            warn!(compounds = %join(&set), "cyclic reaction encountered");
            break;
        }
        seen.push(set);
        result = current.clone();

        let Some(first) = select_first_reaction(current.compounds(), &known, options.greedy, min_t, ceiling)
        else {
            break;
        };
        if first.upper > max_t {
            break;
        }
        let Some(next) = super::fold_known_reaction(&current, first)? else {
            break;
        };
        debug!(
            reactants = %first.reactants,
            products = %join(&first.product_list()),
            upper = first.upper,
            "predicted reaction"
        );
        current = next;
    }
    Ok(result.without_depleted())
}

/// First reaction expected to happen in `compounds`, or `None` if the set
/// is not fully characterized or the lowest temperature is degenerate.
fn select_first_reaction<'a>(
    compounds: &[Formula],
    known: &'a [KnownReaction],
    greedy: bool,
    min_t: i64,
    ceiling: i64,
) -> Option<&'a KnownReaction> {
    let mut candidates: Vec<ReactantKey> = compounds
        .iter()
        .map(|c| ReactantKey::new(std::iter::once(c)))
        .collect();
    candidates.extend(
        combinations_of(compounds, 2)
            .iter()
            .map(|pair| ReactantKey::new(pair)),
    );

    let mut all_known = true;
    let mut degenerate = false;
    let mut first: Option<&KnownReaction> = None;
    let mut lowest = ceiling;
    for key in &candidates {
        let Some(rxn) = known.iter().find(|r| r.reactants == *key) else {
            // Single-phase reactions are optional; uncharacterized pairs are not
            if key.len() > 1 {
                all_known = false;
            }
            continue;
        };
        if rxn.products.is_none() {
            continue;
        }
        if rxn.upper < lowest {
            lowest = rxn.upper;
            first = Some(rxn);
            degenerate = false;
        } else if rxn.upper == lowest {
            degenerate = true;
        }
    }

    let first = first?;
    let greedy_hit = greedy && first.upper <= min_t;
    if (all_known || greedy_hit) && !degenerate {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formulas(list: &[&str]) -> Vec<Formula> {
        Formula::parse_all(list).unwrap()
    }

    fn record(db: &mut ReactionDatabase, reactants: &[&str], products: &[&str], temperature: i64) {
        db.record_reaction(
            ReactantKey::new(&formulas(reactants)),
            formulas(products).into_iter().collect(),
            temperature,
        );
    }

    fn options(greedy: bool, temperatures: &[i64]) -> EvolutionOptions {
        EvolutionOptions {
            greedy,
            temperatures: temperatures.to_vec(),
        }
    }

    #[test]
    fn test_empty_database_returns_input() {
        let out = pred_evolution(
            &formulas(&["BaO", "CuO"]),
            &[1.0, 1.0],
            &ReactionDatabase::new(),
            &options(false, &[700]),
        )
        .unwrap();
        assert_eq!(out.compounds(), formulas(&["BaO", "CuO"]).as_slice());
    }

    #[test]
    fn test_pair_fully_transferred() {
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Li2O", "Ta2O5"], &["LiTaO3"], 700);
        let out = pred_evolution(&formulas(&["Li2O", "Ta2O5"]), &[0.5, 0.5], &db, &options(false, &[700])).unwrap();
        assert_eq!(out.compounds(), formulas(&["LiTaO3"]).as_slice());
        assert_eq!(out.amounts(), &[1.0]);
    }

    #[test]
    fn test_uncharacterized_pair_blocks_prediction() {
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Li2O", "Ta2O5"], &["LiTaO3"], 700);
        let start = formulas(&["Li2O", "Ta2O5", "BaO"]);
        let out = pred_evolution(&start, &[0.5, 0.5, 0.5], &db, &options(false, &[700])).unwrap();
        assert_eq!(out.compounds(), start.as_slice());
    }

    #[test]
    fn test_greedy_ignores_uncharacterized_pairs() {
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Li2O", "Ta2O5"], &["LiTaO3"], 700);
        let start = formulas(&["Li2O", "Ta2O5", "BaO"]);
        let out = pred_evolution(&start, &[0.5, 0.5, 0.5], &db, &options(true, &[700, 900])).unwrap();
        assert_eq!(out.compounds(), formulas(&["LiTaO3", "BaO"]).as_slice());
        assert_eq!(out.amounts(), &[1.0, 0.5]);
    }

    #[test]
    fn test_degenerate_temperatures_stop() {
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Li2O", "Ta2O5"], &["LiTaO3"], 700);
        record(&mut db, &["Li2O", "Nb2O5"], &["LiNbO3"], 700);
        db.record_inert(&ReactantKey::new(&formulas(&["Ta2O5", "Nb2O5"])), 700);
        let start = formulas(&["Li2O", "Ta2O5", "Nb2O5"]);
        let out = pred_evolution(&start, &[1.0, 0.5, 0.5], &db, &options(false, &[700])).unwrap();
        assert_eq!(out.compounds(), start.as_slice());
    }

    #[test]
    fn test_greedy_tie_at_lowest_temperature_stops() {
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Li2O", "Ta2O5"], &["LiTaO3"], 700);
        record(&mut db, &["Li2O", "Nb2O5"], &["LiNbO3"], 700);
        let start = formulas(&["Li2O", "Ta2O5", "Nb2O5"]);
        let out = pred_evolution(&start, &[1.0, 0.5, 0.5], &db, &options(true, &[700, 900])).unwrap();
        assert_eq!(out.compounds(), start.as_slice());

        // Breaking the tie lets the greedy step through
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Li2O", "Ta2O5"], &["LiTaO3"], 700);
        record(&mut db, &["Li2O", "Nb2O5"], &["LiNbO3"], 600);
        let out = pred_evolution(&start, &[1.0, 0.5, 0.5], &db, &options(true, &[600, 900])).unwrap();
        assert_eq!(out.compounds(), formulas(&["Li2O", "LiNbO3", "Ta2O5"]).as_slice());
        assert_eq!(out.amount(&Formula::parse("LiNbO3").unwrap()), Some(1.0));
    }

    #[test]
    fn test_known_reaction_with_oxygen_uptake() {
        // 2 BaO + Cu2O + 1/2 O2 -> 2 BaCuO2
        let mut db = ReactionDatabase::new();
        record(&mut db, &["BaO", "Cu2O"], &["BaCuO2"], 700);
        let out = pred_evolution(&formulas(&["BaO", "Cu2O"]), &[2.0, 2.0], &db, &options(false, &[700])).unwrap();
        assert_eq!(out.compounds(), formulas(&["Cu2O", "BaCuO2"]).as_slice());
        assert_eq!(out.amounts(), &[1.0, 2.0]);
    }

    #[test]
    fn test_reaction_above_ceiling_is_not_applied() {
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Li2O", "Ta2O5"], &["LiTaO3"], 900);
        let start = formulas(&["Li2O", "Ta2O5"]);
        let out = pred_evolution(&start, &[0.5, 0.5], &db, &options(false, &[600, 700])).unwrap();
        assert_eq!(out.compounds(), start.as_slice());
    }

    #[test]
    fn test_cycle_guard() {
        let mut db = ReactionDatabase::new();
        record(&mut db, &["Cu2O"], &["CuO"], 600);
        record(&mut db, &["CuO"], &["Cu2O", "O2"], 600);
        let out = pred_evolution(&formulas(&["Cu2O"]), &[1.0], &db, &options(false, &[600])).unwrap();
        assert_eq!(out.compounds(), formulas(&["CuO"]).as_slice());
        assert_eq!(out.amounts(), &[2.0]);
    }

    #[test]
    fn test_requires_temperatures() {
        let err = pred_evolution(&formulas(&["CuO"]), &[1.0], &ReactionDatabase::new(), &options(false, &[]));
        assert!(err.is_err());
    }
}
