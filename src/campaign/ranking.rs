//! Precursor-set ranking
//!
//! Candidates start out ordered by the driving force to form the target (or
//! by the number of untested interfaces when exploring). As the reaction
//! database grows, each candidate is evolved through the known reactions and
//! re-scored on expected yield first.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::search::PrecursorSet;
use crate::composition::{join, Formula};
use crate::pairwise::{pred_evolution, EvolutionOptions, ReactantKey, ReactionDatabase};
use crate::reactions::{combinations_of, Energetics};
use crate::{Error, Result};

/// Header of the candidate table.
pub const CANDIDATE_HEADER: &str = "Precursors,Amounts,Products,Reaction energy (meV/atom)";

/// Default candidate table file name.
pub const DEFAULT_CANDIDATE_FILE: &str = "Rxn_TD.csv";

/// Ranking priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingMode {
    /// Most favourable driving force first
    #[default]
    Exploit,
    /// Most untested interfaces first
    Explore,
}

impl RankingMode {
    /// Explore if `explore` is set.
    #[must_use]
    pub const fn from_explore(explore: bool) -> Self {
        if explore {
            Self::Explore
        } else {
            Self::Exploit
        }
    }
}

/// One precursor set under consideration.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Precursors as loaded
    pub original_set: Vec<Formula>,
    /// Amounts as loaded
    pub original_amounts: Vec<f64>,
    /// Predicted phases after known reactions
    pub current_set: Vec<Formula>,
    /// Amounts of the predicted phases
    pub current_amounts: Vec<f64>,
    /// Expected products of the remaining reaction
    pub products: Vec<Formula>,
    /// Expected amount of target formed by known reactions
    pub expected_yield: f64,
    /// Pairs of current phases with no recorded reaction
    pub interfaces: Vec<ReactantKey>,
    /// Driving force (meV/atom) of the remaining reaction
    pub energy: f64,
}

impl Candidate {
    /// Fresh candidate: every precursor pair is an untested interface.
    #[must_use]
    pub fn new(precursors: Vec<Formula>, amounts: Vec<f64>, products: Vec<Formula>, energy: f64) -> Self {
        let interfaces = pair_keys(&precursors);
        Self {
            current_set: precursors.clone(),
            current_amounts: amounts.clone(),
            original_set: precursors,
            original_amounts: amounts,
            products,
            expected_yield: 0.0,
            interfaces,
            energy,
        }
    }

    /// Candidate for an enumerated precursor set.
    #[must_use]
    pub fn from_precursor_set(set: PrecursorSet, energy: f64) -> Self {
        Self::new(set.precursors, set.amounts, set.products, energy)
    }

    /// Number of untested interfaces.
    #[must_use]
    pub fn num_interfaces(&self) -> usize {
        self.interfaces.len()
    }
}

fn pair_keys(formulas: &[Formula]) -> Vec<ReactantKey> {
    combinations_of(formulas, 2)
        .iter()
        .map(|pair| ReactantKey::new(pair))
        .collect()
}

/// Order before any experiment: exploit by energy then interfaces, explore
/// by interfaces then energy.
pub fn rank_initial(candidates: &mut [Candidate], mode: RankingMode) {
    candidates.sort_by(|a, b| match mode {
        RankingMode::Exploit => a
            .energy
            .total_cmp(&b.energy)
            .then_with(|| b.num_interfaces().cmp(&a.num_interfaces())),
        RankingMode::Explore => b
            .num_interfaces()
            .cmp(&a.num_interfaces())
            .then_with(|| a.energy.total_cmp(&b.energy)),
    });
}

fn compare_evolved(a: &Candidate, b: &Candidate, mode: RankingMode) -> Ordering {
    let by_yield = b.expected_yield.total_cmp(&a.expected_yield);
    match mode {
        RankingMode::Exploit => by_yield
            .then_with(|| a.energy.total_cmp(&b.energy))
            .then_with(|| b.num_interfaces().cmp(&a.num_interfaces())),
        RankingMode::Explore => by_yield
            .then_with(|| b.num_interfaces().cmp(&a.num_interfaces()))
            .then_with(|| a.energy.total_cmp(&b.energy)),
    }
}

/// Everything [`update_ranking`] needs besides the database.
#[derive(Debug)]
pub struct RankingContext<'a> {
    /// Target phase
    pub target: &'a Formula,
    /// Tolerated byproducts
    pub allowed_byproducts: &'a [Formula],
    /// Allow gas exchange when computing driving forces
    pub open_system: bool,
    /// Evolution policy
    pub evolution: EvolutionOptions,
    /// Count impure yields instead of zeroing them
    pub reward_partial_yield: bool,
    /// Ranking priority
    pub mode: RankingMode,
    /// Energetics for recomputing driving forces
    pub energetics: Option<&'a Energetics<'a>>,
}

impl RankingContext<'_> {
    fn min_temperature(&self) -> i64 {
        self.evolution.temperatures.iter().min().copied().unwrap_or_default()
    }
}

/// Evolve every candidate through the database and re-sort.
///
/// Candidates whose evolved phases can no longer balance to the target are
/// dropped. Without an energetics handle, a candidate that changed but did
/// not reach the target keeps its previous driving force.
///
/// # Errors
///
/// Propagates evolution errors (mismatched amounts, missing temperatures).
pub fn update_ranking(
    database: &ReactionDatabase,
    candidates: Vec<Candidate>,
    ctx: &RankingContext<'_>,
) -> Result<Vec<Candidate>> {
    let mut evolved = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let inventory = pred_evolution(
            &candidate.current_set,
            &candidate.current_amounts,
            database,
            &ctx.evolution,
        )?;
        let same_phases = inventory.len() == candidate.current_set.len()
            && inventory.compounds().iter().all(|c| candidate.current_set.contains(c));
        if same_phases {
            evolved.push(candidate);
            continue;
        }
        debug!(
            from = %join(&candidate.current_set),
            to = %join(inventory.compounds()),
            "predicted evolution"
        );

        let (new_set, new_amounts) = inventory.into_parts();
        let mut next = Candidate {
            interfaces: pair_keys(&new_set)
                .into_iter()
                .filter(|key| !database.contains(key))
                .collect(),
            current_set: new_set,
            current_amounts: new_amounts,
            ..candidate
        };

        let target_amount = next
            .current_set
            .iter()
            .position(|c| c == ctx.target)
            .map(|idx| next.current_amounts[idx]);
        if let Some(amount) = target_amount {
            #[allow(clippy::float_cmp)]
            let pure = amount == 1.0;
            next.expected_yield = if ctx.reward_partial_yield || pure { amount } else { 0.0 };
            next.products = vec![ctx.target.clone()];
            next.energy = 0.0;
        } else {
            next.expected_yield = 0.0;
            if let Some(energetics) = ctx.energetics {
                match energetics.driving_force(
                    &next.current_set,
                    &next.current_amounts,
                    std::slice::from_ref(ctx.target),
                    ctx.allowed_byproducts,
                    ctx.open_system,
                    ctx.min_temperature(),
                ) {
                    Ok((products, energy)) => {
                        next.products = products;
                        next.energy = energy;
                    }
                    Err(err) => {
                        warn!(precursors = %join(&next.original_set), %err, "dropping candidate");
                        continue;
                    }
                }
            }
        }
        evolved.push(next);
    }

    evolved.sort_by(|a, b| compare_evolved(a, b, ctx.mode));
    if let Some(top) = evolved.first() {
        info!(precursors = %join(&top.original_set), "top ranked candidate");
    }
    Ok(evolved)
}

fn parse_list<T>(field: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    field.split(" + ").map(|s| parse(s.trim())).collect()
}

/// Parse a candidate table and rank it with [`rank_initial`].
///
/// # Errors
///
/// Returns [`Error::StorageError`] on malformed rows.
pub fn load_candidates_str(text: &str, mode: RankingMode) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for (number, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |what: &str| Error::StorageError(format!("line {}: {what}", number + 1));
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [precursors, amounts, products, energy] = fields.as_slice() else {
            return Err(malformed("expected 4 fields"));
        };
        let precursors = parse_list(precursors, Formula::parse)?;
        let amounts = parse_list(amounts, |s| s.parse::<f64>().map_err(|_| malformed("bad amount")))?;
        if precursors.len() != amounts.len() {
            return Err(malformed("precursor and amount counts differ"));
        }
        let products = parse_list(products, Formula::parse)?;
        let energy = energy.parse::<f64>().map_err(|_| malformed("bad energy"))?;
        candidates.push(Candidate::new(precursors, amounts, products, energy));
    }
    rank_initial(&mut candidates, mode);
    Ok(candidates)
}

/// Read and rank a candidate table file.
///
/// # Errors
///
/// Returns [`Error::Io`] or a parse error.
pub fn load_candidates(path: impl AsRef<Path>, mode: RankingMode) -> Result<Vec<Candidate>> {
    load_candidates_str(&fs::read_to_string(path)?, mode)
}

/// Render candidates as a table readable by [`load_candidates_str`].
#[must_use]
pub fn candidates_to_csv(candidates: &[Candidate]) -> String {
    let mut out = String::from(CANDIDATE_HEADER);
    out.push('\n');
    for candidate in candidates {
        let amounts: Vec<String> = candidate.original_amounts.iter().map(f64::to_string).collect();
        let _ = writeln!(
            out,
            "{},{},{},{}",
            join(&candidate.original_set),
            amounts.join(" + "),
            join(&candidate.products),
            candidate.energy
        );
    }
    out
}
