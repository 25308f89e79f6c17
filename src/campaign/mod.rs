//! Closed-loop synthesis campaign
//!
//! A [`Campaign`] walks the ranked precursor sets from best to worst. For
//! each set it runs every campaign temperature in ascending order, asks the
//! [`OutcomeOracle`] what formed, retro-analyses the outcome into pairwise
//! reactions and, whenever the reaction database learns something new,
//! re-ranks the remaining sets. The first missing measurement ends the step
//! with a suggestion for the next experiment(s).

pub mod intermediates;
pub mod ranking;
pub mod search;

pub use intermediates::{sorted_assemblage, IntermediateRecord, KnownIntermediates, REDUNDANCY_TOLERANCE};
pub use ranking::{
    candidates_to_csv, load_candidates, load_candidates_str, rank_initial, update_ranking, Candidate,
    RankingContext, RankingMode, CANDIDATE_HEADER, DEFAULT_CANDIDATE_FILE,
};
pub use search::{precursor_sets, PrecursorSet};

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::composition::{join, weight_fractions, Formula};
use crate::config::{CampaignConfig, CampaignFlags};
use crate::experiment::{Observation, OutcomeOracle};
use crate::pairwise::{retroanalyze, EvolutionOptions, ProbedRoutes, ReactionDatabase, RetroMessage, RetroRequest};
use crate::reactions::Energetics;
use crate::Result;

/// Enumerate balanced precursor sets for the campaign target and score each
/// by its reaction energy at the highest campaign temperature.
///
/// Sets whose energy cannot be evaluated are skipped. The result is ordered
/// most favourable first.
#[must_use]
pub fn gather_candidates(config: &CampaignConfig, energetics: &Energetics<'_>) -> Vec<Candidate> {
    let targets = [config.target.clone()];
    let mut candidates: Vec<Candidate> = precursor_sets(
        &config.available_precursors(),
        &targets,
        &config.allowed_byproducts,
        None,
    )
    .into_iter()
    .filter_map(|set| {
        match energetics.reaction_energy(&set.precursors, &set.products, config.max_temperature()) {
            Ok(energy) => Some(Candidate::from_precursor_set(set, energy)),
            Err(err) => {
                warn!(precursors = %join(&set.precursors), %err, "skipping precursor set");
                None
            }
        }
    })
    .collect();
    rank_initial(&mut candidates, RankingMode::Exploit);
    info!(count = candidates.len(), target = %config.target, "gathered precursor sets");
    candidates
}

/// One experiment to run next.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Precursors to mix
    pub precursors: Vec<Formula>,
    /// Molar amounts of each precursor
    pub amounts: Vec<f64>,
    /// Temperature (°C)
    pub temperature: i64,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.precursors.iter().map(Formula::as_str).collect();
        write!(f, "Precursors: {}\nTemperature: {} C", names.join(", "), self.temperature)
    }
}

/// Result of one [`Campaign::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Measurements are missing; run these experiments and step again
    SuggestExperiments(Vec<Suggestion>),
    /// A phase-pure target was obtained
    TargetObtained {
        /// Successful precursors
        precursors: Vec<Formula>,
        /// Temperature of the pure outcome (°C)
        temperature: i64,
    },
    /// A precursor set was fully analysed; more remain
    Continue {
        /// The set just analysed
        precursors: Vec<Formula>,
        /// Whether the reaction database changed
        database_updated: bool,
    },
    /// Every precursor set has been sampled
    Exhausted,
}

impl StepOutcome {
    /// True if the campaign cannot advance without new measurements or has
    /// finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Continue { .. })
    }
}

/// State of a running campaign.
#[derive(Debug)]
pub struct Campaign<'a> {
    config: CampaignConfig,
    flags: CampaignFlags,
    database: ReactionDatabase,
    probed: ProbedRoutes,
    intermediates: KnownIntermediates,
    candidates: Vec<Candidate>,
    energetics: Option<Energetics<'a>>,
    database_path: Option<PathBuf>,
}

impl<'a> Campaign<'a> {
    /// Start a campaign over `candidates`, ranked for the configured mode.
    #[must_use]
    pub fn new(config: CampaignConfig, flags: CampaignFlags, mut candidates: Vec<Candidate>) -> Self {
        rank_initial(&mut candidates, RankingMode::from_explore(flags.explore));
        Self {
            config,
            flags,
            database: ReactionDatabase::new(),
            probed: ProbedRoutes::new(),
            intermediates: KnownIntermediates::new(),
            candidates,
            energetics: None,
            database_path: None,
        }
    }

    /// Use `energetics` for driving forces and thermodynamic filtering.
    #[must_use]
    pub fn with_energetics(mut self, energetics: Energetics<'a>) -> Self {
        self.energetics = Some(energetics);
        self
    }

    /// Save the reaction database to `path` whenever it changes.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Start from previously learned reactions and re-rank accordingly.
    ///
    /// # Errors
    ///
    /// Propagates evolution errors from re-ranking.
    pub fn with_database(mut self, database: ReactionDatabase) -> Result<Self> {
        self.database = database;
        if !self.database.is_empty() {
            self.rerank()?;
        }
        Ok(self)
    }

    /// Campaign configuration.
    #[must_use]
    pub const fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// Run-time flags.
    #[must_use]
    pub const fn flags(&self) -> &CampaignFlags {
        &self.flags
    }

    /// Reaction database learned so far.
    #[must_use]
    pub const fn database(&self) -> &ReactionDatabase {
        &self.database
    }

    /// Routes analysed so far.
    #[must_use]
    pub const fn probed(&self) -> &ProbedRoutes {
        &self.probed
    }

    /// Intermediate assemblages seen so far.
    #[must_use]
    pub const fn intermediates(&self) -> &KnownIntermediates {
        &self.intermediates
    }

    /// Remaining precursor sets, best first.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn ranking_context(&self) -> RankingContext<'_> {
        RankingContext {
            target: &self.config.target,
            allowed_byproducts: &self.config.allowed_byproducts,
            open_system: self.config.open_system,
            evolution: EvolutionOptions {
                greedy: self.flags.greedy,
                temperatures: self.config.temperatures.clone(),
            },
            reward_partial_yield: self.flags.reward_partial_yield,
            mode: RankingMode::from_explore(self.flags.explore),
            energetics: self.energetics.as_ref(),
        }
    }

    fn rerank(&mut self) -> Result<()> {
        let candidates = std::mem::take(&mut self.candidates);
        let ranked = update_ranking(&self.database, candidates, &self.ranking_context())?;
        self.candidates = ranked;
        Ok(())
    }

    fn save_database(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            self.database.save(path)?;
        }
        Ok(())
    }

    /// Whether `precursors` gave the pure target at the highest temperature.
    fn reaches_target(&self, precursors: &[Formula], oracle: &dyn OutcomeOracle) -> Result<bool> {
        let observation = oracle.products(precursors, self.config.max_temperature())?;
        Ok(observation.is_phase_pure(&self.config.target))
    }

    fn check_redundancy(
        &self,
        phases: &[Formula],
        weights: &[f64],
        precursors: &[Formula],
        oracle: &dyn OutcomeOracle,
    ) -> Result<bool> {
        if !self.intermediates.is_redundant(phases, weights) {
            return Ok(false);
        }
        let past_success = self.intermediates.get(phases).is_some_and(|r| r.success);
        if past_success && self.reaches_target(precursors, oracle)? {
            info!(precursors = %join(precursors), "redundant success");
        }
        Ok(true)
    }

    /// Suggest the first experiment plus up to `batch_size - 1` further
    /// precursor sets that have no measurement at the lowest temperature.
    fn suggest_batch(
        &self,
        first: &Candidate,
        temperature: i64,
        oracle: &dyn OutcomeOracle,
    ) -> Result<Vec<Suggestion>> {
        let mut batch = vec![Suggestion {
            precursors: first.original_set.clone(),
            amounts: first.original_amounts.clone(),
            temperature,
        }];
        let min_t = self.config.min_temperature();
        for candidate in self.candidates.iter().skip(1) {
            if batch.len() >= self.flags.batch_size {
                break;
            }
            if oracle.products(&candidate.original_set, min_t)?.is_unobserved() {
                batch.push(Suggestion {
                    precursors: candidate.original_set.clone(),
                    amounts: candidate.original_amounts.clone(),
                    temperature: min_t,
                });
            }
        }
        Ok(batch)
    }

    /// Analyse the top-ranked precursor set at every temperature.
    ///
    /// # Errors
    ///
    /// Propagates oracle errors, analysis errors (including thermodynamic
    /// filtering without an energetics handle) and database save failures.
    pub fn step(&mut self, oracle: &dyn OutcomeOracle) -> Result<StepOutcome> {
        let Some(candidate) = self.candidates.first().cloned() else {
            info!("all unique reactions sampled");
            return Ok(StepOutcome::Exhausted);
        };
        let precursors = &candidate.original_set;
        let min_t = self.config.min_temperature();

        let predicted_wts = weight_fractions(&candidate.current_set, &candidate.current_amounts)?;
        let (phases, wts) = sorted_assemblage(&candidate.current_set, &predicted_wts)?;
        let mut redundant = self.check_redundancy(&phases, &wts, precursors, oracle)?;

        let mut updated = false;
        let mut last_products: Option<(Vec<Formula>, i64)> = None;
        for temperature in self.config.temperatures.clone() {
            if redundant {
                debug!(precursors = %join(precursors), temperature, "redundant");
                continue;
            }
            let Observation::Observed { products, weight_fractions } =
                oracle.products(precursors, temperature)?
            else {
                let batch = self.suggest_batch(&candidate, temperature, oracle)?;
                return Ok(StepOutcome::SuggestExperiments(batch));
            };

            if temperature == min_t {
                let (phases, wts) = sorted_assemblage(&products, &weight_fractions)?;
                redundant = self.check_redundancy(&phases, &wts, precursors, oracle)?;
                if !redundant {
                    let success = self.reaches_target(precursors, oracle)?;
                    self.intermediates.record(phases, wts, success);
                }
            }

            let request = RetroRequest {
                precursors: precursors.clone(),
                initial_amounts: candidate.original_amounts.clone(),
                products: products.clone(),
                final_amounts: weight_fractions,
                temperature,
                allowed_byproducts: self.config.allowed_byproducts.clone(),
                open_system: self.config.open_system,
                enforce_thermo: self.flags.enforce_thermo,
            };
            let outcome = retroanalyze(&request, &self.database, &self.probed, self.energetics.as_ref())?;
            let message = outcome.message;
            if message == RetroMessage::AlreadyProbed {
                debug!(precursors = %join(precursors), temperature, "{message}");
            } else {
                self.probed
                    .record_analysis(precursors, outcome.intermediate_compounds(), &products, temperature);
                info!(precursors = %join(precursors), products = %join(&products), temperature, "{message}");
            }
            last_products = Some((products, temperature));
            if matches!(message, RetroMessage::AlreadyProbed | RetroMessage::OnlyKnownIntermediates) {
                continue;
            }

            if self.database.update(&outcome, temperature) {
                debug!(database = %self.database.describe(), "reaction database updated");
                self.save_database()?;
                updated = true;
            }
        }

        self.database.make_global();
        self.candidates.remove(0);

        if let Some((products, temperature)) = last_products {
            let pure = products.len() == 1 && products[0] == self.config.target;
            if pure && !self.flags.all {
                info!(precursors = %join(precursors), temperature, "phase pure target obtained");
                return Ok(StepOutcome::TargetObtained {
                    precursors: candidate.original_set,
                    temperature,
                });
            }
        }

        if updated {
            self.rerank()?;
        }
        Ok(StepOutcome::Continue {
            precursors: candidate.original_set,
            database_updated: updated,
        })
    }

    /// Step until the campaign needs new measurements, reaches the target,
    /// or runs out of precursor sets.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Campaign::step`].
    pub fn run(&mut self, oracle: &dyn OutcomeOracle) -> Result<StepOutcome> {
        loop {
            let outcome = self.step(oracle)?;
            if outcome.is_terminal() {
                return Ok(outcome);
            }
        }
    }
}
