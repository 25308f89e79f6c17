//! Temperature-indexed pairwise reaction database
//!
//! Each reactant key (a pair of solids, or a single solid for decomposition)
//! holds a list of reports. A report is either
//!
//! - **Unknown**: the key does not react at or below `lower` (`upper` = 2000);
//! - **Known**: the key reacts to `products` somewhere in `(lower, upper]`.
//!
//! Inert bounds are strict and reaction bounds are closed, so every report
//! satisfies `lower < upper`.

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::retro::{RetroMessage, RetroOutcome};
use crate::composition::{join, Formula};

/// Hard upper limit on every reaction temperature (°C).
pub const MAX_TEMPERATURE: i64 = 2000;

/// Order-independent reactant key: sorted, deduplicated solid formulas.
///
/// O2 and CO2 are never part of a key; a reaction with gas uptake is stored
/// under its solid reactants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReactantKey(Vec<Formula>);

impl ReactantKey {
    /// Build a key, dropping oxidant gases.
    pub fn new<'a>(formulas: impl IntoIterator<Item = &'a Formula>) -> Self {
        let set: BTreeSet<Formula> = formulas
            .into_iter()
            .filter(|f| !f.is_oxidant())
            .cloned()
            .collect();
        Self(set.into_iter().collect())
    }

    /// Member formulas in sorted order.
    #[must_use]
    pub fn formulas(&self) -> &[Formula] {
        &self.0
    }

    /// Number of solids in the key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the key has no solids (pure gas reaction).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if every member of the key is in `set`.
    #[must_use]
    pub fn is_subset_of(&self, set: &[Formula]) -> bool {
        self.0.iter().all(|f| set.contains(f))
    }
}

impl fmt::Display for ReactantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.0))
    }
}

/// Validity scope of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Observed in the precursor set currently under study
    Local,
    /// Carried over from a previous precursor set
    Global,
}

/// Temperature window `(lower, upper]` in °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemperatureBounds {
    /// Highest temperature known not to react (strict)
    pub lower: i64,
    /// Lowest temperature known to react (closed)
    pub upper: i64,
}

impl TemperatureBounds {
    /// New window.
    #[must_use]
    pub const fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    /// True if `lower < temperature < upper`.
    #[must_use]
    pub const fn strictly_contains(&self, temperature: i64) -> bool {
        self.lower < temperature && temperature < self.upper
    }
}

/// One observation window for a reactant key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Products, or `None` while the key has not been seen to react
    pub products: Option<BTreeSet<Formula>>,
    /// Temperature window
    pub bounds: TemperatureBounds,
    /// Validity scope
    pub scope: Scope,
}

impl Report {
    /// True if the products are known.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        self.products.is_some()
    }
}

/// Flattened database entry, as returned by
/// [`ReactionDatabase::as_sorted_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownReaction {
    /// Reactant key
    pub reactants: ReactantKey,
    /// Products (None if unknown)
    pub products: Option<BTreeSet<Formula>>,
    /// Lower temperature bound
    pub lower: i64,
    /// Upper temperature bound
    pub upper: i64,
    /// Scope
    pub scope: Scope,
}

impl KnownReaction {
    /// Products as a vector, empty if unknown.
    #[must_use]
    pub fn product_list(&self) -> Vec<Formula> {
        self.products
            .as_ref()
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Pairwise reaction database owned by one campaign.
#[derive(Debug, Clone, Default)]
pub struct ReactionDatabase {
    reports: FxHashMap<ReactantKey, Vec<Report>>,
    order: Vec<ReactantKey>,
}

impl ReactionDatabase {
    /// Empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no reactant key has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of reactant keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Reactant keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> &[ReactantKey] {
        &self.order
    }

    /// True if any report exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &ReactantKey) -> bool {
        self.reports.contains_key(key)
    }

    /// Reports stored under `key`.
    #[must_use]
    pub fn reports(&self, key: &ReactantKey) -> Option<&[Report]> {
        self.reports.get(key).map(Vec::as_slice)
    }

    /// Append a report under `key`, creating the key if needed.
    pub fn push_report(&mut self, key: ReactantKey, report: Report) {
        self.entry(key).push(report);
    }

    fn entry(&mut self, key: ReactantKey) -> &mut Vec<Report> {
        if !self.reports.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.reports.entry(key).or_default()
    }

    /// Fold a retro-analysis outcome observed at `temperature` into the
    /// database. Returns true if anything changed.
    pub fn update(&mut self, outcome: &RetroOutcome, temperature: i64) -> bool {
        let mut updated = false;
        match outcome.message {
            RetroMessage::AlreadyProbed => return false,
            RetroMessage::NoReaction | RetroMessage::OnlyKnownIntermediates => {
                for key in &outcome.inert_pairs {
                    updated |= self.record_inert(key, temperature);
                }
                return updated;
            }
            _ => {}
        }

        // A pair left over from an incomplete reaction is not inert
        let reacting: Vec<ReactantKey> = outcome
            .suspected
            .iter()
            .map(|rxn| ReactantKey::new(&rxn.reactants))
            .collect();
        for key in &outcome.inert_pairs {
            if !reacting.contains(key) {
                updated |= self.record_inert(key, temperature);
            }
        }

        match outcome.message {
            RetroMessage::FullyDetermined => {
                for rxn in &outcome.suspected {
                    let products: BTreeSet<Formula> = rxn.products.iter().cloned().collect();
                    updated |= self.record_reaction(ReactantKey::new(&rxn.reactants), products, temperature);
                }
            }
            RetroMessage::PartiallyDetermined => {
                for rxn in &outcome.suspected {
                    if !rxn.products.iter().any(|p| outcome.known_products.contains(p)) {
                        continue;
                    }
                    let products: BTreeSet<Formula> = rxn.products.iter().cloned().collect();
                    updated |= self.record_reaction(ReactantKey::new(&rxn.reactants), products, temperature);
                }
            }
            _ => {}
        }
        updated
    }

    /// Record that `key` did not react at `temperature`.
    pub fn record_inert(&mut self, key: &ReactantKey, temperature: i64) -> bool {
        if let Some(reports) = self.reports.get_mut(key) {
            let mut updated = false;
            for report in reports.iter_mut() {
                if report.bounds.strictly_contains(temperature) {
                    report.bounds.lower = temperature;
                    updated = true;
                }
            }
            if updated {
                debug!(reactants = %key, temperature, "raised lower bound");
            }
            updated
        } else if temperature < MAX_TEMPERATURE {
            debug!(reactants = %key, temperature, "new inert pair");
            self.push_report(
                key.clone(),
                Report {
                    products: None,
                    bounds: TemperatureBounds::new(temperature, MAX_TEMPERATURE),
                    scope: Scope::Local,
                },
            );
            true
        } else {
            false
        }
    }

    /// Record that `key` reacts to `products` at or below `temperature`.
    pub fn record_reaction(
        &mut self,
        key: ReactantKey,
        products: BTreeSet<Formula>,
        temperature: i64,
    ) -> bool {
        if key.is_empty() || temperature <= 0 {
            return false;
        }
        let Some(reports) = self.reports.get_mut(&key) else {
            debug!(reactants = %key, products = %join(&products), temperature, "new reaction");
            self.push_report(
                key,
                Report {
                    products: Some(products),
                    bounds: TemperatureBounds::new(0, temperature),
                    scope: Scope::Local,
                },
            );
            return true;
        };

        let mut updated = false;
        let mut new_products = true;
        for report in reports.iter_mut() {
            let unknown = report.products.is_none();
            let same = report.products.as_ref() == Some(&products);
            if !unknown && !same {
                continue;
            }
            if same {
                new_products = false;
                if temperature >= report.bounds.upper {
                    continue;
                }
            }
            if report.bounds.lower < temperature {
                if unknown {
                    report.products = Some(products.clone());
                    new_products = false;
                }
                report.bounds.upper = temperature;
                report.scope = Scope::Local;
                updated = true;
            } else {
                warn!(
                    reactants = %key,
                    lower = report.bounds.lower,
                    temperature,
                    "reaction observed below known inert bound"
                );
            }
        }

        if new_products {
            let lower = reports
                .iter()
                .map(|r| if r.is_known() { r.bounds.upper } else { r.bounds.lower })
                .filter(|bound| *bound < temperature)
                .max()
                .unwrap_or(0);
            reports.push(Report {
                products: Some(products),
                bounds: TemperatureBounds::new(lower, temperature),
                scope: Scope::Local,
            });
            updated = true;
        }
        if updated {
            debug!(reactants = %key, temperature, "reaction bounds updated");
        }
        updated
    }

    /// Keys known not to react at `temperature` (every report has
    /// `lower >= temperature`).
    #[must_use]
    pub fn inert_pairs(&self, temperature: i64) -> Vec<ReactantKey> {
        self.order
            .iter()
            .filter(|key| self.is_inert(key, temperature))
            .cloned()
            .collect()
    }

    /// True if `key` is known not to react at `temperature`.
    #[must_use]
    pub fn is_inert(&self, key: &ReactantKey, temperature: i64) -> bool {
        self.reports
            .get(key)
            .is_some_and(|reports| reports.iter().all(|r| r.bounds.lower >= temperature))
    }

    /// Promote every report to [`Scope::Global`].
    pub fn make_global(&mut self) {
        for reports in self.reports.values_mut() {
            for report in reports {
                report.scope = Scope::Global;
            }
        }
    }

    /// All reports, flattened and sorted ascending by upper bound.
    ///
    /// Equal upper bounds keep insertion order. With `local_only`, global
    /// reports are omitted.
    #[must_use]
    pub fn as_sorted_list(&self, local_only: bool) -> Vec<KnownReaction> {
        let mut list: Vec<KnownReaction> = self
            .order
            .iter()
            .flat_map(|key| {
                self.reports[key].iter().map(move |report| KnownReaction {
                    reactants: key.clone(),
                    products: report.products.clone(),
                    lower: report.bounds.lower,
                    upper: report.bounds.upper,
                    scope: report.scope,
                })
            })
            .filter(|rxn| !local_only || rxn.scope == Scope::Local)
            .collect();
        list.sort_by_key(|rxn| rxn.upper);
        list
    }

    /// Human-readable listing, one line per report.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::from("Known reactions:\n");
        for key in &self.order {
            for report in &self.reports[key] {
                let products = report
                    .products
                    .as_ref()
                    .map_or_else(|| "Unknown".to_string(), |p| join(p));
                out.push_str(&format!(
                    "{key} == {products} @ {}-{} C\n",
                    report.bounds.lower, report.bounds.upper
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(s: &str) -> Formula {
        Formula::parse(s).unwrap()
    }

    fn key(list: &[&str]) -> ReactantKey {
        let formulas = Formula::parse_all(list).unwrap();
        ReactantKey::new(&formulas)
    }

    fn products(list: &[&str]) -> BTreeSet<Formula> {
        list.iter().map(|s| f(s)).collect()
    }

    #[test]
    fn test_key_is_order_independent() {
        assert_eq!(key(&["CuO", "BaO2"]), key(&["BaO2", "CuO"]));
        assert_eq!(key(&["CuO", "O2"]), key(&["CuO"]));
        assert_eq!(key(&["CuO", "BaO2"]).to_string(), "BaO2 + CuO");
    }

    #[test]
    fn test_inert_then_reactive() {
        let mut db = ReactionDatabase::new();
        assert!(db.record_inert(&key(&["BaO2", "CuO"]), 600));
        assert!(db.is_inert(&key(&["BaO2", "CuO"]), 600));
        assert!(!db.is_inert(&key(&["BaO2", "CuO"]), 700));

        assert!(db.record_reaction(key(&["BaO2", "CuO"]), products(&["BaCuO2", "O2"]), 900));
        let reports = db.reports(&key(&["BaO2", "CuO"])).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].bounds, TemperatureBounds::new(600, 900));
        assert!(reports[0].is_known());

        // Inert at 700 tightens the window from below
        assert!(db.record_inert(&key(&["BaO2", "CuO"]), 700));
        assert_eq!(db.reports(&key(&["BaO2", "CuO"])).unwrap()[0].bounds.lower, 700);
    }

    #[test]
    fn test_known_upper_only_decreases() {
        let mut db = ReactionDatabase::new();
        db.record_reaction(key(&["BaO", "CuO"]), products(&["BaCuO2"]), 900);
        assert!(!db.record_reaction(key(&["BaO", "CuO"]), products(&["BaCuO2"]), 1000));
        assert!(db.record_reaction(key(&["BaO", "CuO"]), products(&["BaCuO2"]), 800));
        assert_eq!(db.reports(&key(&["BaO", "CuO"])).unwrap()[0].bounds, TemperatureBounds::new(0, 800));
    }

    #[test]
    fn test_new_products_inherit_lower_bound() {
        let mut db = ReactionDatabase::new();
        db.record_reaction(key(&["Cu2O"]), products(&["CuO"]), 600);
        db.record_reaction(key(&["Cu2O"]), products(&["Cu", "CuO"]), 900);
        let reports = db.reports(&key(&["Cu2O"])).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].bounds, TemperatureBounds::new(600, 900));
    }

    #[test]
    fn test_unknown_above_temperature_is_not_converted() {
        let mut db = ReactionDatabase::new();
        db.record_inert(&key(&["BaO", "CuO"]), 800);
        db.record_reaction(key(&["BaO", "CuO"]), products(&["BaCuO2"]), 700);
        let reports = db.reports(&key(&["BaO", "CuO"])).unwrap();
        assert!(reports.iter().all(|r| r.bounds.lower < r.bounds.upper));
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_make_global_and_sorted_list() {
        let mut db = ReactionDatabase::new();
        db.record_reaction(key(&["BaO", "CuO"]), products(&["BaCuO2"]), 900);
        db.record_reaction(key(&["Y2O3", "CuO"]), products(&["Y2Cu2O5"]), 700);
        db.record_inert(&key(&["Y2O3", "BaO"]), 700);

        let all = db.as_sorted_list(false);
        let uppers: Vec<i64> = all.iter().map(|r| r.upper).collect();
        assert_eq!(uppers, vec![700, 900, 2000]);
        assert_eq!(db.as_sorted_list(true).len(), 3);

        db.make_global();
        assert!(db.as_sorted_list(true).is_empty());
        assert_eq!(db.as_sorted_list(false)[1].upper, 900);
    }

    #[test]
    fn test_sorted_list_ties_keep_insertion_order() {
        let mut db = ReactionDatabase::new();
        db.record_reaction(key(&["Li2O", "Ta2O5"]), products(&["LiTaO3"]), 700);
        db.record_reaction(key(&["BaO", "CuO"]), products(&["BaCuO2"]), 700);
        let list = db.as_sorted_list(false);
        assert_eq!(list[0].reactants, key(&["Li2O", "Ta2O5"]));
        assert_eq!(list[1].reactants, key(&["BaO", "CuO"]));
    }

    #[test]
    fn test_describe() {
        let mut db = ReactionDatabase::new();
        db.record_inert(&key(&["BaO2", "CuO"]), 600);
        assert!(db.describe().contains("BaO2 + CuO == Unknown @ 600-2000 C"));
    }
}
