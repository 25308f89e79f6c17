//! Experimental outcome oracle
//!
//! A campaign asks an [`OutcomeOracle`] what a precursor set turns into at a
//! given temperature. [`ExperimentalDataset`] answers from a JSON document of
//! recorded syntheses:
//!
//! ```json
//! {"Universal File": {
//!     "BaO2, CuO": {"Temperatures": {
//!         "900 C": {"products": ["BaCuO2_63"], "product weight fractions": [100.0]}
//!     }}
//! }}
//! ```
//!
//! Formulas are canonicalized and weight fractions validated once, at load
//! time; lookups never modify the dataset.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;

use crate::composition::Formula;
use crate::{Error, Result};

/// What is known about one (precursor set, temperature) combination.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Not yet synthesized; the campaign should suggest this experiment.
    Unobserved,
    /// Phases identified after heating
    Observed {
        /// Canonical product formulas
        products: Vec<Formula>,
        /// Weight fractions aligned with `products`, summing to 1
        weight_fractions: Vec<f64>,
    },
}

impl Observation {
    /// True for [`Observation::Unobserved`].
    #[must_use]
    pub const fn is_unobserved(&self) -> bool {
        matches!(self, Self::Unobserved)
    }

    /// True if the outcome is exactly one phase equal to `target`.
    #[must_use]
    pub fn is_phase_pure(&self, target: &Formula) -> bool {
        match self {
            Self::Observed { products, .. } => products.len() == 1 && products[0] == *target,
            Self::Unobserved => false,
        }
    }
}

/// Source of experimental outcomes.
pub trait OutcomeOracle {
    /// Outcome of heating `precursors` to `temperature`.
    ///
    /// # Errors
    ///
    /// Implementations backed by live instruments may fail; a missing
    /// measurement is [`Observation::Unobserved`], not an error.
    fn products(&self, precursors: &[Formula], temperature: i64) -> Result<Observation>;
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    #[serde(rename = "Universal File")]
    universal: BTreeMap<String, RawPrecursorEntry>,
}

#[derive(Debug, Deserialize)]
struct RawPrecursorEntry {
    #[serde(rename = "Temperatures", default)]
    temperatures: BTreeMap<String, RawMeasurement>,
}

#[derive(Debug, Deserialize)]
struct RawMeasurement {
    products: Vec<String>,
    #[serde(rename = "product weight fractions")]
    weight_fractions: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Measurement {
    products: Vec<Formula>,
    weight_fractions: Vec<f64>,
}

/// Recorded syntheses keyed by canonical precursor set and temperature.
#[derive(Debug, Clone, Default)]
pub struct ExperimentalDataset {
    entries: FxHashMap<Vec<Formula>, BTreeMap<i64, Measurement>>,
}

fn precursor_key(precursors: &[Formula]) -> Vec<Formula> {
    precursors
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Drop a `_spacegroup` suffix and canonicalize.
fn parse_phase(label: &str) -> Result<Formula> {
    let formula = label.split('_').next().unwrap_or(label);
    Formula::parse(formula)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_temperature(label: &str) -> Result<i64> {
    let number = label.trim().trim_end_matches('C').trim();
    number
        .parse::<i64>()
        .or_else(|_| number.parse::<f64>().map(|t| t.round() as i64))
        .map_err(|_| Error::InvalidInput(format!("invalid temperature key '{label}'")))
}

/// Normalize weight fractions to sum to 1.
///
/// Accepts totals of 100 ± 5, or 1 ± 0.01 (treated as already normalized).
///
/// # Errors
///
/// Returns [`Error::WeightFractions`] for any other total.
pub fn normalize_weight_fractions(values: &[f64]) -> Result<Vec<f64>> {
    let sum: f64 = values.iter().sum();
    let percent: Vec<f64> = if (sum - 1.0).abs() <= 0.01 {
        values.iter().map(|v| v * 100.0).collect()
    } else {
        values.to_vec()
    };
    let total: f64 = percent.iter().sum();
    if (total - 100.0).abs() > 5.0 {
        return Err(Error::WeightFractions { sum: total });
    }
    Ok(percent.into_iter().map(|v| v / 100.0).collect())
}

impl ExperimentalDataset {
    /// Empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one measurement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on length mismatch and
    /// [`Error::WeightFractions`] if the fractions do not sum to 1 or 100.
    pub fn insert(
        &mut self,
        precursors: &[Formula],
        temperature: i64,
        products: Vec<Formula>,
        weight_fractions: &[f64],
    ) -> Result<()> {
        if products.len() != weight_fractions.len() {
            return Err(Error::InvalidInput(format!(
                "{} products but {} weight fractions",
                products.len(),
                weight_fractions.len()
            )));
        }
        let weight_fractions = normalize_weight_fractions(weight_fractions)?;
        self.entries.entry(precursor_key(precursors)).or_default().insert(
            temperature,
            Measurement {
                products,
                weight_fractions,
            },
        );
        Ok(())
    }

    /// Parse a dataset document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON, [`Error::InvalidFormula`]
    /// for unparseable phases, and [`Error::WeightFractions`] for bad totals.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawDataset = serde_json::from_str(json)?;
        let mut dataset = Self::new();
        for (key, entry) in raw.universal {
            let precursors = key
                .split(',')
                .map(|s| Formula::parse(s.trim()))
                .collect::<Result<Vec<_>>>()?;
            for (label, measurement) in entry.temperatures {
                let temperature = parse_temperature(&label)?;
                let products = measurement
                    .products
                    .iter()
                    .map(|p| parse_phase(p))
                    .collect::<Result<Vec<_>>>()?;
                dataset.insert(&precursors, temperature, products, &measurement.weight_fractions)?;
            }
        }
        debug!(precursor_sets = dataset.entries.len(), "loaded experimental dataset");
        Ok(dataset)
    }

    /// Read a dataset file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or any parse error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Number of recorded precursor sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OutcomeOracle for ExperimentalDataset {
    fn products(&self, precursors: &[Formula], temperature: i64) -> Result<Observation> {
        let observation = self
            .entries
            .get(&precursor_key(precursors))
            .and_then(|by_temperature| by_temperature.get(&temperature))
            .map_or(Observation::Unobserved, |m| Observation::Observed {
                products: m.products.clone(),
                weight_fractions: m.weight_fractions.clone(),
            });
        Ok(observation)
    }
}
