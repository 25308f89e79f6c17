//! Tabular persistence for [`ReactionDatabase`]
//!
//! One row per report:
//!
//! ```text
//! Pairwise reactants,Pairwise Products,Temperature Range
//! BaO2 + CuO, BaCuO2 + O2, Reacts between 600-900 C
//! BaO + Y2O3, None, Does not react at or below 700 C
//! CuO + Y2O3, CuYO2 + O2, Reacts below 1000 C
//! ```
//!
//! Reports loaded from disk are [`Scope::Global`].

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::info;

use super::database::{ReactantKey, ReactionDatabase, Report, Scope, TemperatureBounds, MAX_TEMPERATURE};
use crate::composition::{join, Formula};
use crate::{Error, Result};

/// Header row of the saved table.
pub const HEADER: &str = "Pairwise reactants,Pairwise Products,Temperature Range";

/// Default file name used by campaigns.
pub const DEFAULT_FILE: &str = "PairwiseRxns.csv";

fn describe_bounds(bounds: TemperatureBounds) -> String {
    let TemperatureBounds { lower, upper } = bounds;
    if lower > 0 && upper < MAX_TEMPERATURE {
        format!("Reacts between {lower}-{upper} C")
    } else if lower > 0 {
        format!("Does not react at or below {lower} C")
    } else {
        format!("Reacts below {upper} C")
    }
}

fn parse_bounds(text: &str) -> Result<TemperatureBounds> {
    let malformed = || Error::StorageError(format!("malformed temperature range '{text}'"));
    let value = text
        .split_whitespace()
        .rev()
        .nth(1)
        .ok_or_else(malformed)?;
    let number = |s: &str| s.parse::<i64>().map_err(|_| malformed());

    if text.starts_with("Reacts between") {
        let (lower, upper) = value.split_once('-').ok_or_else(malformed)?;
        Ok(TemperatureBounds::new(number(lower)?, number(upper)?))
    } else if text.starts_with("Reacts below") {
        Ok(TemperatureBounds::new(0, number(value)?))
    } else if text.starts_with("Does not react") {
        Ok(TemperatureBounds::new(number(value)?, MAX_TEMPERATURE))
    } else {
        Err(malformed())
    }
}

fn parse_formulas(text: &str) -> Result<Vec<Formula>> {
    text.split(" + ").map(|s| Formula::parse(s.trim())).collect()
}

impl ReactionDatabase {
    /// Render the database as a table.
    #[must_use]
    pub fn to_csv_string(&self) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        for key in self.keys() {
            for report in self.reports(key).unwrap_or_default() {
                let products = report
                    .products
                    .as_ref()
                    .map_or_else(|| "None".to_string(), |p| join(p));
                out.push_str(&format!("{key}, {products}, {}\n", describe_bounds(report.bounds)));
            }
        }
        out
    }

    /// Parse a table produced by [`to_csv_string`](Self::to_csv_string).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] on malformed rows and
    /// [`Error::InvalidFormula`] on unparseable compounds.
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut database = Self::new();
        for (number, line) in text.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [reactants, products, range] = fields.as_slice() else {
                return Err(Error::StorageError(format!(
                    "line {}: expected 3 fields, found {}",
                    number + 1,
                    fields.len()
                )));
            };
            let reactants = parse_formulas(reactants)?;
            let products = if *products == "None" {
                None
            } else {
                Some(parse_formulas(products)?.into_iter().collect::<BTreeSet<_>>())
            };
            database.push_report(
                ReactantKey::new(&reactants),
                Report {
                    products,
                    bounds: parse_bounds(range)?,
                    scope: Scope::Global,
                },
            );
        }
        Ok(database)
    }

    /// Write the table to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path.as_ref(), self.to_csv_string())?;
        info!(path = %path.as_ref().display(), keys = self.len(), "saved reaction database");
        Ok(())
    }

    /// Read a table from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or a parse error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let database = Self::from_csv_str(&text)?;
        info!(path = %path.as_ref().display(), keys = database.len(), "loaded reaction database");
        Ok(database)
    }
}
