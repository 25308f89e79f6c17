//! Campaign configuration
//!
//! [`CampaignSettings`] mirrors the `Settings.json` file written by whoever
//! sets up a campaign; [`CampaignSettings::validate`] turns it into a
//! [`CampaignConfig`] with canonical formulas. Run-time switches that come
//! from the command line live in [`CampaignFlags`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::composition::Formula;
use crate::reactions::Atmosphere;
use crate::{Error, Result};

/// Accept either a JSON boolean or the strings `"True"` / `"False"`.
fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(serde::de::Error::custom(format!("expected a boolean, got '{text}'"))),
        },
    }
}

const fn default_open_system() -> bool {
    true
}

/// Raw campaign settings as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSettings {
    /// Available precursor formulas
    #[serde(rename = "Precursors")]
    pub precursors: Vec<String>,
    /// Target phase
    #[serde(rename = "Target")]
    pub target: String,
    /// Phases tolerated next to the target
    #[serde(rename = "Allowed Byproducts", default)]
    pub allowed_byproducts: Vec<String>,
    /// Temperatures to test (°C)
    #[serde(rename = "Temperatures")]
    pub temperatures: Vec<i64>,
    /// Allow O2/CO2 exchange with the atmosphere during reactions
    #[serde(rename = "Open System", default = "default_open_system", deserialize_with = "flag")]
    pub open_system: bool,
    /// Treat O2 and CO2 as available precursors
    #[serde(rename = "Allow Oxidation", default, deserialize_with = "flag")]
    pub allow_oxidation: bool,
    /// Furnace atmosphere
    #[serde(rename = "Atmosphere", default)]
    pub atmosphere: Atmosphere,
}

impl CampaignSettings {
    /// Parse settings JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Canonicalize formulas and check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty precursor or temperature
    /// lists and [`Error::InvalidFormula`] for unparseable formulas.
    pub fn validate(&self) -> Result<CampaignConfig> {
        if self.precursors.is_empty() {
            return Err(Error::InvalidInput("no precursors given".to_string()));
        }
        if self.temperatures.is_empty() {
            return Err(Error::InvalidInput("no temperatures given".to_string()));
        }
        if let Some(t) = self.temperatures.iter().find(|t| **t <= 0) {
            return Err(Error::InvalidInput(format!("temperature must be positive, got {t}")));
        }
        let mut temperatures = self.temperatures.clone();
        temperatures.sort_unstable();
        temperatures.dedup();

        Ok(CampaignConfig {
            precursors: Formula::parse_all(&self.precursors)?,
            target: Formula::parse(&self.target)?,
            allowed_byproducts: Formula::parse_all(&self.allowed_byproducts)?,
            temperatures,
            open_system: self.open_system,
            allow_oxidation: self.allow_oxidation,
            atmosphere: self.atmosphere,
        })
    }
}

/// Validated campaign configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignConfig {
    /// Available precursors
    pub precursors: Vec<Formula>,
    /// Target phase
    pub target: Formula,
    /// Tolerated byproducts
    pub allowed_byproducts: Vec<Formula>,
    /// Temperatures in ascending order, deduplicated
    pub temperatures: Vec<i64>,
    /// Allow O2/CO2 exchange during reactions
    pub open_system: bool,
    /// Treat O2/CO2 as precursors
    pub allow_oxidation: bool,
    /// Furnace atmosphere
    pub atmosphere: Atmosphere,
}

impl CampaignConfig {
    /// Precursors available for enumeration, including O2 and CO2 when
    /// oxidation is allowed.
    #[must_use]
    pub fn available_precursors(&self) -> Vec<Formula> {
        let mut available = self.precursors.clone();
        if self.allow_oxidation {
            for gas in [Formula::o2(), Formula::co2()] {
                if !available.contains(&gas) {
                    available.push(gas);
                }
            }
        }
        available
    }

    /// Lowest campaign temperature.
    #[must_use]
    pub fn min_temperature(&self) -> i64 {
        self.temperatures.first().copied().unwrap_or_default()
    }

    /// Highest campaign temperature.
    #[must_use]
    pub fn max_temperature(&self) -> i64 {
        self.temperatures.last().copied().unwrap_or_default()
    }
}

/// Run-time switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignFlags {
    /// Prioritize new interfaces over driving force
    pub explore: bool,
    /// Keep going after a phase-pure target is obtained
    pub all: bool,
    /// Only accept thermodynamically favourable pairwise reactions
    pub enforce_thermo: bool,
    /// Assume low-temperature reactions always happen first
    pub greedy: bool,
    /// Rank impure outcomes by their target yield
    pub reward_partial_yield: bool,
    /// Number of experiments suggested at once
    pub batch_size: usize,
}

impl Default for CampaignFlags {
    fn default() -> Self {
        Self {
            explore: false,
            all: false,
            enforce_thermo: false,
            greedy: false,
            reward_partial_yield: false,
            batch_size: 1,
        }
    }
}
