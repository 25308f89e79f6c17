//! Reaction energetics on top of an external thermodynamic oracle
//!
//! Formation energies and phase-diagram hull energies come from a
//! [`ThermoOracle`]; this module only combines them with balanced
//! coefficients. Energies returned by the oracle are eV/atom, reaction
//! energies produced here are meV/atom.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::balancer::{balance, BalancedCoefficients};
use crate::composition::{Composition, Formula};
use crate::{Error, Result};

const EV_TO_KJ_PER_MOL: f64 = 96.4853;
const IDEAL_GAS_CONSTANT: f64 = 8.314_459_8;
const STANDARD_TEMPERATURE: f64 = 298.15;
const STANDARD_PRESSURE: f64 = 1e5;

/// Furnace atmosphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Atmosphere {
    /// Ambient air
    #[default]
    Air,
    /// Inert gas flow (trace partial pressures)
    Inert,
}

/// Partial pressures (Pa) of the gases exchanged with the sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartialPressures {
    /// Oxygen
    pub o2: f64,
    /// Carbon dioxide
    pub co2: f64,
    /// Ammonia
    pub nh3: f64,
    /// Water vapour
    pub h2o: f64,
}

impl Atmosphere {
    /// Partial pressures for this atmosphere.
    #[must_use]
    pub const fn partial_pressures(self) -> PartialPressures {
        match self {
            Self::Air => PartialPressures {
                o2: 21200.0,
                co2: 4050.0,
                nh3: 16.0,
                h2o: 2300.0,
            },
            Self::Inert => PartialPressures {
                o2: 0.1,
                co2: 0.1,
                nh3: 0.1,
                h2o: 0.1,
            },
        }
    }
}

impl FromStr for Atmosphere {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "air" => Ok(Self::Air),
            "inert" => Ok(Self::Inert),
            _ => Err(Error::Atmosphere(s.to_string())),
        }
    }
}

impl TryFrom<String> for Atmosphere {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Atmosphere> for String {
    fn from(atmosphere: Atmosphere) -> Self {
        atmosphere.to_string()
    }
}

impl fmt::Display for Atmosphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Air => f.write_str("air"),
            Self::Inert => f.write_str("inert"),
        }
    }
}

/// Gas-phase species with tabulated heat capacity and entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasSpecies {
    /// O2, normalized per O atom
    Oxygen,
    /// N2
    Nitrogen,
    /// Cl2
    Chlorine,
    /// F2
    Fluorine,
    /// H2
    Hydrogen,
    /// CO2
    CarbonDioxide,
    /// NH3
    Ammonia,
    /// H2O
    Water,
}

impl GasSpecies {
    /// Standard-state (Cp, S) in J/(K·mol), from JANAF tables.
    const fn heat_capacity_entropy(self) -> (f64, f64) {
        match self {
            Self::Oxygen => (29.376, 205.147),
            Self::Nitrogen => (29.124, 191.609),
            Self::Chlorine => (33.949, 223.079),
            Self::Fluorine => (31.302, 202.789),
            Self::Hydrogen => (28.836, 130.680),
            Self::CarbonDioxide => (37.129, 213.79),
            Self::Ammonia => (35.640, 192.80),
            Self::Water => (33.22, 194.10),
        }
    }

    /// Atoms the correction is normalized over.
    const fn normalization(self) -> f64 {
        match self {
            Self::Oxygen => 2.0,
            Self::CarbonDioxide | Self::Water => 3.0,
            Self::Ammonia => 4.0,
            _ => 1.0,
        }
    }
}

/// Chemical potential correction Δμ (eV/atom) of a gas at `temperature`
/// and `pressure` (Pa), relative to 298.15 K and 1 bar.
#[must_use]
pub fn chempot_correction(species: GasSpecies, temperature: f64, pressure: f64) -> f64 {
    let (cp, s) = species.heat_capacity_entropy();
    let t = temperature;
    let t0 = STANDARD_TEMPERATURE;
    let pv = IDEAL_GAS_CONSTANT * t * (pressure / STANDARD_PRESSURE).ln();
    let ts = -cp * (t * t.ln() - t0 * t0.ln()) + cp * (t - t0) * (1.0 + t0.ln()) - s * (t - t0);
    (pv + ts) / (1000.0 * EV_TO_KJ_PER_MOL) / species.normalization()
}

/// External source of formation energies (eV/atom).
pub trait ThermoOracle {
    /// Tabulated formation energy of a compound, if an entry exists.
    fn formation_energy(&self, formula: &Formula, temperature: i64, atmosphere: Atmosphere)
        -> Option<f64>;

    /// Formation energy of a composition on the phase-diagram convex hull.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Thermo`] if no phase diagram covers the composition.
    fn hull_formation_energy(
        &self,
        formula: &Formula,
        temperature: i64,
        atmosphere: Atmosphere,
    ) -> Result<f64>;
}

/// In-memory thermodynamic tables, keyed by formula and temperature.
///
/// Entry energies of oxygen-bearing solids are shifted to the grand
/// potential with open oxygen at the atmosphere's partial pressure. Gaseous
/// species always fall through to the hull table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabulatedThermo {
    entries: Vec<ThermoEntry>,
    #[serde(skip)]
    index: HashMap<(Formula, i64), (Option<f64>, Option<f64>)>,
}

/// One row of a [`TabulatedThermo`] table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermoEntry {
    /// Compound
    pub formula: Formula,
    /// Temperature (°C)
    pub temperature: i64,
    /// Entry formation energy (eV/atom)
    #[serde(default)]
    pub formation_energy: Option<f64>,
    /// Hull formation energy (eV/atom)
    #[serde(default)]
    pub hull_energy: Option<f64>,
}

impl TabulatedThermo {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of [`ThermoEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: Vec<ThermoEntry> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry);
        }
        Ok(table)
    }

    /// Insert or replace a row.
    pub fn insert(&mut self, entry: ThermoEntry) {
        self.index.insert(
            (entry.formula.clone(), entry.temperature),
            (entry.formation_energy, entry.hull_energy),
        );
        self.entries.push(entry);
    }

    /// Convenience: set both entry and hull energy for a compound.
    #[must_use]
    pub fn with_energy(mut self, formula: &Formula, temperature: i64, energy: f64) -> Self {
        self.insert(ThermoEntry {
            formula: formula.clone(),
            temperature,
            formation_energy: Some(energy),
            hull_energy: Some(energy),
        });
        self
    }
}

impl ThermoOracle for TabulatedThermo {
    fn formation_energy(
        &self,
        formula: &Formula,
        temperature: i64,
        atmosphere: Atmosphere,
    ) -> Option<f64> {
        if formula.is_volatile() {
            return None;
        }
        let energy = self.index.get(&(formula.clone(), temperature))?.0?;
        let oxygen = formula.composition().get(crate::composition::Element::OXYGEN);
        if oxygen > 0.0 {
            let fraction = oxygen / formula.num_atoms();
            #[allow(clippy::cast_precision_loss)]
            let shift = fraction
                * chempot_correction(
                    GasSpecies::Oxygen,
                    temperature as f64,
                    atmosphere.partial_pressures().o2,
                );
            return Some(energy - shift);
        }
        Some(energy)
    }

    fn hull_formation_energy(
        &self,
        formula: &Formula,
        temperature: i64,
        _atmosphere: Atmosphere,
    ) -> Result<f64> {
        self.index
            .get(&(formula.clone(), temperature))
            .and_then(|(_, hull)| *hull)
            .ok_or_else(|| Error::Thermo(format!("no hull energy for {formula} at {temperature} C")))
    }
}

/// Reaction energetics adapter bound to one oracle and atmosphere.
pub struct Energetics<'a> {
    oracle: &'a dyn ThermoOracle,
    atmosphere: Atmosphere,
}

impl fmt::Debug for Energetics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Energetics")
            .field("atmosphere", &self.atmosphere)
            .finish_non_exhaustive()
    }
}

impl<'a> Energetics<'a> {
    /// Wrap an oracle.
    #[must_use]
    pub fn new(oracle: &'a dyn ThermoOracle, atmosphere: Atmosphere) -> Self {
        Self { oracle, atmosphere }
    }

    /// Atmosphere used for oracle queries.
    #[must_use]
    pub const fn atmosphere(&self) -> Atmosphere {
        self.atmosphere
    }

    /// Formation energy per atom: tabulated entry if present, hull otherwise.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Thermo`] from the hull lookup.
    pub fn formation_energy_per_atom(&self, formula: &Formula, temperature: i64) -> Result<f64> {
        match self.oracle.formation_energy(formula, temperature, self.atmosphere) {
            Some(energy) => Ok(energy),
            None => self.oracle.hull_formation_energy(formula, temperature, self.atmosphere),
        }
    }

    /// Reaction energy (meV/atom) of `reactants -> products` at `temperature`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Balance`] if the reaction cannot be balanced, or an
    /// oracle error if an energy is missing.
    pub fn reaction_energy(
        &self,
        reactants: &[Formula],
        products: &[Formula],
        temperature: i64,
    ) -> Result<f64> {
        let coeffs = balance(reactants, products)?;
        self.balanced_reaction_energy(reactants, products, &coeffs, temperature)
    }

    fn balanced_reaction_energy(
        &self,
        reactants: &[Formula],
        products: &[Formula],
        coeffs: &BalancedCoefficients,
        temperature: i64,
    ) -> Result<f64> {
        let start = self.mixture_energy(reactants, coeffs.reactants(), temperature)?;
        let end = self.mixture_energy(products, coeffs.products(), temperature)?;
        Ok(1000.0 * (end - start))
    }

    /// Amount-weighted formation energy per atom of a mixture.
    fn mixture_energy(&self, formulas: &[Formula], amounts: &[f64], temperature: i64) -> Result<f64> {
        let mut energy = 0.0;
        let mut atoms = 0.0;
        for (formula, amount) in formulas.iter().zip(amounts) {
            let per_atom = self.formation_energy_per_atom(formula, temperature)?;
            energy += amount * formula.num_atoms() * per_atom;
            atoms += amount * formula.num_atoms();
        }
        if atoms <= 0.0 {
            return Err(Error::InvalidInput("mixture contains no atoms".to_string()));
        }
        Ok(energy / atoms)
    }

    /// Driving force (meV/atom) to form `targets` from an arbitrary mixture.
    ///
    /// The mixture is averaged into a single composition, which is balanced
    /// against the targets alone, then with allowed byproducts (plus O2 and
    /// CO2 release), then with O2/CO2 uptake. The first balanced variant is
    /// used. Returns the product list of that variant and the energy change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Balance`] if no variant balances, or an oracle error.
    pub fn driving_force(
        &self,
        mixture: &[Formula],
        amounts: &[f64],
        targets: &[Formula],
        allowed_byproducts: &[Formula],
        open_system: bool,
        temperature: i64,
    ) -> Result<(Vec<Formula>, f64)> {
        let initial_energy = self.mixture_energy(mixture, amounts, temperature)?;

        let mut net = Composition::default();
        for (formula, amount) in mixture.iter().zip(amounts) {
            net.add_scaled(formula.composition(), *amount);
        }
        let average = Formula::from_composition(&net);

        let variant = find_balanced_variant(&average, targets, allowed_byproducts, open_system)
            .ok_or_else(|| {
                Error::Balance(crate::BalanceError::UnbalancedReaction {
                    residual: f64::INFINITY,
                })
            })?;
        debug!(
            mixture = %average,
            products = %crate::composition::join(&variant.products),
            uptake = %crate::composition::join(&variant.uptake),
            "driving force variant"
        );

        // Totals are per formula unit of the averaged mixture
        let mut delta = -initial_energy * average.num_atoms();
        let mut final_atoms = 0.0;
        for (formula, coeff) in variant.products.iter().zip(variant.coeffs.reactants()) {
            let per_atom = self.formation_energy_per_atom(formula, temperature)?;
            delta += coeff * formula.num_atoms() * per_atom;
            final_atoms += coeff * formula.num_atoms();
        }
        for (formula, coeff) in variant.uptake.iter().zip(variant.coeffs.products().iter().skip(1)) {
            let per_atom = self.formation_energy_per_atom(formula, temperature)?;
            delta -= coeff * formula.num_atoms() * per_atom;
        }
        if final_atoms <= 0.0 {
            return Err(Error::InvalidInput("targets contain no atoms".to_string()));
        }
        Ok((variant.products, 1000.0 * delta / final_atoms))
    }
}

struct BalancedVariant {
    products: Vec<Formula>,
    uptake: Vec<Formula>,
    coeffs: BalancedCoefficients,
}

/// Targets are placed on the balancer's reactant side and the averaged
/// mixture (plus any gas uptake) on its product side, so the coefficients
/// give target amounts per unit of mixture.
fn find_balanced_variant(
    average: &Formula,
    targets: &[Formula],
    allowed_byproducts: &[Formula],
    open_system: bool,
) -> Option<BalancedVariant> {
    let gases = [Formula::o2(), Formula::co2()];
    let mut byproducts: Vec<Formula> = allowed_byproducts.to_vec();
    for gas in &gases {
        if !byproducts.contains(gas) {
            byproducts.push(gas.clone());
        }
    }

    let attempt = |products: Vec<Formula>, uptake: Vec<Formula>| {
        let mut rhs = vec![average.clone()];
        rhs.extend(uptake.iter().cloned());
        balance(&products, &rhs).ok().map(|coeffs| BalancedVariant {
            products,
            uptake,
            coeffs,
        })
    };

    if let Some(found) = attempt(targets.to_vec(), Vec::new()) {
        return Some(found);
    }
    for subset in super::subsets(&byproducts) {
        let mut products = targets.to_vec();
        products.extend(subset);
        if let Some(found) = attempt(products, Vec::new()) {
            return Some(found);
        }
    }
    let uptakes = [
        vec![Formula::o2()],
        vec![Formula::co2()],
        vec![Formula::o2(), Formula::co2()],
    ];
    for uptake in uptakes {
        if let Some(found) = attempt(targets.to_vec(), uptake.clone()) {
            return Some(found);
        }
        if open_system {
            for subset in super::subsets(&gases) {
                if subset.iter().any(|g| uptake.contains(g)) {
                    continue;
                }
                let mut products = targets.to_vec();
                products.extend(subset);
                if let Some(found) = attempt(products, uptake.clone()) {
                    return Some(found);
                }
            }
        }
    }
    None
}
