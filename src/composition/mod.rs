//! Chemical compositions and canonical formulas
//!
//! Every set membership test, map key, and equality comparison in the crate
//! goes through [`Formula`], which always holds the reduced formula string.
//! Two inputs that denote the same compound (`"Ba2O4"`, `"BaO2"`,
//! `"O2Ba"`) produce identical formulas.
//!
//! ```rust
//! use synthpath::composition::Formula;
//!
//! let a = Formula::parse("Ba2O4")?;
//! let b = Formula::parse("O2 Ba")?;
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "BaO2");
//! # Ok::<(), synthpath::Error>(())
//! ```

mod element;
mod parser;

pub use element::Element;

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tolerance used when deciding whether an amount is integral.
const INTEGER_TOLERANCE: f64 = 1e-8;

/// Largest electronegativity gap between the two most electronegative
/// elements for them to be written as a bracketed polyanion.
const POLYANION_GAP: f64 = 1.65;

/// Gases that may be taken up or released by a reaction (oxidants).
pub const OXIDANTS: [&str; 2] = ["O2", "CO2"];

/// Species dropped from a solid inventory after a reaction.
pub const VOLATILES: [&str; 4] = ["O2", "CO2", "H3N", "H2O"];

/// Reduced formulas that are conventionally written doubled.
const SPECIAL_FORMULAS: [(&str, &str); 11] = [
    ("O", "O2"),
    ("N", "N2"),
    ("H", "H2"),
    ("F", "F2"),
    ("Cl", "Cl2"),
    ("HO", "H2O2"),
    ("LiO", "LiO2"),
    ("NaO", "NaO2"),
    ("KO", "KO2"),
    ("RbO", "RbO2"),
    ("CsO", "CsO2"),
];

/// Element amounts of a compound or mixture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composition {
    amounts: BTreeMap<Element, f64>,
}

impl Composition {
    /// Parse a formula string into a composition (not reduced).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormula`] for unknown symbols or malformed input.
    pub fn parse(formula: &str) -> Result<Self> {
        parser::parse_formula(formula).map(Self::from_map)
    }

    /// Build a composition from element amounts; non-positive amounts are dropped.
    #[must_use]
    pub fn from_map(amounts: BTreeMap<Element, f64>) -> Self {
        Self {
            amounts: amounts
                .into_iter()
                .filter(|(_, n)| *n > INTEGER_TOLERANCE)
                .collect(),
        }
    }

    /// Amount of a single element (zero if absent).
    #[must_use]
    pub fn get(&self, element: Element) -> f64 {
        self.amounts.get(&element).copied().unwrap_or(0.0)
    }

    /// Iterate over `(element, amount)` in atomic-number order.
    pub fn iter(&self) -> impl Iterator<Item = (Element, f64)> + '_ {
        self.amounts.iter().map(|(e, n)| (*e, *n))
    }

    /// Set of elements present.
    #[must_use]
    pub fn element_set(&self) -> BTreeSet<Element> {
        self.amounts.keys().copied().collect()
    }

    /// True when no element has a positive amount.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Total number of atoms.
    #[must_use]
    pub fn num_atoms(&self) -> f64 {
        self.amounts.values().sum()
    }

    /// Molar mass in g/mol.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.iter().map(|(e, n)| e.atomic_weight() * n).sum()
    }

    /// Multiply every amount by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self::from_map(self.iter().map(|(e, n)| (e, n * factor)).collect())
    }

    /// Add `factor` times `other` to this composition.
    pub fn add_scaled(&mut self, other: &Self, factor: f64) {
        for (element, n) in other.iter() {
            *self.amounts.entry(element).or_insert(0.0) += n * factor;
        }
        self.amounts.retain(|_, n| *n > INTEGER_TOLERANCE);
    }

    /// Reduced composition and the factor it was divided by.
    ///
    /// Integer compositions are divided by the GCD of their counts;
    /// compositions with fractional counts are returned unchanged.
    #[must_use]
    pub fn reduced(&self) -> (Self, f64) {
        let integral = self
            .amounts
            .values()
            .all(|n| (n - n.round()).abs() < INTEGER_TOLERANCE);
        if !integral {
            return (self.clone(), 1.0);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let divisor = self
            .amounts
            .values()
            .map(|n| n.round() as u64)
            .fold(0, gcd);
        if divisor <= 1 {
            return (self.clone(), 1.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let factor = divisor as f64;
        (self.scaled(1.0 / factor), factor)
    }

    /// Canonical reduced formula string.
    #[must_use]
    pub fn reduced_formula(&self) -> String {
        self.canonical().0
    }

    /// Reduced formula string together with the composition it denotes.
    fn canonical(&self) -> (String, Self) {
        let (reduced, _) = self.reduced();
        let text = reduced.formula_string();
        match SPECIAL_FORMULAS.iter().find(|(plain, _)| *plain == text) {
            Some((_, special)) => ((*special).to_string(), reduced.scaled(2.0)),
            None => (text, reduced),
        }
    }

    /// Formula string in electronegativity order without reduction.
    ///
    /// With three or more elements, the two most electronegative are written
    /// as a group when their sub-formula has a common factor: `Ba(NO3)2`.
    fn formula_string(&self) -> String {
        let mut elements: Vec<(Element, f64)> = self.iter().collect();
        elements.sort_by(|a, b| a.0.formula_order(b.0));

        let mut polyanion = String::new();
        if let [_, .., (second, _), (last, _)] = elements.as_slice() {
            if last.electronegativity() - second.electronegativity() < POLYANION_GAP {
                let split = elements.len() - 2;
                let anion = Self::from_map(elements[split..].iter().copied().collect());
                let (reduced, factor) = anion.reduced();
                if factor > 1.0 {
                    polyanion = format!("({}){}", reduced.formula_string(), format_amount(factor));
                    elements.truncate(split);
                }
            }
        }

        let mut text: String = elements
            .into_iter()
            .map(|(e, n)| format!("{}{}", e.symbol(), format_amount(n)))
            .collect();
        text.push_str(&polyanion);
        text
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn format_amount(n: f64) -> String {
    if (n - 1.0).abs() < INTEGER_TOLERANCE {
        String::new()
    } else if (n - n.round()).abs() < INTEGER_TOLERANCE {
        format!("{}", n.round())
    } else {
        format!("{}", (n * 1e8).round() / 1e8)
    }
}

/// A compound identified by its canonical reduced formula.
///
/// Equality, ordering and hashing use the formula string only.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    text: String,
    composition: Composition,
}

impl Formula {
    /// Parse and canonicalize a formula string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormula`] if the string is not a formula.
    pub fn parse(input: &str) -> Result<Self> {
        Composition::parse(input).map(|c| Self::from_composition(&c))
    }

    /// Canonical formula for a composition.
    #[must_use]
    pub fn from_composition(composition: &Composition) -> Self {
        let (text, composition) = composition.canonical();
        Self { text, composition }
    }

    /// Parse a list of formula strings.
    ///
    /// # Errors
    ///
    /// Returns the first parse failure.
    pub fn parse_all<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<Self>> {
        inputs.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    /// Molecular oxygen.
    #[must_use]
    pub fn o2() -> Self {
        Self::from_composition(&Composition::from_map(BTreeMap::from([(Element::OXYGEN, 2.0)])))
    }

    /// Carbon dioxide.
    #[must_use]
    pub fn co2() -> Self {
        Self::from_composition(&Composition::from_map(BTreeMap::from([
            (Element::CARBON, 1.0),
            (Element::OXYGEN, 2.0),
        ])))
    }

    /// Canonical formula string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Composition of one formula unit.
    #[must_use]
    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    /// Elements present.
    #[must_use]
    pub fn elements(&self) -> BTreeSet<Element> {
        self.composition.element_set()
    }

    /// Molar mass of one formula unit.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.composition.weight()
    }

    /// Atoms per formula unit.
    #[must_use]
    pub fn num_atoms(&self) -> f64 {
        self.composition.num_atoms()
    }

    /// True for O2 and CO2.
    #[must_use]
    pub fn is_oxidant(&self) -> bool {
        OXIDANTS.contains(&self.text.as_str())
    }

    /// True for gaseous byproducts removed from solid inventories.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        VOLATILES.contains(&self.text.as_str())
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Formula {}

impl Hash for Formula {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for Formula {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Formula {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.text.cmp(&other.text)
    }
}

impl Borrow<str> for Formula {
    fn borrow(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Formula({})", self.text)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Formula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Formula {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.text
    }
}

/// Join formulas with `" + "`, the notation used in logs and saved tables.
#[must_use]
pub fn join<'a, I>(formulas: I) -> String
where
    I: IntoIterator<Item = &'a Formula>,
{
    formulas
        .into_iter()
        .map(Formula::as_str)
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Convert molar amounts to weight fractions.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if lengths differ or the total mass is zero.
pub fn weight_fractions(compounds: &[Formula], amounts: &[f64]) -> Result<Vec<f64>> {
    if compounds.len() != amounts.len() {
        return Err(Error::InvalidInput(format!(
            "{} compounds but {} amounts",
            compounds.len(),
            amounts.len()
        )));
    }
    let masses: Vec<f64> = compounds
        .iter()
        .zip(amounts)
        .map(|(c, n)| c.weight() * n)
        .collect();
    let total: f64 = masses.iter().sum();
    if total <= 0.0 {
        return Err(Error::InvalidInput("total mass must be positive".to_string()));
    }
    Ok(masses.into_iter().map(|m| m / total).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(s: &str) -> Formula {
        Formula::parse(s).unwrap()
    }

    #[test]
    fn test_reduction_is_canonical() {
        assert_eq!(f("Ba2O4"), f("BaO2"));
        assert_eq!(f("O2Ba").as_str(), "BaO2");
        assert_eq!(f("Cu2O2").as_str(), "CuO");
        assert_eq!(f("YBa2Cu3O7").as_str(), "Ba2YCu3O7");
    }

    #[test]
    fn test_special_formulas() {
        assert_eq!(f("O").as_str(), "O2");
        assert_eq!(f("O4").as_str(), "O2");
        assert_eq!(f("CO2").as_str(), "CO2");
        assert_eq!(f("NH3").as_str(), "H3N");
        assert_eq!(f("H2O").as_str(), "H2O");
        assert_eq!(f("O").composition().get(Element::OXYGEN), 2.0);
    }

    #[test]
    fn test_polyanion_grouping() {
        assert_eq!(f("Ba(NO3)2").as_str(), "Ba(NO3)2");
        assert_eq!(f("BaN2O6"), f("Ba(NO3)2"));
        assert_eq!(f("Ca(OH)2").as_str(), "Ca(HO)2");
        // A group with unit multiplicity is written out flat
        assert_eq!(f("BaCO3").as_str(), "BaCO3");
        assert_eq!(f("Y2Cu2O5").as_str(), "Y2Cu2O5");
        assert_eq!(f("Ba(NO3)2").composition().get(Element::OXYGEN), 6.0);
    }

    #[test]
    fn test_fractional_formula_kept() {
        let ybco = f("Y Ba2 Cu3 O6.5");
        assert_eq!(ybco.as_str(), "Ba2YCu3O6.5");
        assert!((ybco.num_atoms() - 12.5).abs() < 1e-12);
    }

    #[test]
    fn test_weight() {
        let bao2 = f("BaO2");
        assert!((bao2.weight() - 169.325).abs() < 1e-3);
    }

    #[test]
    fn test_oxidant_helpers() {
        assert_eq!(Formula::o2(), f("O2"));
        assert_eq!(Formula::co2(), f("CO2"));
        assert!(Formula::co2().is_oxidant());
        assert!(f("NH3").is_volatile());
        assert!(!f("CuO").is_volatile());
    }

    #[test]
    fn test_weight_fractions() {
        let wts = weight_fractions(&[f("BaO2"), f("CuO")], &[1.0, 1.0]).unwrap();
        assert!((wts.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(wts[0] > 0.67 && wts[0] < 0.69);
        assert!(weight_fractions(&[f("CuO")], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&f("Cu2O2")).unwrap();
        assert_eq!(json, "\"CuO\"");
        let back: Formula = serde_json::from_str("\"O2Cu2\"").unwrap();
        assert_eq!(back, f("CuO"));
        assert!(serde_json::from_str::<Formula>("\"Qq\"").is_err());
    }
}
