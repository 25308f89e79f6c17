//! Amount propagation through a single reaction
//!
//! Given available and stoichiometrically required reactant amounts, find the
//! limiting reactant, scale the reaction extent to it, and merge the products
//! into the leftover inventory.

use crate::composition::Formula;
use crate::{Error, Result};

/// Relative tolerance under which available and required amounts are
/// considered identical (both reactants fully consumed).
pub const CONSUMPTION_TOLERANCE: f64 = 0.01;

/// Availability assigned to gaseous reactants drawn from the atmosphere.
pub const UNLIMITED_GAS: f64 = 1000.0;

/// Ordered set of compounds with associated amounts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Inventory {
    compounds: Vec<Formula>,
    amounts: Vec<f64>,
}

impl Inventory {
    /// Empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel compound/amount lists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the lengths differ.
    pub fn from_parts(compounds: Vec<Formula>, amounts: Vec<f64>) -> Result<Self> {
        if compounds.len() != amounts.len() {
            return Err(Error::InvalidInput(format!(
                "{} compounds but {} amounts",
                compounds.len(),
                amounts.len()
            )));
        }
        let mut inventory = Self::new();
        for (compound, amount) in compounds.into_iter().zip(amounts) {
            inventory.add(compound, amount);
        }
        Ok(inventory)
    }

    /// Add `amount` of `compound`, summing with any existing entry.
    pub fn add(&mut self, compound: Formula, amount: f64) {
        match self.position(&compound) {
            Some(idx) => self.amounts[idx] += amount,
            None => {
                self.compounds.push(compound);
                self.amounts.push(amount);
            }
        }
    }

    fn position(&self, compound: &Formula) -> Option<usize> {
        self.compounds.iter().position(|c| c == compound)
    }

    /// Amount of `compound` (None if absent).
    #[must_use]
    pub fn amount(&self, compound: &Formula) -> Option<f64> {
        self.position(compound).map(|idx| self.amounts[idx])
    }

    /// True if the compound is present.
    #[must_use]
    pub fn contains(&self, compound: &Formula) -> bool {
        self.position(compound).is_some()
    }

    /// Compounds in insertion order.
    #[must_use]
    pub fn compounds(&self) -> &[Formula] {
        &self.compounds
    }

    /// Amounts aligned with [`compounds`](Self::compounds).
    #[must_use]
    pub fn amounts(&self) -> &[f64] {
        &self.amounts
    }

    /// Number of compounds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    /// True if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }

    /// Iterate over `(compound, amount)`.
    pub fn iter(&self) -> impl Iterator<Item = (&Formula, f64)> {
        self.compounds.iter().zip(self.amounts.iter().copied())
    }

    /// Copy without volatile species (O2, CO2, NH3, H2O).
    #[must_use]
    pub fn without_volatiles(&self) -> Self {
        self.filtered(|c, _| !c.is_volatile())
    }

    /// Copy without compounds whose amount is exactly zero.
    #[must_use]
    pub fn without_depleted(&self) -> Self {
        self.filtered(|_, amount| amount != 0.0)
    }

    fn filtered(&self, keep: impl Fn(&Formula, f64) -> bool) -> Self {
        let mut out = Self::new();
        for (compound, amount) in self.iter() {
            if keep(compound, amount) {
                out.add(compound.clone(), amount);
            }
        }
        out
    }

    /// Split into parallel vectors.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Formula>, Vec<f64>) {
        (self.compounds, self.amounts)
    }
}

/// Apply a balanced reaction to the available reactant amounts.
///
/// `available` and `required` are aligned with `reactants`; `yields` with
/// `products`. The returned inventory lists leftover reactants first, then
/// products, with amounts rounded to three decimals. Fully consumed reactants
/// are removed.
///
/// When several reactants are limiting, the one with the smallest
/// available/required ratio wins; exact ratio ties go to the
/// lexicographically first formula.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on mismatched lengths, empty reactants, or
/// non-positive totals.
#[allow(clippy::similar_names)]
pub fn apply_reaction(
    reactants: &[Formula],
    available: &[f64],
    required: &[f64],
    products: &[Formula],
    yields: &[f64],
) -> Result<Inventory> {
    if reactants.is_empty()
        || reactants.len() != available.len()
        || reactants.len() != required.len()
        || products.len() != yields.len()
    {
        return Err(Error::InvalidInput(format!(
            "reaction shape mismatch: {} reactants, {} available, {} required, {} products, {} yields",
            reactants.len(),
            available.len(),
            required.len(),
            products.len(),
            yields.len()
        )));
    }
    let sum_avail: f64 = available.iter().sum();
    let sum_req: f64 = required.iter().sum();
    if sum_avail <= 0.0 || sum_req <= 0.0 {
        return Err(Error::InvalidInput(
            "reactant amounts must have a positive total".to_string(),
        ));
    }
    let avail: Vec<f64> = available.iter().map(|v| v / sum_avail).collect();
    let req: Vec<f64> = required.iter().map(|v| v / sum_req).collect();

    let all_consumed = avail
        .iter()
        .zip(&req)
        .all(|(a, r)| (a - r).abs() <= CONSUMPTION_TOLERANCE);

    let mut leftovers = Inventory::new();
    let limiting = if all_consumed {
        0
    } else {
        let limiting = (0..reactants.len())
            .filter(|&i| avail[i] < req[i])
            .min_by(|&i, &j| {
                (avail[i] / req[i])
                    .total_cmp(&(avail[j] / req[j]))
                    .then_with(|| reactants[i].cmp(&reactants[j]))
            })
            .ok_or_else(|| Error::InvalidInput("no limiting reactant found".to_string()))?;
        let extent = avail[limiting] / req[limiting];
        for (i, compound) in reactants.iter().enumerate() {
            if i != limiting {
                let remaining = (avail[i] - extent * req[i]) * sum_avail;
                leftovers.add(compound.clone(), remaining);
            }
        }
        limiting
    };

    // Extent in absolute units set by the limiting (or first) reactant
    let extent = (sum_avail * avail[limiting]) / (sum_req * req[limiting]);

    let mut result = leftovers;
    for (product, coeff) in products.iter().zip(yields) {
        result.add(product.clone(), coeff * extent);
    }
    for amount in &mut result.amounts {
        *amount = round3(*amount);
    }
    Ok(result)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formulas(list: &[&str]) -> Vec<Formula> {
        Formula::parse_all(list).unwrap()
    }

    #[test]
    fn test_exact_consumption() {
        let out = apply_reaction(
            &formulas(&["BaO2", "CuO"]),
            &[1.0, 1.0],
            &[1.0, 1.0],
            &formulas(&["BaCuO2", "O2"]),
            &[1.0, 0.5],
        )
        .unwrap();
        assert_eq!(out.compounds(), formulas(&["BaCuO2", "O2"]).as_slice());
        assert_eq!(out.amounts(), &[1.0, 0.5]);
    }

    #[test]
    fn test_limiting_reactant() {
        // 2 units BaO available, 1 unit CuO: CuO limits, 1 BaO remains
        let out = apply_reaction(
            &formulas(&["BaO", "CuO"]),
            &[2.0, 1.0],
            &[1.0, 1.0],
            &formulas(&["BaCuO2"]),
            &[1.0],
        )
        .unwrap();
        assert_eq!(out.compounds(), formulas(&["BaO", "BaCuO2"]).as_slice());
        assert_eq!(out.amounts(), &[1.0, 1.0]);
    }

    #[test]
    fn test_gas_uptake_limited_by_solid() {
        // 2 Cu2O + O2 -> 4 CuO with atmospheric oxygen in excess
        let out = apply_reaction(
            &formulas(&["Cu2O", "O2"]),
            &[1.0, UNLIMITED_GAS],
            &[0.5, 0.25],
            &formulas(&["CuO"]),
            &[1.0],
        )
        .unwrap();
        assert_eq!(out.amount(&Formula::parse("CuO").unwrap()), Some(2.0));
        assert!(!out.contains(&Formula::parse("Cu2O").unwrap()));
        assert_eq!(out.amount(&Formula::o2()), Some(999.5));
    }

    #[test]
    fn test_product_merges_with_leftover() {
        // CuO in excess is also a product: amounts are summed
        let out = apply_reaction(
            &formulas(&["Cu2O", "CuO"]),
            &[1.0, 3.0],
            &[1.0, 1.0],
            &formulas(&["CuO", "Cu"]),
            &[1.0, 1.0],
        )
        .unwrap();
        assert_eq!(out.compounds(), formulas(&["CuO", "Cu"]).as_slice());
        assert_eq!(out.amounts(), &[3.0, 1.0]);
    }

    #[test]
    fn test_near_tolerance_counts_as_consumed() {
        let out = apply_reaction(
            &formulas(&["BaO", "CuO"]),
            &[1.0, 1.01],
            &[1.0, 1.0],
            &formulas(&["BaCuO2"]),
            &[1.0],
        )
        .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = apply_reaction(&formulas(&["BaO"]), &[1.0, 2.0], &[1.0], &[], &[]);
        assert!(err.is_err());
    }

    #[test]
    fn test_inventory_filters() {
        let inv = Inventory::from_parts(formulas(&["CuO", "O2", "BaO"]), vec![1.0, 0.5, 0.0]).unwrap();
        assert_eq!(inv.without_volatiles().len(), 2);
        assert_eq!(inv.without_depleted().len(), 2);
    }
}
