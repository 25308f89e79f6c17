//! Enumeration of precursor sets that balance to the target

use std::collections::BTreeSet;

use crate::composition::{Element, Formula};
use crate::reactions::{balance, combinations_of, subsets};

/// A precursor combination together with its balanced amounts.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecursorSet {
    /// Precursors, in the order of the available list
    pub precursors: Vec<Formula>,
    /// Molar amounts per unit of the first product, rounded to 3 decimals
    pub amounts: Vec<f64>,
    /// Target phases followed by any byproducts needed to balance
    pub products: Vec<Formula>,
}

/// Every combination of 2 to `max_precursors` available precursors that
/// balances to `targets`, alone or with a combination of allowed byproducts.
///
/// `max_precursors` defaults to the number of elements spanned by the
/// available precursors.
#[must_use]
pub fn precursor_sets(
    available: &[Formula],
    targets: &[Formula],
    allowed_byproducts: &[Formula],
    max_precursors: Option<usize>,
) -> Vec<PrecursorSet> {
    let elements: BTreeSet<Element> = available.iter().flat_map(Formula::elements).collect();
    let max_precursors = max_precursors.unwrap_or(elements.len()).min(available.len());

    let mut found = Vec::new();
    for size in 2..=max_precursors {
        for precursors in combinations_of(available, size) {
            if let Ok(coeffs) = balance(&precursors, targets) {
                found.push(PrecursorSet {
                    amounts: coeffs.reactants().iter().map(|v| round3(*v)).collect(),
                    precursors,
                    products: targets.to_vec(),
                });
                continue;
            }
            for byproducts in subsets(allowed_byproducts) {
                let mut products = targets.to_vec();
                products.extend(byproducts);
                if let Ok(coeffs) = balance(&precursors, &products) {
                    found.push(PrecursorSet {
                        precursors: precursors.clone(),
                        amounts: coeffs.reactants().iter().map(|v| round3(*v)).collect(),
                        products,
                    });
                }
            }
        }
    }
    found
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
    fn test_ybco_like_target() {
        let available = formulas(&["Y2O3", "BaO", "BaO2", "CuO", "Cu2O"]);
        let target = formulas(&["Y Ba2 Cu3 O6.5"]);
        let sets = precursor_sets(&available, &target, &formulas(&["O2"]), None);

        assert!(sets.iter().all(|s| s.precursors.len() >= 3));
        let direct = sets
            .iter()
            .find(|s| s.precursors == formulas(&["Y2O3", "BaO", "CuO"]))
            .unwrap();
        assert_eq!(direct.products, target);
        assert_eq!(direct.amounts, vec![0.5, 2.0, 3.0]);

        let peroxide = sets
            .iter()
            .find(|s| s.precursors == formulas(&["Y2O3", "BaO2", "CuO"]))
            .unwrap();
        assert_eq!(peroxide.products, formulas(&["Y Ba2 Cu3 O6.5", "O2"]));

        // Cu2O + BaO would need oxygen uptake, which is not a byproduct
        assert!(!sets
            .iter()
            .any(|s| s.precursors == formulas(&["Y2O3", "BaO", "Cu2O"])));
    }

    #[test]
    fn test_max_precursors_limits_size() {
        let available = formulas(&["BaO", "CuO", "Y2O3"]);
        let sets = precursor_sets(&available, &formulas(&["BaCuO2"]), &[], Some(2));
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].amounts, vec![1.0, 1.0]);
    }
}
