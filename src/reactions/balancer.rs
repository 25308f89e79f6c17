//! Stoichiometric balancer
//!
//! The first product is normalized to a coefficient of 1 and every other
//! product joins the reactants as an extra unknown. Solving `A·x = b` by SVD
//! least squares (rows = elements, columns = unknowns, `b` = first product)
//! yields positive coefficients for participating reactants and negative ones
//! for byproducts that are formed.
//!
//! ```rust
//! use synthpath::composition::Formula;
//! use synthpath::reactions::balance;
//!
//! // 2 BaO2 -> 2 BaO + O2
//! let reactants = Formula::parse_all(&["BaO2"])?;
//! let products = Formula::parse_all(&["BaO", "O2"])?;
//! let coeffs = balance(&reactants, &products)?;
//! assert!((coeffs.reactants()[0] - 1.0).abs() < 1e-9);
//! assert!((coeffs.products()[1] - 0.5).abs() < 1e-9);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use crate::composition::{Composition, Element, Formula};
use crate::error::BalanceError;

/// Minimum magnitude for a coefficient to count as participating.
pub const PARTICIPATION_TOLERANCE: f64 = 1e-6;

/// Maximum sum of squared residuals for a balanced reaction.
pub const RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Gas sets tried, in order, when a solid reaction cannot balance on its own.
pub const OXIDANT_AUGMENTATIONS: [&[&str]; 3] = [&["O2"], &["CO2"], &["O2", "CO2"]];

/// Coefficients of a balanced reaction.
///
/// Product coefficients are absolute values; the first product is always 1.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedCoefficients {
    reactants: Vec<f64>,
    products: Vec<f64>,
}

impl BalancedCoefficients {
    /// Reactant coefficients (all positive).
    #[must_use]
    pub fn reactants(&self) -> &[f64] {
        &self.reactants
    }

    /// Product coefficients (all positive, first is 1).
    #[must_use]
    pub fn products(&self) -> &[f64] {
        &self.products
    }

    /// Check element-wise conservation within `tolerance`.
    #[must_use]
    pub fn is_mass_balanced(
        &self,
        reactants: &[Formula],
        products: &[Formula],
        tolerance: f64,
    ) -> bool {
        let side = |formulas: &[Formula], coeffs: &[f64]| {
            let mut total = Composition::default();
            for (formula, coeff) in formulas.iter().zip(coeffs) {
                total.add_scaled(formula.composition(), *coeff);
            }
            total
        };
        let left = side(reactants, &self.reactants);
        let right = side(products, &self.products);
        let elements: BTreeSet<Element> = left.element_set().union(&right.element_set()).copied().collect();
        elements
            .into_iter()
            .all(|e| (left.get(e) - right.get(e)).abs() <= tolerance)
    }
}

/// Balance `reactants -> products`.
///
/// # Errors
///
/// Returns a [`BalanceError`] describing why no non-negative balanced reaction
/// exists for this reactant/product combination.
pub fn balance(
    reactants: &[Formula],
    products: &[Formula],
) -> Result<BalancedCoefficients, BalanceError> {
    let Some((primary, byproducts)) = products.split_first() else {
        return Err(BalanceError::EmptyReaction);
    };
    if reactants.is_empty() {
        return Err(BalanceError::EmptyReaction);
    }

    let reactant_elements = element_union(reactants);
    let product_elements = element_union(products);
    if !product_elements.is_subset(&reactant_elements) {
        return Err(BalanceError::ElementMismatch {
            reactants: symbols(&reactant_elements),
            products: symbols(&product_elements),
        });
    }
    // A reactant carrying an element no product holds is a spectator
    if reactant_elements != product_elements {
        return Err(BalanceError::UnusedPrecursor);
    }

    let unknowns: Vec<&Formula> = reactants.iter().chain(byproducts).collect();
    let elements: Vec<Element> = reactant_elements.into_iter().collect();

    let matrix = DMatrix::from_fn(elements.len(), unknowns.len(), |row, col| {
        unknowns[col].composition().get(elements[row])
    });
    let target = DVector::from_iterator(
        elements.len(),
        elements.iter().map(|e| primary.composition().get(*e)),
    );

    let svd = matrix.clone().svd(true, true);
    let tolerance = rank_tolerance(svd.singular_values.max(), elements.len(), unknowns.len());
    let rank = svd.rank(tolerance);
    let dependent = BalanceError::LinearDependence {
        rank,
        unknowns: unknowns.len(),
    };
    if rank < unknowns.len() {
        return Err(dependent);
    }
    let solution = svd.solve(&target, tolerance).map_err(|_| dependent)?;
    let residual = (&matrix * &solution - &target).norm_squared();
    let solution = solution.as_slice();

    let (reactant_coeffs, byproduct_coeffs) = solution.split_at(reactants.len());
    if !reactant_coeffs.iter().all(|c| *c > PARTICIPATION_TOLERANCE) {
        return Err(BalanceError::UnusedPrecursor);
    }
    if !byproduct_coeffs.iter().all(|c| *c < -PARTICIPATION_TOLERANCE) {
        return Err(BalanceError::ByproductNotFormed);
    }
    if residual >= RESIDUAL_TOLERANCE {
        return Err(BalanceError::UnbalancedReaction { residual });
    }

    let mut product_coeffs = Vec::with_capacity(products.len());
    product_coeffs.push(1.0);
    product_coeffs.extend(byproduct_coeffs.iter().map(|c| c.abs()));

    Ok(BalancedCoefficients {
        reactants: reactant_coeffs.to_vec(),
        products: product_coeffs,
    })
}

/// Balance a solid reaction, adding gaseous oxidants to the reactants when
/// the bare reaction cannot balance.
///
/// Returns the reactant list actually used (solids plus any oxidants) along
/// with its coefficients, or `None` if no augmentation balances.
#[must_use]
pub fn balance_with_uptake(
    solids: &[Formula],
    products: &[Formula],
) -> Option<(Vec<Formula>, BalancedCoefficients)> {
    if let Ok(coeffs) = balance(solids, products) {
        return Some((solids.to_vec(), coeffs));
    }
    OXIDANT_AUGMENTATIONS.iter().find_map(|gases| {
        let mut reactants = solids.to_vec();
        reactants.extend(gases.iter().filter_map(|g| Formula::parse(g).ok()));
        balance(&reactants, products)
            .ok()
            .map(|coeffs| (reactants, coeffs))
    })
}

/// Singular-value cutoff for rank: `max(sigma) * max(rows, cols) * eps`.
#[allow(clippy::cast_precision_loss)]
fn rank_tolerance(max_singular: f64, rows: usize, cols: usize) -> f64 {
    max_singular * rows.max(cols) as f64 * f64::EPSILON
}

fn element_union(formulas: &[Formula]) -> BTreeSet<Element> {
    formulas.iter().flat_map(Formula::elements).collect()
}

fn symbols(elements: &BTreeSet<Element>) -> String {
    elements
        .iter()
        .map(|e| e.symbol())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formulas(list: &[&str]) -> Vec<Formula> {
        Formula::parse_all(list).unwrap()
    }

    #[test]
    fn test_peroxide_decomposition() {
        let reacs = formulas(&["BaO2"]);
        let prods = formulas(&["BaO", "O2"]);
        let coeffs = balance(&reacs, &prods).unwrap();
        // Proportional to 2 BaO2 -> 2 BaO + O2
        assert!((coeffs.reactants()[0] / coeffs.products()[1] - 2.0).abs() < 1e-3);
        assert!((coeffs.products()[0] / coeffs.products()[1] - 2.0).abs() < 1e-3);
        assert!(coeffs.is_mass_balanced(&reacs, &prods, 1e-6));
    }

    #[test]
    fn test_pairwise_with_oxygen_release() {
        let reacs = formulas(&["BaO2", "CuO"]);
        let prods = formulas(&["BaCuO2", "O2"]);
        let coeffs = balance(&reacs, &prods).unwrap();
        assert!((coeffs.reactants()[0] - 1.0).abs() < 1e-9);
        assert!((coeffs.reactants()[1] - 1.0).abs() < 1e-9);
        assert!((coeffs.products()[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_element_mismatch() {
        let err = balance(&formulas(&["BaO"]), &formulas(&["BaCuO2"])).unwrap_err();
        assert!(matches!(err, BalanceError::ElementMismatch { .. }));
    }

    #[test]
    fn test_linear_dependence() {
        // BaO2 and BaO + O2 span the same space as two unknowns in two elements
        let err = balance(&formulas(&["BaO2", "BaO", "O2"]), &formulas(&["BaO"])).unwrap_err();
        assert!(matches!(err, BalanceError::LinearDependence { .. }));
    }

    #[test]
    fn test_spectator_is_unused() {
        let err = balance(&formulas(&["BaO", "CuO", "O2"]), &formulas(&["BaCuO2"])).unwrap_err();
        assert_eq!(err, BalanceError::UnusedPrecursor);
    }

    #[test]
    fn test_spectator_beside_decomposition_is_unused() {
        // 2 BaO2 -> 2 BaO + O2 with Y2O3 loaded alongside
        let err = balance(&formulas(&["BaO2", "Y2O3"]), &formulas(&["BaO", "O2"])).unwrap_err();
        assert_eq!(err, BalanceError::UnusedPrecursor);
        let err = balance(&formulas(&["Y2O3", "BaO2"]), &formulas(&["BaO", "O2"])).unwrap_err();
        assert_eq!(err, BalanceError::UnusedPrecursor);
    }

    #[test]
    fn test_well_conditioned_solution_is_exact() {
        // Y2O3 + 4 BaCO3 + 6 CuO -> 2 YBa2Cu3O6.5 + 4 CO2 (per product unit)
        let reacs = formulas(&["Y2O3", "BaCO3", "CuO"]);
        let prods = formulas(&["YBa2Cu3O6.5", "CO2"]);
        let coeffs = balance(&reacs, &prods).unwrap();
        for (got, want) in coeffs.reactants().iter().zip([0.5, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-10, "{got} != {want}");
        }
        assert!((coeffs.products()[1] - 2.0).abs() < 1e-10);
        assert!(coeffs.is_mass_balanced(&reacs, &prods, 1e-9));
    }

    #[test]
    fn test_byproduct_must_form() {
        // BaCuO2 -> BaCuO2 + O2 would need zero O2
        let err = balance(&formulas(&["BaCuO2"]), &formulas(&["BaCuO2", "O2"])).unwrap_err();
        assert_eq!(err, BalanceError::ByproductNotFormed);
    }

    #[test]
    fn test_unbalanced() {
        let err = balance(&formulas(&["BaO2", "CuO"]), &formulas(&["BaCuO2"])).unwrap_err();
        assert!(matches!(err, BalanceError::UnbalancedReaction { .. }));
    }

    #[test]
    fn test_uptake_augmentation() {
        // 2 Cu2O + O2 -> 4 CuO needs oxygen uptake
        let (reactants, coeffs) =
            balance_with_uptake(&formulas(&["Cu2O"]), &formulas(&["CuO"])).unwrap();
        assert_eq!(reactants, formulas(&["Cu2O", "O2"]));
        assert!((coeffs.reactants()[0] - 0.5).abs() < 1e-9);
        assert!((coeffs.reactants()[1] - 0.25).abs() < 1e-9);
        assert!(balance_with_uptake(&formulas(&["CuO"]), &formulas(&["BaO"])).is_none());
    }

    #[test]
    fn test_empty_reaction() {
        assert_eq!(balance(&[], &formulas(&["CuO"])).unwrap_err(), BalanceError::EmptyReaction);
        assert_eq!(balance(&formulas(&["CuO"]), &[]).unwrap_err(), BalanceError::EmptyReaction);
    }
}
