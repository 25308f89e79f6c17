//! Balanced reactions: stoichiometry, amounts and energetics

mod amounts;
mod balancer;
pub mod energetics;

pub use amounts::{apply_reaction, Inventory, CONSUMPTION_TOLERANCE, UNLIMITED_GAS};
pub use balancer::{
    balance, balance_with_uptake, BalancedCoefficients, OXIDANT_AUGMENTATIONS,
    PARTICIPATION_TOLERANCE, RESIDUAL_TOLERANCE,
};
pub use energetics::{Atmosphere, Energetics, TabulatedThermo, ThermoOracle};

/// Non-empty subsets of `items`, smallest first, each in input order.
pub(crate) fn subsets<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    let mut out = Vec::new();
    for size in 1..=items.len() {
        combinations(items, size, 0, &mut Vec::new(), &mut out);
    }
    out
}

/// All `size`-element combinations of `items`, in lexicographic index order.
pub(crate) fn combinations_of<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    let mut out = Vec::new();
    combinations(items, size, 0, &mut Vec::new(), &mut out);
    out
}

fn combinations<T: Clone>(
    items: &[T],
    size: usize,
    start: usize,
    current: &mut Vec<T>,
    out: &mut Vec<Vec<T>>,
) {
    if current.len() == size {
        out.push(current.clone());
        return;
    }
    for (i, item) in items.iter().enumerate().skip(start) {
        current.push(item.clone());
        combinations(items, size, i + 1, current, out);
        current.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsets_order() {
        let sets = subsets(&[1, 2, 3]);
        assert_eq!(
            sets,
            vec![
                vec![1],
                vec![2],
                vec![3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3],
                vec![1, 2, 3]
            ]
        );
        assert!(subsets::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_combinations() {
        assert_eq!(combinations_of(&["a", "b", "c"], 2).len(), 3);
        assert_eq!(combinations_of(&["a", "b"], 3).len(), 0);
    }
}
