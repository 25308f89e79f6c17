//! Property-based tests for synthpath
//!
//! - Balanced reactions conserve every element
//! - Exact consumption yields the stoichiometric product amounts
//! - Database reports keep `lower < upper` under any update sequence
//! - Redundancy detection honours the 10% weight-fraction tolerance
//!
//! Run with `ProptestConfig::with_cases(100)`.

use proptest::prelude::*;
use synthpath::campaign::KnownIntermediates;
use synthpath::composition::Formula;
use synthpath::pairwise::{ReactantKey, ReactionDatabase};
use synthpath::reactions::{apply_reaction, balance};

fn formulas(list: &[&str]) -> Vec<Formula> {
    Formula::parse_all(list).unwrap()
}

#[derive(Debug, Clone)]
enum Update {
    Inert(i64),
    Reacts { temperature: i64, oxidized: bool },
    MakeGlobal,
}

fn arb_update() -> impl Strategy<Value = Update> {
    prop_oneof![
        (1i64..2500).prop_map(Update::Inert),
        (1i64..2500, any::<bool>()).prop_map(|(temperature, oxidized)| Update::Reacts { temperature, oxidized }),
        Just(Update::MakeGlobal),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: BaO + CuO balance to any Ba(a)Cu(b)O(a+b) with coefficients in ratio a:b
    #[test]
    fn prop_mixed_oxide_balances(a in 1u32..6, b in 1u32..6) {
        let target = Formula::parse(&format!("Ba{a}Cu{b}O{}", a + b)).unwrap();
        let reactants = formulas(&["BaO", "CuO"]);
        let products = vec![target];
        let coeffs = balance(&reactants, &products).unwrap();

        prop_assert!(coeffs.is_mass_balanced(&reactants, &products, 1e-6));
        let ratio = coeffs.reactants()[0] / coeffs.reactants()[1];
        prop_assert!((ratio - f64::from(a) / f64::from(b)).abs() < 1e-6);
    }

    /// Property: peroxide routes release oxygen and still conserve mass
    #[test]
    fn prop_oxygen_release_conserves_mass(a in 1u32..6, b in 1u32..6) {
        let target = Formula::parse(&format!("Ba{a}Cu{b}O{}", a + b)).unwrap();
        let reactants = formulas(&["BaO2", "CuO"]);
        let products = vec![target, Formula::o2()];
        let coeffs = balance(&reactants, &products).unwrap();

        prop_assert!(coeffs.is_mass_balanced(&reactants, &products, 1e-6));
        prop_assert!(coeffs.products()[1] > 0.0);
    }

    /// Property: available == required consumes both reactants exactly
    #[test]
    fn prop_exact_consumption(scale in 0.1f64..10.0) {
        let out = apply_reaction(
            &formulas(&["BaO2", "CuO"]),
            &[scale, scale],
            &[1.0, 1.0],
            &formulas(&["BaCuO2", "O2"]),
            &[1.0, 0.5],
        )
        .unwrap();

        let expected = formulas(&["BaCuO2", "O2"]);
        prop_assert_eq!(out.compounds(), expected.as_slice());
        prop_assert!((out.amounts()[0] - scale).abs() <= 1e-3);
        prop_assert!((out.amounts()[1] - 0.5 * scale).abs() <= 1e-3);
    }

    /// Property: every stored report satisfies lower < upper
    #[test]
    fn prop_database_interval_invariant(updates in proptest::collection::vec(arb_update(), 1..20)) {
        let key = ReactantKey::new(&formulas(&["BaO2", "CuO"]));
        let plain = formulas(&["BaCuO2", "O2"]).into_iter().collect::<std::collections::BTreeSet<_>>();
        let rich = formulas(&["BaCuO3"]).into_iter().collect::<std::collections::BTreeSet<_>>();
        let mut db = ReactionDatabase::new();

        for update in updates {
            let uppers_before: Vec<i64> = db.as_sorted_list(false).iter().map(|r| r.upper).collect();
            match update {
                Update::Inert(temperature) => {
                    db.record_inert(&key, temperature);
                }
                Update::Reacts { temperature, oxidized: true } => {
                    db.record_reaction(key.clone(), rich.clone(), temperature);
                }
                Update::Reacts { temperature, oxidized: false } => {
                    db.record_reaction(key.clone(), plain.clone(), temperature);
                }
                Update::MakeGlobal => {
                    db.make_global();
                    let uppers_after: Vec<i64> = db.as_sorted_list(false).iter().map(|r| r.upper).collect();
                    prop_assert_eq!(uppers_before, uppers_after);
                }
            }
            for report in db.reports(&key).unwrap_or_default() {
                prop_assert!(report.bounds.lower < report.bounds.upper, "{:?}", report.bounds);
            }
        }
    }

    /// Property: weight-fraction vectors within 0.1 everywhere are redundant
    #[test]
    fn prop_redundancy_within_tolerance(
        weights in proptest::collection::vec(0.0f64..1.0, 1..5),
        shifts in proptest::collection::vec(-0.09f64..0.09, 5),
    ) {
        let phases: Vec<Formula> = formulas(&["BaCuO2", "BaO2", "CuO", "Y2O3", "Y2Cu2O5"])[..weights.len()].to_vec();
        let mut known = KnownIntermediates::new();
        known.record(phases.clone(), weights.clone(), false);

        let near: Vec<f64> = weights.iter().zip(&shifts).map(|(w, s)| w + s).collect();
        prop_assert!(known.is_redundant(&phases, &near));
    }

    /// Property: a single component off by more than 0.1 is not redundant
    #[test]
    fn prop_redundancy_outside_tolerance(
        weights in proptest::collection::vec(0.0f64..1.0, 1..5),
        index in 0usize..5,
        offset in 0.11f64..0.5,
    ) {
        let phases: Vec<Formula> = formulas(&["BaCuO2", "BaO2", "CuO", "Y2O3", "Y2Cu2O5"])[..weights.len()].to_vec();
        let mut known = KnownIntermediates::new();
        known.record(phases.clone(), weights.clone(), false);

        let mut far = weights.clone();
        far[index % weights.len()] += offset;
        prop_assert!(!known.is_redundant(&phases, &far));
    }
}
