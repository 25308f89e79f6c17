//! Balancing and retro-analysis benchmarks
//!
//! - Stoichiometric balancing of a pairwise reaction with gas release
//! - Retro-analysis of a multi-phase outcome
//! - Precursor-set enumeration for a four-element target

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use synthpath::campaign::precursor_sets;
use synthpath::composition::{weight_fractions, Formula};
use synthpath::pairwise::{retroanalyze, ProbedRoutes, ReactionDatabase, RetroRequest};
use synthpath::reactions::balance;

fn formulas(list: &[&str]) -> Vec<Formula> {
    Formula::parse_all(list).unwrap()
}

fn bench_balance(c: &mut Criterion) {
    let reactants = formulas(&["BaO2", "CuO"]);
    let products = formulas(&["BaCuO2", "O2"]);
    c.bench_function("balance_pairwise_release", |b| {
        b.iter(|| balance(black_box(&reactants), black_box(&products)));
    });
}

fn bench_retroanalyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("retroanalyze");
    let cases: [(&str, Vec<Formula>, Vec<Formula>); 2] = [
        ("binary", formulas(&["BaO2", "CuO"]), formulas(&["BaCuO2"])),
        (
            "ternary",
            formulas(&["Y2O3", "BaO2", "CuO"]),
            formulas(&["BaCuO2", "Y2Cu2O5", "Y2O3"]),
        ),
    ];
    for (name, precursors, products) in cases {
        let amounts = vec![1.0; precursors.len()];
        let final_amounts = weight_fractions(&products, &vec![1.0; products.len()]).unwrap();
        let request = RetroRequest {
            precursors,
            initial_amounts: amounts,
            products,
            final_amounts,
            temperature: 800,
            allowed_byproducts: formulas(&["O2", "CO2"]),
            open_system: true,
            enforce_thermo: false,
        };
        let database = ReactionDatabase::new();
        let probed = ProbedRoutes::new();
        group.bench_with_input(BenchmarkId::from_parameter(name), &request, |b, request| {
            b.iter(|| retroanalyze(black_box(request), &database, &probed, None));
        });
    }
    group.finish();
}

fn bench_precursor_sets(c: &mut Criterion) {
    let available = formulas(&["Y2O3", "BaO", "BaO2", "BaCO3", "Cu2O", "CuO", "CuCO3"]);
    let target = formulas(&["Y Ba2 Cu3 O6.5"]);
    let byproducts = formulas(&["O2", "CO2"]);
    c.bench_function("precursor_sets_ybco", |b| {
        b.iter(|| precursor_sets(black_box(&available), &target, &byproducts, None));
    });
}

criterion_group!(benches, bench_balance, bench_retroanalyze, bench_precursor_sets);
criterion_main!(benches);
