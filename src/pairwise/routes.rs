//! Probed synthesis routes
//!
//! A route is a set of compounds heated to one temperature. Routes are only
//! ever appended during a campaign.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::composition::Formula;

/// Compounds heated together at a temperature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbedRoute {
    compounds: BTreeSet<Formula>,
    temperature: i64,
}

impl ProbedRoute {
    /// Route for `compounds` at `temperature` (duplicates collapse).
    pub fn new<'a>(compounds: impl IntoIterator<Item = &'a Formula>, temperature: i64) -> Self {
        Self {
            compounds: compounds.into_iter().cloned().collect(),
            temperature,
        }
    }

    /// Compounds of the route.
    #[must_use]
    pub const fn compounds(&self) -> &BTreeSet<Formula> {
        &self.compounds
    }

    /// Temperature (°C).
    #[must_use]
    pub const fn temperature(&self) -> i64 {
        self.temperature
    }
}

/// Append-only set of probed routes.
#[derive(Debug, Clone, Default)]
pub struct ProbedRoutes {
    routes: FxHashSet<ProbedRoute>,
}

impl ProbedRoutes {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the route has been probed.
    #[must_use]
    pub fn contains(&self, route: &ProbedRoute) -> bool {
        self.routes.contains(route)
    }

    /// Add a route. Returns false if it was already present.
    pub fn insert(&mut self, route: ProbedRoute) -> bool {
        self.routes.insert(route)
    }

    /// Number of distinct routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True if nothing has been probed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Record an analysed experiment: the precursors, any intermediates
    /// folded from known reactions, and the observed products all count as
    /// probed at `temperature`.
    pub fn record_analysis(
        &mut self,
        precursors: &[Formula],
        intermediates: Option<&[Formula]>,
        products: &[Formula],
        temperature: i64,
    ) {
        self.insert(ProbedRoute::new(precursors, temperature));
        if let Some(intermediates) = intermediates {
            self.insert(ProbedRoute::new(intermediates, temperature));
        }
        // Products count too, which ignores finite reaction times
        self.insert(ProbedRoute::new(products, temperature));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_ignores_order() {
        let a = Formula::parse_all(&["BaO2", "CuO"]).unwrap();
        let b = Formula::parse_all(&["CuO", "Ba2O4"]).unwrap();
        assert_eq!(ProbedRoute::new(&a, 600), ProbedRoute::new(&b, 600));
        assert_ne!(ProbedRoute::new(&a, 600), ProbedRoute::new(&a, 700));
    }

    #[test]
    fn test_record_analysis() {
        let precursors = Formula::parse_all(&["BaO2", "CuO"]).unwrap();
        let products = Formula::parse_all(&["BaCuO2"]).unwrap();
        let mut routes = ProbedRoutes::new();
        routes.record_analysis(&precursors, None, &products, 900);
        assert_eq!(routes.len(), 2);
        assert!(routes.contains(&ProbedRoute::new(&products, 900)));
        assert!(!routes.contains(&ProbedRoute::new(&products, 800)));
    }
}
