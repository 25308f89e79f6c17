//! Known intermediate phase assemblages
//!
//! Two experiments that pass through the same intermediates in similar
//! proportions will behave the same at higher temperature, so the second is
//! skipped as redundant.

use rustc_hash::FxHashMap;

use crate::composition::Formula;
use crate::{Error, Result};

/// Absolute weight-fraction tolerance for two assemblages to match.
pub const REDUNDANCY_TOLERANCE: f64 = 0.1;

/// Observations of one phase assemblage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateRecord {
    /// Every weight-fraction vector seen for this assemblage
    pub amounts: Vec<Vec<f64>>,
    /// Whether any of them went on to form the pure target
    pub success: bool,
}

/// Sort phases by formula, carrying their weight fractions along.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `phases` and `weights` differ in length.
pub fn sorted_assemblage(phases: &[Formula], weights: &[f64]) -> Result<(Vec<Formula>, Vec<f64>)> {
    if phases.len() != weights.len() {
        return Err(Error::InvalidInput(format!(
            "{} phases but {} weight fractions",
            phases.len(),
            weights.len()
        )));
    }
    let mut pairs: Vec<(Formula, f64)> = phases.iter().cloned().zip(weights.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    Ok(pairs.into_iter().unzip())
}

/// Intermediate assemblages seen during a campaign.
#[derive(Debug, Clone, Default)]
pub struct KnownIntermediates {
    records: FxHashMap<Vec<Formula>, IntermediateRecord>,
}

impl KnownIntermediates {
    /// Empty record set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `phases` were already seen with every weight fraction within
    /// [`REDUNDANCY_TOLERANCE`] of `weights`. Both slices must already be in
    /// [`sorted_assemblage`] order.
    #[must_use]
    pub fn is_redundant(&self, phases: &[Formula], weights: &[f64]) -> bool {
        self.records.get(phases).is_some_and(|record| {
            record.amounts.iter().any(|past| {
                past.len() == weights.len()
                    && past
                        .iter()
                        .zip(weights)
                        .all(|(a, b)| (a - b).abs() <= REDUNDANCY_TOLERANCE)
            })
        })
    }

    /// Record an assemblage and whether its precursor set reached the target.
    pub fn record(&mut self, phases: Vec<Formula>, weights: Vec<f64>, success: bool) {
        let record = self.records.entry(phases).or_default();
        record.amounts.push(weights);
        record.success |= success;
    }

    /// Record for `phases`, if any.
    #[must_use]
    pub fn get(&self, phases: &[Formula]) -> Option<&IntermediateRecord> {
        self.records.get(phases)
    }

    /// Number of distinct assemblages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redundancy_tolerance() {
        let phases = Formula::parse_all(&["BaCuO2", "Y2O3"]).unwrap();
        let mut known = KnownIntermediates::new();
        known.record(phases.clone(), vec![0.6, 0.4], false);

        assert!(known.is_redundant(&phases, &[0.65, 0.35]));
        assert!(!known.is_redundant(&phases, &[0.75, 0.25]));
        assert!(!known.is_redundant(&phases[..1], &[1.0]));
    }

    #[test]
    fn test_success_is_sticky() {
        let phases = Formula::parse_all(&["BaCuO2"]).unwrap();
        let mut known = KnownIntermediates::new();
        known.record(phases.clone(), vec![1.0], true);
        known.record(phases.clone(), vec![1.0], false);
        let record = known.get(&phases).unwrap();
        assert!(record.success);
        assert_eq!(record.amounts.len(), 2);
    }

    #[test]
    fn test_sorted_assemblage() {
        let phases = Formula::parse_all(&["Y2O3", "BaCuO2"]).unwrap();
        let (sorted, weights) = sorted_assemblage(&phases, &[0.3, 0.7]).unwrap();
        assert_eq!(sorted[0].as_str(), "BaCuO2");
        assert_eq!(weights, vec![0.7, 0.3]);
    }

    #[test]
    fn test_sorted_assemblage_length_mismatch() {
        let phases = Formula::parse_all(&["Y2O3", "BaCuO2"]).unwrap();
        let err = sorted_assemblage(&phases, &[1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(sorted_assemblage(&phases[..1], &[0.5, 0.5]).is_err());
    }
}
