//! Error types for synthpath
//!
//! Balancing failures are ordinary outcomes during candidate search and live in
//! their own enum so callers can skip a candidate without unwinding.
//! Everything else funnels into [`Error`].

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a set of reactants and products cannot be balanced.
///
/// None of these are fatal: they signal that no reaction is possible for the
/// candidate under test.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BalanceError {
    /// Products contain an element absent from the reactants
    #[error("Element mismatch: reactants contain [{reactants}], products contain [{products}]")]
    ElementMismatch {
        /// Elements found on the reactant side
        reactants: String,
        /// Elements found on the product side
        products: String,
    },

    /// Stoichiometric matrix is rank deficient
    #[error("Reactants are linearly dependent (rank {rank} < {unknowns} unknowns)")]
    LinearDependence {
        /// Numerical rank of the stoichiometric matrix
        rank: usize,
        /// Number of unknown coefficients
        unknowns: usize,
    },

    /// At least one reactant has a non-positive coefficient, or carries an
    /// element that no product holds
    #[error("Not all precursors participate in the reaction")]
    UnusedPrecursor,

    /// At least one secondary product would be consumed rather than formed
    #[error("Not all byproducts are formed")]
    ByproductNotFormed,

    /// Least-squares residual exceeds tolerance
    #[error("Reaction cannot be balanced (residual {residual:.3e})")]
    UnbalancedReaction {
        /// Sum of squared residuals of the least-squares solution
        residual: f64,
    },

    /// Reactant or product list was empty
    #[error("Reaction must have at least one reactant and one product")]
    EmptyReaction,
}

/// Synthpath error types
#[derive(Error, Debug)]
pub enum Error {
    /// Chemical formula could not be parsed
    #[error("Invalid formula '{formula}': {reason}")]
    InvalidFormula {
        /// Offending input
        formula: String,
        /// What went wrong
        reason: String,
    },

    /// Unsupported atmosphere string (configuration error)
    #[error("Atmosphere must either be air or inert, got '{0}'")]
    Atmosphere(String),

    /// Reaction could not be balanced where a balanced reaction was required
    #[error("Balance error: {0}")]
    Balance(#[from] BalanceError),

    /// Product weight fractions do not sum to 1 or 100
    #[error("Weight fractions sum to {sum}, but they should sum to 100")]
    WeightFractions {
        /// Observed sum
        sum: f64,
    },

    /// Invalid input to an operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reaction database persistence error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Thermodynamic oracle could not provide an energy
    #[error("Thermodynamic data unavailable: {0}")]
    Thermo(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
