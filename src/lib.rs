//! # synthpath: Pairwise Reaction-Pathway Inference
//!
//! synthpath drives autonomous solid-state synthesis campaigns. It learns
//! which pairs of phases react, at what temperature and to which products,
//! from the outcomes of heating experiments, and uses that knowledge to
//! re-rank the precursor sets still to be tried for a target phase.
//!
//! ## Layers
//!
//! - [`composition`]: formula parsing and canonical reduced formulas
//! - [`reactions`]: stoichiometric balancing, amount propagation, energetics
//! - [`pairwise`]: retro-analysis, the pairwise reaction database, evolution
//! - [`campaign`]: precursor-set enumeration, ranking, the experiment loop
//!
//! ## Example
//!
//! ```rust
//! use synthpath::composition::Formula;
//! use synthpath::pairwise::{retroanalyze, ProbedRoutes, ReactionDatabase, RetroMessage, RetroRequest};
//!
//! let request = RetroRequest {
//!     precursors: Formula::parse_all(&["BaO2", "CuO"])?,
//!     initial_amounts: vec![1.0, 1.0],
//!     products: Formula::parse_all(&["BaCuO2"])?,
//!     final_amounts: vec![1.0],
//!     temperature: 900,
//!     allowed_byproducts: Formula::parse_all(&["O2"])?,
//!     open_system: true,
//!     enforce_thermo: false,
//! };
//! let mut database = ReactionDatabase::new();
//! let outcome = retroanalyze(&request, &database, &ProbedRoutes::new(), None)?;
//! assert_eq!(outcome.message, RetroMessage::FullyDetermined);
//! assert!(database.update(&outcome, 900));
//! # Ok::<(), synthpath::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod campaign;
pub mod composition;
pub mod config;
pub mod error;
pub mod experiment;
pub mod pairwise;
pub mod reactions;

pub use error::{BalanceError, Error, Result};
