//! Rule-based dispatching for discrete-event scheduling simulations.
//!
//! Ranks the activities waiting for a resource by combining many small
//! scoring rules into one composite score, then drives a simulation that
//! always starts the best-ranked activity next.
//!
//! # Modules
//!
//! - **`dispatching`**: The scoring core: `RuleElement`, `RuleRegistry`,
//!   `WeightTable`, `ScoreCache`, `CompositeCalculator`, `DispatchKey`,
//!   `SortedDispatchList` and the built-in rules
//! - **`scheduler`**: `DispatchSimulator`, the discrete-event driver
//! - **`models`**: Domain types: `Activity`, `ActivityPool`, `Resource`,
//!   `FactorScore`, `Schedule`, `Assignment`
//! - **`validation`**: Input integrity checks (duplicate IDs, DAG cycles, resource refs)
//! - **`error`**: `RuleError` and the crate-level `DispatchError`
//!
//! # Numerics
//!
//! Scores are `rust_decimal::Decimal`, so composites, alternate-resource
//! averages and percentage contributions are exact and reproducible.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Blackstone, Phillips & Hogg (1982), "A state-of-the-art survey of
//!   dispatching rules for manufacturing job shop operations"

pub mod dispatching;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod validation;

pub use error::{DispatchError, DispatchResult, RuleError};
