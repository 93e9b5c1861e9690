//! Incremental linear constraint solving for keel.
//!
//! This crate implements the Cassowary variant of the simplex method, as
//! described in "The Cassowary Linear Arithmetic Constraint Solving
//! Algorithm" by Greg J. Badros and Alan Borning:
//! - Required constraints are satisfied exactly or rejected
//! - Preferred constraints are traded off against each other by weight
//! - Equations can be added and removed one at a time without re-solving
//!   from scratch
//!
//! # Numeric contract
//!
//! Every coefficient and constant comparison uses the single tolerance
//! [`EPSILON`]. Coefficients within it of zero are pruned from rows as soon
//! as they appear, which keeps the basic / non-basic classification of
//! symbols stable across long sequences of incremental edits.

mod equation;
mod row;
mod solver;
mod symbol;
mod tableau;

pub use equation::{Equation, Term};
pub use solver::{EquationKey, Solver, SolverError};

/// Tolerance for floating-point comparisons.
pub const EPSILON: f64 = 1e-8;

/// Near-zero check for floating point values.
pub fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}
