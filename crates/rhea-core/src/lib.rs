//! Core types for the Rhea constraint solver.
//!
//! This crate provides the client-facing object model:
//! - [`Variable`]: a shared, mutable real-valued cell
//! - [`Expression`]: an immutable linear combination of variables
//! - [`Relation`] and [`Constraint`]: equations and inequalities between expressions
//! - Error types shared with the solver crate

pub mod constraint;
pub mod errors;
pub mod expression;
pub mod variable;

pub use constraint::{Constraint, InequalityOperator, Relation, SolverId, SolverKey};
pub use errors::*;
pub use expression::{divide, minus, plus, times, Expression};
pub use variable::Variable;

/// Tolerance used for satisfaction checks and tableau cell pruning.
pub const EPSILON: f64 = 1e-8;

/// Near-zero check for floating point values.
pub fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}
