//! Incremental constraint solving for Rhea.
//!
//! This crate implements:
//! - The simplex tableau with slack, dummy and artificial symbols
//! - Two-phase pivoting with Bland's rule for anti-cycling
//! - The [`SimplexSolver`] that attaches constraints and writes solved
//!   values back into variables
//!
//! # Example
//!
//! ```
//! use rhea_core::{minus, Constraint, Variable};
//! use rhea_solver::SimplexSolver;
//!
//! let left = Variable::named("left", 0.0);
//! let right = Variable::named("right", 0.0);
//!
//! let mut solver = SimplexSolver::new();
//! solver.add_constraint(&Constraint::equation(minus(&right, &left), 100.0)).unwrap();
//! solver.add_constraint(&Constraint::greater_or_equal(&left, 20.0)).unwrap();
//! solver.solve().unwrap();
//!
//! assert!((right.value() - left.value() - 100.0).abs() < 1e-8);
//! assert!(left.value() >= 20.0 - 1e-8);
//! ```

mod config;
mod row;
mod solver;
mod symbol;
mod tableau;

pub use config::SolverConfig;
pub use row::Row;
pub use solver::SimplexSolver;
pub use symbol::Symbol;
pub use tableau::Tableau;

pub use rhea_core::{Constraint, SolverError, Variable};
