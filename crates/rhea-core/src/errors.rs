//! Error types for the Rhea solver.

use thiserror::Error;

/// Top-level error type for Rhea.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RheaError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Errors while building expressions and relations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Nonlinear operation: both operands of {operation} contain variables")]
    NonlinearOperation { operation: &'static str },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unknown relational operator: {operator:?}")]
    UnknownOperator { operator: String },
}

/// Errors while attaching, removing or solving constraints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("Required constraint cannot be satisfied: {constraint}")]
    RequiredConstraintFailure { constraint: String },

    #[error("The constraint is not attached to this solver")]
    UnknownConstraint,

    #[error("The constraint is already attached to another solver")]
    DoubleAttach,

    #[error("The constraint is already attached to this solver")]
    DuplicateConstraint,

    #[error("Internal solver error: {0}")]
    Internal(&'static str),
}
