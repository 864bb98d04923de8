//! Equations, inequalities and attachable constraint handles.

use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::{ExpressionError, SolverError};
use crate::expression::{minus, Expression};
use crate::variable::Variable;
use crate::EPSILON;

static NEXT_CONSTRAINT_ID: AtomicUsize = AtomicUsize::new(0);
static NEXT_SOLVER_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a solver a constraint can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolverId(usize);

/// The right to attach and detach constraints under one [`SolverId`].
///
/// Every key carries a fresh identity and cannot be cloned, so only the
/// holder of the key a constraint was attached with can release it.
#[derive(Debug)]
pub struct SolverKey(SolverId);

impl SolverKey {
    pub fn new() -> Self {
        Self(SolverId(NEXT_SOLVER_ID.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn id(&self) -> SolverId {
        self.0
    }
}

impl Default for SolverKey {
    fn default() -> Self {
        Self::new()
    }
}

/// The operator of an inequality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InequalityOperator {
    LessOrEqual,
    GreaterOrEqual,
}

impl InequalityOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            InequalityOperator::LessOrEqual => "<=",
            InequalityOperator::GreaterOrEqual => ">=",
        }
    }
}

impl FromStr for InequalityOperator {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<=" | "≤" => Ok(InequalityOperator::LessOrEqual),
            ">=" | "≥" => Ok(InequalityOperator::GreaterOrEqual),
            other => Err(ExpressionError::UnknownOperator {
                operator: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for InequalityOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A relation between two expressions.
#[derive(Debug, Clone)]
pub enum Relation {
    /// `lhs == rhs`
    Equation { lhs: Expression, rhs: Expression },
    /// `lhs <= rhs` or `lhs >= rhs`
    Inequality {
        lhs: Expression,
        operator: InequalityOperator,
        rhs: Expression,
    },
}

impl Relation {
    pub fn equation(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Self {
        Relation::Equation {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    pub fn inequality(
        lhs: impl Into<Expression>,
        operator: InequalityOperator,
        rhs: impl Into<Expression>,
    ) -> Self {
        Relation::Inequality {
            lhs: lhs.into(),
            operator,
            rhs: rhs.into(),
        }
    }

    /// The normalized form `lhs - rhs`, compared against zero.
    pub fn expression(&self) -> Expression {
        match self {
            Relation::Equation { lhs, rhs } | Relation::Inequality { lhs, rhs, .. } => {
                minus(lhs, rhs)
            }
        }
    }

    /// Variables referenced by the normalized form.
    pub fn variables(&self) -> Vec<Variable> {
        self.expression().terms().map(|(var, _)| var.clone()).collect()
    }

    /// Check the relation against the current variable values.
    pub fn is_satisfied(&self) -> bool {
        let difference = self.expression().evaluate();
        match self {
            Relation::Equation { .. } => difference.abs() <= EPSILON,
            Relation::Inequality { operator, .. } => match operator {
                InequalityOperator::LessOrEqual => difference <= EPSILON,
                InequalityOperator::GreaterOrEqual => difference >= -EPSILON,
            },
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Equation { lhs, rhs } => write!(f, "{} == {}", lhs, rhs),
            Relation::Inequality { lhs, operator, rhs } => {
                write!(f, "{} {} {}", lhs, operator, rhs)
            }
        }
    }
}

#[derive(Debug)]
struct ConstraintData {
    id: usize,
    relation: Relation,
    owner: Cell<Option<SolverId>>,
}

/// A shareable handle around one relation.
///
/// A constraint is either detached or attached to exactly one solver. Clones
/// share identity and attachment state.
#[derive(Debug, Clone)]
pub struct Constraint(Rc<ConstraintData>);

impl Constraint {
    pub fn new(relation: Relation) -> Self {
        Self(Rc::new(ConstraintData {
            id: NEXT_CONSTRAINT_ID.fetch_add(1, Ordering::Relaxed),
            relation,
            owner: Cell::new(None),
        }))
    }

    /// `lhs == rhs`
    pub fn equation(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Self {
        Self::new(Relation::equation(lhs, rhs))
    }

    /// `lhs <op> rhs`
    pub fn inequality(
        lhs: impl Into<Expression>,
        operator: InequalityOperator,
        rhs: impl Into<Expression>,
    ) -> Self {
        Self::new(Relation::inequality(lhs, operator, rhs))
    }

    /// `lhs <= rhs`
    pub fn less_or_equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Self {
        Self::inequality(lhs, InequalityOperator::LessOrEqual, rhs)
    }

    /// `lhs >= rhs`
    pub fn greater_or_equal(lhs: impl Into<Expression>, rhs: impl Into<Expression>) -> Self {
        Self::inequality(lhs, InequalityOperator::GreaterOrEqual, rhs)
    }

    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn relation(&self) -> &Relation {
        &self.0.relation
    }

    pub fn is_satisfied(&self) -> bool {
        self.0.relation.is_satisfied()
    }

    pub fn owner(&self) -> Option<SolverId> {
        self.0.owner.get()
    }

    pub fn is_attached(&self) -> bool {
        self.0.owner.get().is_some()
    }

    /// Record that the holder of `key` now holds this constraint.
    pub fn attach(&self, key: &SolverKey) -> Result<(), SolverError> {
        match self.0.owner.get() {
            None => {
                self.0.owner.set(Some(key.id()));
                Ok(())
            }
            Some(owner) if owner == key.id() => Err(SolverError::DuplicateConstraint),
            Some(_) => Err(SolverError::DoubleAttach),
        }
    }

    /// Release the constraint. Only the key it was attached with can do so.
    pub fn detach(&self, key: &SolverKey) -> Result<(), SolverError> {
        match self.0.owner.get() {
            Some(owner) if owner == key.id() => {
                self.0.owner.set(None);
                Ok(())
            }
            _ => Err(SolverError::UnknownConstraint),
        }
    }
}

impl From<Relation> for Constraint {
    fn from(relation: Relation) -> Self {
        Self::new(relation)
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Constraint {}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.relation.fmt(f)
    }
}
