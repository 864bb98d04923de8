//! High-level solver interface.
//!
//! The [`SimplexSolver`] owns a [`Tableau`], tracks which constraints are
//! attached to it and which variables they mention, and writes solved values
//! back into those variables.

use indexmap::IndexMap;
use rhea_core::{Constraint, SolverError, SolverId, SolverKey, Variable};
use tracing::debug;

use crate::config::SolverConfig;
use crate::symbol::Symbol;
use crate::tableau::Tableau;

/// An incremental solver for required linear constraints.
///
/// Every mutating call either succeeds completely or leaves the tableau
/// exactly as it was before the call.
#[derive(Debug)]
pub struct SimplexSolver {
    key: SolverKey,
    config: SolverConfig,
    tableau: Tableau,
    /// Attached constraints and their marker symbols
    constraints: IndexMap<Constraint, Symbol>,
    /// Variables referenced by attached constraints, keyed by id, with the
    /// number of constraints referencing each
    variables: IndexMap<usize, (Variable, usize)>,
}

impl Default for SimplexSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplexSolver {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            key: SolverKey::new(),
            config,
            tableau: Tableau::new(config.epsilon),
            constraints: IndexMap::new(),
            variables: IndexMap::new(),
        }
    }

    pub fn id(&self) -> SolverId {
        self.key.id()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    pub fn has_constraint(&self, constraint: &Constraint) -> bool {
        self.constraints.contains_key(constraint)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Attached constraints, in the order they were added.
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.keys()
    }

    /// Attach a constraint.
    ///
    /// Fails with [`SolverError::RequiredConstraintFailure`] if the constraint
    /// cannot hold together with the attached set; the solver is then left
    /// untouched.
    pub fn add_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        constraint.attach(&self.key)?;

        let snapshot = self.tableau.clone();
        let marker = match self.tableau.insert_constraint(constraint.relation()) {
            Ok(marker) => marker,
            Err(err) => {
                self.tableau = snapshot;
                constraint.detach(&self.key)?;
                debug!(constraint = %constraint, error = %err, "rejected constraint");
                return Err(err);
            }
        };

        for var in constraint.relation().variables() {
            self.variables
                .entry(var.id())
                .or_insert_with(|| (var.clone(), 0))
                .1 += 1;
        }
        self.constraints.insert(constraint.clone(), marker);

        debug!(
            constraint = %constraint,
            %marker,
            rows = self.tableau.len(),
            "added constraint"
        );
        Ok(())
    }

    /// Attach several constraints, stopping at the first failure.
    ///
    /// Constraints attached before the failing one stay attached.
    pub fn add_constraints<'a, I>(&mut self, constraints: I) -> Result<(), SolverError>
    where
        I: IntoIterator<Item = &'a Constraint>,
    {
        for constraint in constraints {
            self.add_constraint(constraint)?;
        }
        Ok(())
    }

    /// Detach a constraint previously attached to this solver.
    pub fn remove_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        let Some(&marker) = self.constraints.get(constraint) else {
            return Err(SolverError::UnknownConstraint);
        };

        constraint.detach(&self.key)?;

        let snapshot = self.tableau.clone();
        let removed = self.tableau.remove_marker(marker);
        if let Err(err) = removed.and_then(|()| self.tableau.restore_feasibility()) {
            self.tableau = snapshot;
            constraint.attach(&self.key)?;
            debug!(constraint = %constraint, error = %err, "failed to remove constraint");
            return Err(err);
        }

        self.constraints.shift_remove(constraint);
        for var in constraint.relation().variables() {
            if let Some(entry) = self.variables.get_mut(&var.id()) {
                entry.1 -= 1;
                if entry.1 == 0 {
                    self.variables.shift_remove(&var.id());
                }
            }
        }

        debug!(constraint = %constraint, rows = self.tableau.len(), "removed constraint");
        Ok(())
    }

    /// Restore feasibility if needed and write solved values into every
    /// variable referenced by an attached constraint.
    pub fn solve(&mut self) -> Result<(), SolverError> {
        if !self.tableau.is_feasible() {
            let snapshot = self.tableau.clone();
            if let Err(err) = self.tableau.restore_feasibility() {
                self.tableau = snapshot;
                return Err(err);
            }
        }

        self.update_variables();
        debug!(
            constraints = self.constraints.len(),
            variables = self.variables.len(),
            "solved"
        );
        Ok(())
    }

    /// Detach every constraint and clear the tableau.
    pub fn reset(&mut self) {
        self.detach_all();
        self.constraints.clear();
        self.variables.clear();
        self.tableau = Tableau::new(self.config.epsilon);
    }

    /// Write tableau values into the variables.
    ///
    /// Basic variables are read off their rows. Parametric variables keep
    /// whatever value the caller gave them if every slack stays non-negative
    /// under those values; otherwise they fall back to zero and the rows are
    /// read at their constants.
    fn update_variables(&self) {
        let reconcile = self.config.reconcile_overrides;
        let parametric_value = |symbol: Symbol| match symbol {
            Symbol::External(id) if reconcile => {
                self.variables.get(&id).map_or(0.0, |(var, _)| var.value())
            }
            _ => 0.0,
        };

        let keep_overrides = reconcile
            && self
                .tableau
                .rows()
                .filter(|(symbol, _)| symbol.is_restricted())
                .all(|(_, row)| row.evaluate(parametric_value) >= -self.config.epsilon);

        let values: Vec<(&Variable, f64)> = self
            .variables
            .values()
            .filter_map(|(var, _)| match self.tableau.row(Symbol::External(var.id())) {
                Some(row) if keep_overrides => Some((var, row.evaluate(parametric_value))),
                Some(row) => Some((var, row.constant())),
                None if keep_overrides => None,
                None => Some((var, 0.0)),
            })
            .collect();

        for (var, value) in values {
            var.set(value);
        }
    }

    fn detach_all(&self) {
        for constraint in self.constraints.keys() {
            // Every registered constraint was attached with `self.key`.
            let _ = constraint.detach(&self.key);
        }
    }
}

impl Drop for SimplexSolver {
    fn drop(&mut self) {
        self.detach_all();
    }
}
