//! The simplex tableau.
//!
//! Each row expresses one basic symbol in terms of the parametric symbols.
//! Client variables enter as unrestricted [`Symbol::External`] columns;
//! inequalities contribute a non-negative slack, equalities a fixed-at-zero
//! dummy marker. Whenever an operation reports success, every basic slack has
//! a non-negative constant and no artificial symbol remains.
//!
//! Rows and cells live in ordered maps. Entering and leaving symbols are
//! always picked as the lowest symbol among the eligible ones (Bland's rule),
//! which rules out cycling on degenerate systems.

use std::collections::BTreeMap;
use std::fmt;

use rhea_core::{near_zero, InequalityOperator, Relation, SolverError};
use tracing::trace;

use crate::row::Row;
use crate::symbol::Symbol;

#[derive(Debug, Clone)]
pub struct Tableau {
    /// Rows keyed by their basic symbol
    rows: BTreeMap<Symbol, Row>,
    /// Counter for internal symbol ids
    symbol_counter: usize,
    epsilon: f64,
}

impl Tableau {
    pub fn new(epsilon: f64) -> Self {
        Self {
            rows: BTreeMap::new(),
            symbol_counter: 0,
            epsilon,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = (Symbol, &Row)> {
        self.rows.iter().map(|(&symbol, row)| (symbol, row))
    }

    pub fn row(&self, symbol: Symbol) -> Option<&Row> {
        self.rows.get(&symbol)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_basic(&self, symbol: Symbol) -> bool {
        self.rows.contains_key(&symbol)
    }

    /// Whether the symbol appears anywhere, as a basic or parametric symbol.
    pub fn contains_symbol(&self, symbol: Symbol) -> bool {
        self.is_basic(symbol) || self.rows.values().any(|row| row.contains(symbol))
    }

    /// Current value of a symbol. Parametric symbols sit at zero.
    pub fn value_of(&self, symbol: Symbol) -> f64 {
        self.rows.get(&symbol).map_or(0.0, |row| row.constant)
    }

    /// True when no restricted basic symbol is negative.
    pub fn is_feasible(&self) -> bool {
        self.rows
            .iter()
            .all(|(symbol, row)| !symbol.is_restricted() || row.constant >= -self.epsilon)
    }

    /// Convert a relation into tableau form.
    ///
    /// Returns the marker symbol that tags the relation's row for later
    /// removal. On failure the tableau may be left half-updated; callers keep
    /// a snapshot to restore.
    pub(crate) fn insert_constraint(&mut self, relation: &Relation) -> Result<Symbol, SolverError> {
        let (mut row, marker) = self.create_row(relation);

        if let Some(subject) = self.choose_subject(&row, marker, relation) {
            row.solve_for(subject);
            self.substitute(subject, &row);
            self.rows.insert(subject, row);
        } else if row.all_dummies() {
            if row.constant > self.epsilon {
                return Err(unsatisfiable(relation));
            }
            // Redundant with the attached set: park the row under its marker.
            row.constant = 0.0;
            row.solve_for(marker);
            self.rows.insert(marker, row);
        } else if !self.add_with_artificial(row)? {
            return Err(unsatisfiable(relation));
        }

        trace!(%marker, rows = self.rows.len(), "inserted constraint row");
        Ok(marker)
    }

    /// Drop the row owned by `marker`, pivoting the marker into the basis
    /// first if it is parametric.
    pub(crate) fn remove_marker(&mut self, marker: Symbol) -> Result<(), SolverError> {
        if self.rows.remove(&marker).is_some() {
            return Ok(());
        }

        // A marker that appears nowhere no longer constrains anything.
        if !self.contains_symbol(marker) {
            return Ok(());
        }

        let leaving = self
            .marker_leaving_symbol(marker)
            .ok_or(SolverError::Internal("failed to find leaving row for marker"))?;
        let mut row = self
            .rows
            .remove(&leaving)
            .ok_or(SolverError::Internal("leaving row vanished"))?;
        row.solve_for_symbols(leaving, marker);
        self.substitute(marker, &row);
        Ok(())
    }

    /// Re-establish feasibility after a restricted row went negative.
    ///
    /// Insertion and marker removal keep every restricted row non-negative,
    /// so this only acts as a guard against rounding drift accumulated over
    /// long pivot sequences. Each negative row is taken out of the basis and re-inserted through
    /// phase one, one at a time, so every phase-one run starts feasible.
    pub(crate) fn restore_feasibility(&mut self) -> Result<(), SolverError> {
        let infeasible: Vec<Symbol> = self
            .rows
            .iter()
            .filter(|(symbol, row)| symbol.is_restricted() && row.constant < -self.epsilon)
            .map(|(&symbol, _)| symbol)
            .collect();

        let mut pending = Vec::with_capacity(infeasible.len());
        for symbol in infeasible {
            if let Some(mut row) = self.rows.remove(&symbol) {
                row.insert_symbol(symbol, -1.0);
                pending.push((symbol, row));
            }
        }

        for (symbol, row) in pending {
            trace!(%symbol, "repairing infeasible row");
            let mut row = self.reduce(row);
            if row.constant < 0.0 {
                row.reverse_sign();
            }
            if !self.add_with_artificial(row)? {
                return Err(SolverError::RequiredConstraintFailure {
                    constraint: format!("row for {}", symbol),
                });
            }
        }
        Ok(())
    }

    /// Create a row `lhs - rhs (+/-) marker` with all basic symbols
    /// substituted and a non-negative constant.
    fn create_row(&mut self, relation: &Relation) -> (Row, Symbol) {
        let expression = relation.expression();

        // Rows prune cells below the tolerance, so lift tiny coefficients
        // above it first. A positive factor keeps the relation intact.
        let smallest = expression
            .terms()
            .map(|(_, coefficient)| coefficient.abs())
            .fold(f64::INFINITY, f64::min);
        let scale = if near_zero(smallest) { smallest.recip() } else { 1.0 };

        let mut row = Row::new(expression.constant() * scale);
        for (var, coefficient) in expression.terms() {
            let coefficient = coefficient * scale;
            let symbol = Symbol::External(var.id());
            match self.rows.get(&symbol) {
                Some(basic) => row.insert_row(basic, coefficient),
                None => row.add(symbol, coefficient),
            }
        }

        let marker = match relation {
            Relation::Equation { .. } => {
                let dummy = self.new_symbol(Symbol::Dummy);
                row.insert_symbol(dummy, 1.0);
                dummy
            }
            Relation::Inequality { operator, .. } => {
                let coefficient = match operator {
                    InequalityOperator::LessOrEqual => 1.0,
                    InequalityOperator::GreaterOrEqual => -1.0,
                };
                let slack = self.new_symbol(Symbol::Slack);
                row.insert_symbol(slack, coefficient);
                slack
            }
        };

        if row.constant < 0.0 {
            row.reverse_sign();
        }

        (row, marker)
    }

    /// Pick a basic symbol for a new row without disturbing any other row.
    ///
    /// A fresh external column can take any value, so it is preferred,
    /// non-editable variables first. Otherwise the slack marker works when its
    /// coefficient is negative, since the row constant is non-negative.
    fn choose_subject(&self, row: &Row, marker: Symbol, relation: &Relation) -> Option<Symbol> {
        let mut candidates = relation.variables();
        candidates.sort_by_key(|var| (var.is_editable(), var.id()));

        let fresh = candidates
            .iter()
            .map(|var| Symbol::External(var.id()))
            .find(|&symbol| row.contains(symbol) && !self.contains_symbol(symbol));
        if fresh.is_some() {
            return fresh;
        }

        if marker.is_slack() && row.coefficient(marker) < 0.0 {
            return Some(marker);
        }

        None
    }

    /// Insert `row` behind an artificial symbol and drive it to zero.
    ///
    /// Returns `Ok(false)` if the artificial cannot reach zero, in which case
    /// the row is infeasible together with the rest of the tableau.
    fn add_with_artificial(&mut self, row: Row) -> Result<bool, SolverError> {
        let art = self.new_symbol(Symbol::Artificial);
        self.rows.insert(art, row);
        self.minimize(art)?;

        let residual = self.value_of(art);
        if residual > self.epsilon {
            trace!(%art, residual, "phase one left a positive artificial");
            return Ok(false);
        }

        if let Some(mut row) = self.rows.remove(&art) {
            row.constant = 0.0;
            let entering = row
                .cells
                .keys()
                .copied()
                .find(Symbol::is_pivotable)
                .or_else(|| row.cells.keys().next().copied());
            if let Some(entering) = entering {
                row.solve_for_symbols(art, entering);
                self.substitute(entering, &row);
                self.rows.insert(entering, row);
            }
        }

        // The artificial is parametric at zero now; drop its column.
        for row in self.rows.values_mut() {
            row.remove(art);
        }
        Ok(true)
    }

    /// Minimize the basic symbol `objective` over the feasible region.
    fn minimize(&mut self, objective: Symbol) -> Result<(), SolverError> {
        loop {
            let Some(row) = self.rows.get(&objective) else {
                return Ok(());
            };
            if row.constant <= self.epsilon {
                return Ok(());
            }

            let Some((entering, direction)) = self.entering_symbol(row) else {
                return Ok(());
            };

            let leaving = self
                .leaving_symbol(entering, direction)
                .ok_or(SolverError::Internal("phase-one objective is unbounded"))?;
            self.pivot(entering, leaving);
        }
    }

    /// Lowest symbol whose movement decreases the objective, with the
    /// direction (+1 or -1) it has to move in. Only unrestricted externals
    /// may move downwards.
    fn entering_symbol(&self, objective: &Row) -> Option<(Symbol, f64)> {
        objective.cells().find_map(|(symbol, coefficient)| {
            if symbol.is_restricted() && coefficient < -self.epsilon {
                Some((symbol, 1.0))
            } else if symbol.is_external() && coefficient.abs() > self.epsilon {
                Some((symbol, if coefficient < 0.0 { 1.0 } else { -1.0 }))
            } else {
                None
            }
        })
    }

    /// Minimum-ratio test over the restricted rows that the move decreases.
    /// Ties go to the lowest symbol.
    fn leaving_symbol(&self, entering: Symbol, direction: f64) -> Option<Symbol> {
        let mut best: Option<(Symbol, f64)> = None;

        for (&symbol, row) in &self.rows {
            if !symbol.is_restricted() {
                continue;
            }

            let rate = row.coefficient(entering) * direction;
            if rate < -self.epsilon {
                let ratio = row.constant / -rate;
                if best.map_or(true, |(_, min_ratio)| ratio < min_ratio) {
                    best = Some((symbol, ratio));
                }
            }
        }

        best.map(|(symbol, _)| symbol)
    }

    /// Choose the row a parametric marker should be pivoted in from.
    ///
    /// A dummy row holding the marker wins outright, so dummy rows keep
    /// holding only dummies. Then come restricted rows the marker drives
    /// down (minimum ratio), restricted rows it drives up, and external rows.
    fn marker_leaving_symbol(&self, marker: Symbol) -> Option<Symbol> {
        let dummy = self
            .rows
            .iter()
            .find(|(symbol, row)| symbol.is_dummy() && row.contains(marker))
            .map(|(&symbol, _)| symbol);
        if dummy.is_some() {
            return dummy;
        }

        let mut first: Option<(Symbol, f64)> = None;
        let mut second: Option<(Symbol, f64)> = None;
        let mut third: Option<Symbol> = None;

        for (&symbol, row) in &self.rows {
            let c = row.coefficient(marker);
            if c == 0.0 {
                continue;
            }

            if symbol.is_external() {
                if third.is_none() {
                    third = Some(symbol);
                }
            } else if c < 0.0 {
                let ratio = -row.constant / c;
                if first.map_or(true, |(_, min_ratio)| ratio < min_ratio) {
                    first = Some((symbol, ratio));
                }
            } else {
                let ratio = row.constant / c;
                if second.map_or(true, |(_, min_ratio)| ratio < min_ratio) {
                    second = Some((symbol, ratio));
                }
            }
        }

        first.or(second).map(|(symbol, _)| symbol).or(third)
    }

    /// Exchange a parametric and a basic symbol.
    fn pivot(&mut self, entering: Symbol, leaving: Symbol) {
        if let Some(mut row) = self.rows.remove(&leaving) {
            trace!(%entering, %leaving, "pivot");
            row.solve_for_symbols(leaving, entering);
            self.substitute(entering, &row);
            self.rows.insert(entering, row);
        }
    }

    /// Substitute a symbol throughout the tableau.
    fn substitute(&mut self, symbol: Symbol, row: &Row) {
        for r in self.rows.values_mut() {
            r.substitute(symbol, row);
        }
    }

    /// Replace every basic symbol in `row` by its defining row.
    fn reduce(&self, mut row: Row) -> Row {
        let basic: Vec<Symbol> = row
            .cells
            .keys()
            .copied()
            .filter(|symbol| self.rows.contains_key(symbol))
            .collect();
        for symbol in basic {
            if let Some(definition) = self.rows.get(&symbol) {
                row.substitute(symbol, definition);
            }
        }
        row
    }

    fn new_symbol(&mut self, kind: fn(usize) -> Symbol) -> Symbol {
        let id = self.symbol_counter;
        self.symbol_counter += 1;
        kind(id)
    }
}

fn unsatisfiable(relation: &Relation) -> SolverError {
    SolverError::RequiredConstraintFailure {
        constraint: relation.to_string(),
    }
}

impl fmt::Display for Tableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (symbol, row) in &self.rows {
            writeln!(f, "{} = {}", symbol, row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhea_core::{minus, plus, Variable, EPSILON};

    fn external(var: &Variable) -> Symbol {
        Symbol::External(var.id())
    }

    #[test]
    fn test_fresh_external_becomes_basic() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);

        // x == 100
        let marker = tableau
            .insert_constraint(&Relation::equation(&x, 100.0))
            .unwrap();

        assert!(marker.is_dummy());
        assert!(tableau.is_basic(external(&x)));
        assert!((tableau.value_of(external(&x)) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_editable_variable_preferred_as_subject() {
        let mut tableau = Tableau::new(EPSILON);
        let width = Variable::new(0.0).editable();
        let height = Variable::new(0.0);

        // width == 2 * height
        tableau
            .insert_constraint(&Relation::equation(&width, 2.0 * &height))
            .unwrap();

        assert!(tableau.is_basic(external(&height)));
        assert!(!tableau.is_basic(external(&width)));
    }

    #[test]
    fn test_slack_marker_becomes_basic() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);

        tableau
            .insert_constraint(&Relation::equation(&x, 10.0))
            .unwrap();
        // x >= 4 once x is already basic at 10
        let marker = tableau
            .insert_constraint(&Relation::inequality(
                &x,
                InequalityOperator::GreaterOrEqual,
                4.0,
            ))
            .unwrap();

        assert!(marker.is_slack());
        assert!(tableau.is_basic(marker));
        assert!((tableau.value_of(marker) - 6.0).abs() < 1e-9);
        assert!(tableau.is_feasible());
    }

    #[test]
    fn test_redundant_equality_is_parked() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);

        tableau
            .insert_constraint(&Relation::equation(&x, 1.0))
            .unwrap();
        let marker = tableau
            .insert_constraint(&Relation::equation(&x, 1.0))
            .unwrap();

        assert!(tableau.is_basic(marker));
        assert_eq!(tableau.value_of(marker), 0.0);
    }

    #[test]
    fn test_conflicting_constants_rejected() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);

        tableau
            .insert_constraint(&Relation::equation(&x, 1.0))
            .unwrap();
        let err = tableau
            .insert_constraint(&Relation::equation(&x, 2.0))
            .unwrap_err();
        assert!(matches!(err, SolverError::RequiredConstraintFailure { .. }));
    }

    #[test]
    fn test_phase_one_moves_parametric_external() {
        let mut tableau = Tableau::new(EPSILON);
        let v1 = Variable::new(0.0);
        let v2 = Variable::new(0.0);

        // v1 - 1 == v2 makes v1 basic with v2 parametric at zero.
        tableau
            .insert_constraint(&Relation::equation(minus(&v1, 1.0), &v2))
            .unwrap();
        // v1 >= 2 needs v2 to move, which only phase one can do.
        tableau
            .insert_constraint(&Relation::inequality(
                &v1,
                InequalityOperator::GreaterOrEqual,
                2.0,
            ))
            .unwrap();

        assert!(tableau.is_feasible());
        assert!(tableau.rows().all(|(symbol, _)| !symbol.is_artificial()));
        assert!(tableau.value_of(external(&v1)) >= 2.0 - 1e-9);
        assert!(
            (tableau.value_of(external(&v1)) - 1.0 - tableau.value_of(external(&v2))).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_phase_one_detects_infeasibility() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);

        tableau
            .insert_constraint(&Relation::inequality(
                &x,
                InequalityOperator::GreaterOrEqual,
                3.0,
            ))
            .unwrap();
        let err = tableau
            .insert_constraint(&Relation::inequality(
                &x,
                InequalityOperator::LessOrEqual,
                1.0,
            ))
            .unwrap_err();
        assert!(matches!(err, SolverError::RequiredConstraintFailure { .. }));
    }

    #[test]
    fn test_remove_basic_marker() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);

        tableau
            .insert_constraint(&Relation::equation(&x, 10.0))
            .unwrap();
        let marker = tableau
            .insert_constraint(&Relation::inequality(
                &x,
                InequalityOperator::LessOrEqual,
                20.0,
            ))
            .unwrap();
        let rows = tableau.len();

        tableau.remove_marker(marker).unwrap();
        assert_eq!(tableau.len(), rows - 1);
        assert!(!tableau.contains_symbol(marker));
    }

    #[test]
    fn test_remove_parametric_marker() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);
        let y = Variable::new(0.0);

        let lower = tableau
            .insert_constraint(&Relation::inequality(
                &x,
                InequalityOperator::GreaterOrEqual,
                2.0,
            ))
            .unwrap();
        let link = tableau
            .insert_constraint(&Relation::equation(&y, plus(&x, 5.0)))
            .unwrap();
        assert!(!tableau.is_basic(link));

        tableau.remove_marker(link).unwrap();
        assert!(!tableau.contains_symbol(link));
        assert!(tableau.contains_symbol(lower));
        assert!(tableau.value_of(external(&x)) >= 2.0 - 1e-9);
        assert!(tableau.is_feasible());
    }

    #[test]
    fn test_remove_equality_with_redundant_twin() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);

        let first = tableau
            .insert_constraint(&Relation::equation(&x, 1.0))
            .unwrap();
        let twin = tableau
            .insert_constraint(&Relation::equation(&x, 1.0))
            .unwrap();
        tableau
            .insert_constraint(&Relation::inequality(
                &x,
                InequalityOperator::LessOrEqual,
                5.0,
            ))
            .unwrap();

        tableau.remove_marker(first).unwrap();
        assert!(tableau.contains_symbol(twin));
        assert!((tableau.value_of(external(&x)) - 1.0).abs() < 1e-9);
        for (symbol, row) in tableau.rows() {
            if symbol.is_dummy() {
                assert!(row.all_dummies());
            }
        }
    }

    #[test]
    fn test_restore_feasibility_repairs_negative_slack() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Symbol::External(0);
        let slack = tableau.new_symbol(Symbol::Slack);

        // slack = -2 + x, i.e. x - 2 >= 0 with x parked at zero.
        let mut row = Row::new(-2.0);
        row.insert_symbol(x, 1.0);
        tableau.rows.insert(slack, row);
        assert!(!tableau.is_feasible());

        tableau.restore_feasibility().unwrap();
        assert!(tableau.is_feasible());
        assert!((tableau.value_of(x) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_pivots_terminate() {
        let mut tableau = Tableau::new(EPSILON);
        let vars: Vec<Variable> = (0..6).map(|_| Variable::new(0.0)).collect();

        // A ring of x_i <= x_{i+1} plus a shared zero bound produces many
        // ties at ratio zero.
        for pair in vars.windows(2) {
            tableau
                .insert_constraint(&Relation::inequality(
                    &pair[0],
                    InequalityOperator::LessOrEqual,
                    &pair[1],
                ))
                .unwrap();
        }
        tableau
            .insert_constraint(&Relation::inequality(
                &vars[5],
                InequalityOperator::LessOrEqual,
                &vars[0],
            ))
            .unwrap();
        tableau
            .insert_constraint(&Relation::inequality(
                &vars[0],
                InequalityOperator::GreaterOrEqual,
                0.0,
            ))
            .unwrap();

        assert!(tableau.is_feasible());
    }

    #[test]
    fn test_display_lists_rows() {
        let mut tableau = Tableau::new(EPSILON);
        let x = Variable::new(0.0);
        tableau
            .insert_constraint(&Relation::equation(&x, 3.0))
            .unwrap();

        let dump = tableau.to_string();
        assert_eq!(dump.lines().count(), 1);
        assert!(dump.starts_with(&format!("v{} = 3", x.id())));
    }
}
