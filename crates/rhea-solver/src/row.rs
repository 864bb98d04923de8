//! Tableau rows.

use std::collections::BTreeMap;
use std::fmt;

use rhea_core::near_zero;

use crate::symbol::Symbol;

/// A row in the simplex tableau: `constant + Σ(coefficient * symbol)`.
///
/// Cells are kept in symbol order so every scan over a row is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub(crate) constant: f64,
    pub(crate) cells: BTreeMap<Symbol, f64>,
}

impl Row {
    pub fn new(constant: f64) -> Self {
        Self {
            constant,
            cells: BTreeMap::new(),
        }
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn cells(&self) -> impl Iterator<Item = (Symbol, f64)> + '_ {
        self.cells.iter().map(|(&symbol, &coefficient)| (symbol, coefficient))
    }

    pub fn coefficient(&self, symbol: Symbol) -> f64 {
        self.cells.get(&symbol).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.cells.contains_key(&symbol)
    }

    /// Accumulate a coefficient, dropping the cell if it cancels out.
    pub(crate) fn add(&mut self, symbol: Symbol, coefficient: f64) {
        let entry = self.cells.entry(symbol).or_insert(0.0);
        *entry += coefficient;
        if near_zero(*entry) {
            self.cells.remove(&symbol);
        }
    }

    pub(crate) fn insert_symbol(&mut self, symbol: Symbol, coefficient: f64) {
        if near_zero(coefficient) {
            self.cells.remove(&symbol);
        } else {
            self.cells.insert(symbol, coefficient);
        }
    }

    /// Add `coefficient * other` to this row.
    pub(crate) fn insert_row(&mut self, other: &Row, coefficient: f64) {
        self.constant += coefficient * other.constant;
        for (&s, &c) in &other.cells {
            self.add(s, c * coefficient);
        }
    }

    pub(crate) fn remove(&mut self, symbol: Symbol) {
        self.cells.remove(&symbol);
    }

    pub(crate) fn reverse_sign(&mut self) {
        self.constant = -self.constant;
        for c in self.cells.values_mut() {
            *c = -*c;
        }
    }

    /// Substitute a symbol in this row with another row.
    pub(crate) fn substitute(&mut self, symbol: Symbol, row: &Row) {
        if let Some(coeff) = self.cells.remove(&symbol) {
            self.insert_row(row, coeff);
        }
    }

    /// Solve `0 = self` for `symbol`, leaving `symbol = self`.
    pub(crate) fn solve_for(&mut self, symbol: Symbol) {
        let coeff = self.cells.remove(&symbol).unwrap_or(1.0);
        let multiplier = -1.0 / coeff;
        self.constant *= multiplier;
        for c in self.cells.values_mut() {
            *c *= multiplier;
        }
    }

    /// Rewrite `lhs = self` as `rhs = ...`.
    pub(crate) fn solve_for_symbols(&mut self, lhs: Symbol, rhs: Symbol) {
        self.insert_symbol(lhs, -1.0);
        self.solve_for(rhs);
    }

    /// True when every cell is a dummy, including the empty row.
    pub(crate) fn all_dummies(&self) -> bool {
        self.cells.keys().all(Symbol::is_dummy)
    }

    /// Value of the row given values for its parametric symbols.
    pub(crate) fn evaluate(&self, value_of: impl Fn(Symbol) -> f64) -> f64 {
        self.cells
            .iter()
            .fold(self.constant, |acc, (&s, &c)| acc + c * value_of(s))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constant)?;
        for (symbol, coefficient) in &self.cells {
            if *coefficient < 0.0 {
                write!(f, " - {}*{}", -coefficient, symbol)?;
            } else {
                write!(f, " + {}*{}", coefficient, symbol)?;
            }
        }
        Ok(())
    }
}
