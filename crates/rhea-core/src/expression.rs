//! Linear expressions over variables.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use crate::errors::ExpressionError;
use crate::variable::Variable;

/// A linear expression in the form: constant + Σ(coefficient * variable).
///
/// Expressions are immutable once built. Terms are kept in variable order and
/// never hold a zero coefficient.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    constant: f64,
    terms: BTreeMap<Variable, f64>,
}

impl Expression {
    /// Create a constant expression.
    pub fn from_constant(value: f64) -> Self {
        Self {
            constant: value,
            terms: BTreeMap::new(),
        }
    }

    /// Create an expression from a single variable.
    pub fn from_variable(var: Variable) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(var, 1.0);
        Self { constant: 0.0, terms }
    }

    /// Build an expression from explicit terms. Repeated variables are summed.
    pub fn from_terms<I>(terms: I, constant: f64) -> Self
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let mut expr = Self::from_constant(constant);
        for (var, coefficient) in terms {
            expr.add_term(var, coefficient);
        }
        expr
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Get an iterator over the terms, in variable order.
    pub fn terms(&self) -> impl Iterator<Item = (&Variable, f64)> {
        self.terms.iter().map(|(var, &coefficient)| (var, coefficient))
    }

    /// Get the coefficient for a variable.
    pub fn coefficient(&self, var: &Variable) -> f64 {
        self.terms.get(var).copied().unwrap_or(0.0)
    }

    /// True when the expression carries no variable terms.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate against the current variable values.
    pub fn evaluate(&self) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, (var, coefficient)| {
                acc + coefficient * var.value()
            })
    }

    fn add_term(&mut self, var: Variable, coefficient: f64) {
        let total = self.coefficient(&var) + coefficient;
        if total == 0.0 {
            self.terms.remove(&var);
        } else {
            self.terms.insert(var, total);
        }
    }

    fn add_expression(&mut self, other: &Expression, multiplier: f64) {
        self.constant += other.constant * multiplier;
        for (var, &coefficient) in &other.terms {
            self.add_term(var.clone(), coefficient * multiplier);
        }
    }

    fn scaled(&self, scalar: f64) -> Self {
        let mut expr = Self::from_constant(self.constant * scalar);
        for (var, &coefficient) in &self.terms {
            expr.add_term(var.clone(), coefficient * scalar);
        }
        expr
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Self::from_constant(value)
    }
}

impl From<Variable> for Expression {
    fn from(var: Variable) -> Self {
        Self::from_variable(var)
    }
}

impl From<&Variable> for Expression {
    fn from(var: &Variable) -> Self {
        Self::from_variable(var.clone())
    }
}

impl From<&Expression> for Expression {
    fn from(expr: &Expression) -> Self {
        expr.clone()
    }
}

/// `a + b`.
pub fn plus(a: impl Into<Expression>, b: impl Into<Expression>) -> Expression {
    let mut result = a.into();
    result.add_expression(&b.into(), 1.0);
    result
}

/// `a - b`.
pub fn minus(a: impl Into<Expression>, b: impl Into<Expression>) -> Expression {
    let mut result = a.into();
    result.add_expression(&b.into(), -1.0);
    result
}

/// `a * b`, where at least one side must be a constant.
pub fn times(
    a: impl Into<Expression>,
    b: impl Into<Expression>,
) -> Result<Expression, ExpressionError> {
    let (a, b) = (a.into(), b.into());
    if a.is_constant() {
        Ok(b.scaled(a.constant))
    } else if b.is_constant() {
        Ok(a.scaled(b.constant))
    } else {
        Err(ExpressionError::NonlinearOperation { operation: "times" })
    }
}

/// `a / b`, where `b` must be a non-zero constant.
pub fn divide(
    a: impl Into<Expression>,
    b: impl Into<Expression>,
) -> Result<Expression, ExpressionError> {
    let (a, b) = (a.into(), b.into());
    if !b.is_constant() {
        return Err(ExpressionError::NonlinearOperation { operation: "divide" });
    }
    if b.constant == 0.0 {
        return Err(ExpressionError::DivisionByZero);
    }
    Ok(a.scaled(1.0 / b.constant))
}

impl<T: Into<Expression>> Add<T> for Expression {
    type Output = Expression;

    fn add(self, rhs: T) -> Expression {
        plus(self, rhs)
    }
}

impl<T: Into<Expression>> Sub<T> for Expression {
    type Output = Expression;

    fn sub(self, rhs: T) -> Expression {
        minus(self, rhs)
    }
}

impl<T: Into<Expression>> Add<T> for Variable {
    type Output = Expression;

    fn add(self, rhs: T) -> Expression {
        plus(self, rhs)
    }
}

impl<T: Into<Expression>> Sub<T> for Variable {
    type Output = Expression;

    fn sub(self, rhs: T) -> Expression {
        minus(self, rhs)
    }
}

impl<T: Into<Expression>> Add<T> for &Variable {
    type Output = Expression;

    fn add(self, rhs: T) -> Expression {
        plus(self, rhs)
    }
}

impl<T: Into<Expression>> Sub<T> for &Variable {
    type Output = Expression;

    fn sub(self, rhs: T) -> Expression {
        minus(self, rhs)
    }
}

macro_rules! impl_scalar_ops {
    ($($operand:ty),*) => {
        $(
            impl Add<$operand> for f64 {
                type Output = Expression;

                fn add(self, rhs: $operand) -> Expression {
                    plus(self, rhs)
                }
            }

            impl Sub<$operand> for f64 {
                type Output = Expression;

                fn sub(self, rhs: $operand) -> Expression {
                    minus(self, rhs)
                }
            }

            impl Mul<f64> for $operand {
                type Output = Expression;

                fn mul(self, rhs: f64) -> Expression {
                    Expression::from(self).scaled(rhs)
                }
            }

            impl Mul<$operand> for f64 {
                type Output = Expression;

                fn mul(self, rhs: $operand) -> Expression {
                    Expression::from(rhs).scaled(self)
                }
            }

            impl Neg for $operand {
                type Output = Expression;

                fn neg(self) -> Expression {
                    Expression::from(self).scaled(-1.0)
                }
            }
        )*
    };
}

impl_scalar_ops!(Expression, Variable, &Variable);

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (var, &coefficient) in &self.terms {
            let magnitude = if first {
                if coefficient < 0.0 {
                    write!(f, "-")?;
                }
                coefficient.abs()
            } else {
                let sign = if coefficient < 0.0 { '-' } else { '+' };
                write!(f, " {} ", sign)?;
                coefficient.abs()
            };
            if magnitude == 1.0 {
                write!(f, "{}", var)?;
            } else {
                write!(f, "{}*{}", magnitude, var)?;
            }
            first = false;
        }

        if first {
            write!(f, "{}", self.constant)
        } else if self.constant < 0.0 {
            write!(f, " - {}", -self.constant)
        } else if self.constant > 0.0 {
            write!(f, " + {}", self.constant)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_create_expressions() {
        let v1 = Variable::new(1.0);
        let v2 = Variable::new(2.0);

        let e1 = plus(&v1, &v2);
        let e2 = minus(&v1, &v2);

        assert_eq!(e1.evaluate(), 3.0);
        assert_eq!(e2.evaluate(), -1.0);

        assert_eq!(plus(&v1, 3.0).evaluate(), 4.0);
        assert_eq!(minus(&v1, 3.0).evaluate(), -2.0);
        assert_eq!(times(&v1, 3.0).unwrap().evaluate(), 3.0);
        assert_eq!(divide(&v1, 2.0).unwrap().evaluate(), 0.5);

        assert_eq!(plus(3.0, &v2).evaluate(), 5.0);
        assert_eq!(minus(3.0, &v2).evaluate(), 1.0);
        assert_eq!(times(3.0, &v2).unwrap().evaluate(), 6.0);

        assert_eq!(Expression::from_constant(3.0).evaluate(), 3.0);
        assert_eq!(plus(&v1, &e1).evaluate(), 4.0);
        assert_eq!(plus(&e1, &v1).evaluate(), 4.0);
        assert_eq!(plus(&e1, &e2).evaluate(), 2.0);
    }

    #[test]
    fn test_evaluate_tracks_current_values() {
        let x = Variable::new(1.0);
        let expr = plus(times(&x, 2.0).unwrap(), 1.0);
        assert_eq!(expr.evaluate(), 3.0);

        x.set(10.0);
        assert_eq!(expr.evaluate(), 21.0);
    }

    #[test]
    fn test_zero_coefficients_are_pruned() {
        let x = Variable::new(4.0);
        let y = Variable::new(1.0);

        let cancelled = minus(plus(&x, &y), &x);
        assert_eq!(cancelled.terms().count(), 1);
        assert_eq!(cancelled.coefficient(&x), 0.0);
        assert_eq!(cancelled.coefficient(&y), 1.0);

        let zeroed = times(&x, 0.0).unwrap();
        assert!(zeroed.is_constant());
        assert_eq!(zeroed.evaluate(), 0.0);
    }

    #[test]
    fn test_tiny_coefficients_are_kept() {
        let x = Variable::new(1e9);

        let scaled = times(1e-9, &x).unwrap();
        assert_eq!(scaled.coefficient(&x), 1e-9);
        assert!((scaled.evaluate() - 1.0).abs() < 1e-12);

        let nearly_cancelled = minus(plus(&x, times(1e-12, &x).unwrap()), &x);
        assert!(!nearly_cancelled.is_constant());
    }

    #[test]
    fn test_repeated_terms_are_summed() {
        let x = Variable::new(2.0);
        let expr = Expression::from_terms([(x.clone(), 1.5), (x.clone(), 2.5)], 1.0);
        assert_eq!(expr.coefficient(&x), 4.0);
        assert_eq!(expr.evaluate(), 9.0);
    }

    #[test]
    fn test_nonlinear_product_rejected() {
        let x = Variable::new(1.0);
        let y = Variable::new(2.0);

        assert_eq!(
            times(&x, &y).unwrap_err(),
            ExpressionError::NonlinearOperation { operation: "times" }
        );
        assert_eq!(
            divide(&x, plus(&y, 1.0)).unwrap_err(),
            ExpressionError::NonlinearOperation { operation: "divide" }
        );
    }

    #[test]
    fn test_division_by_zero() {
        let x = Variable::new(1.0);
        assert_eq!(divide(&x, 0.0).unwrap_err(), ExpressionError::DivisionByZero);
        assert_eq!(
            divide(&x, minus(3.0, 3.0)).unwrap_err(),
            ExpressionError::DivisionByZero
        );
    }

    #[test]
    fn test_operator_overloads() {
        let x = Variable::new(3.0);
        let y = Variable::new(5.0);

        let expr = &x * 2.0 + &y - 1.0;
        assert_eq!(expr.evaluate(), 10.0);

        let expr = 10.0 - 2.0 * &y;
        assert_eq!(expr.evaluate(), 0.0);

        let expr = -(x.clone() + y.clone());
        assert_eq!(expr.evaluate(), -8.0);
    }

    #[test]
    fn test_display() {
        let x = Variable::named("x", 0.0);
        let y = Variable::named("y", 0.0);

        insta::assert_snapshot!((plus(&x, times(2.0, &y).unwrap()) - 3.0).to_string(), @"x + 2*y - 3");
        insta::assert_snapshot!((minus(4.0, &x) - &y).to_string(), @"-x - y + 4");
        insta::assert_snapshot!(Expression::from_constant(-2.5).to_string(), @"-2.5");
    }

    proptest! {
        #[test]
        fn linear_combination_evaluates_termwise(
            a in -1.0e3..1.0e3f64,
            b in -1.0e3..1.0e3f64,
            xv in -1.0e3..1.0e3f64,
            yv in -1.0e3..1.0e3f64,
        ) {
            let x = Variable::new(xv);
            let y = Variable::new(yv);
            let expr = plus(times(a, &x).unwrap(), times(b, &y).unwrap());
            let expected = a * xv + b * yv;
            prop_assert!((expr.evaluate() - expected).abs() <= 1e-6 * (1.0 + expected.abs()));
        }

        #[test]
        fn terms_never_hold_zero_coefficients(
            a in -10i32..10,
            b in -10i32..10,
        ) {
            let x = Variable::new(1.0);
            let expr = minus(times(a as f64, &x).unwrap(), times(b as f64, &x).unwrap());
            prop_assert!(expr.terms().all(|(_, c)| c != 0.0));
            prop_assert_eq!(expr.is_constant(), a == b);
        }
    }
}
