//! Tableau symbols.

use std::fmt;

/// A column or row label in the tableau.
///
/// The derived ordering (externals first, then by kind and id) is the fixed
/// total order used for Bland's rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// A client variable, keyed by its id. Unrestricted in sign.
    External(usize),
    /// A slack variable for an inequality. Always >= 0.
    Slack(usize),
    /// A marker for an equality. Fixed at 0.
    Dummy(usize),
    /// A phase-one variable. Always >= 0 and never outlives the insertion
    /// that created it.
    Artificial(usize),
}

impl Symbol {
    pub fn is_external(&self) -> bool {
        matches!(self, Symbol::External(_))
    }

    pub fn is_slack(&self) -> bool {
        matches!(self, Symbol::Slack(_))
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, Symbol::Dummy(_))
    }

    pub fn is_artificial(&self) -> bool {
        matches!(self, Symbol::Artificial(_))
    }

    /// Sign-restricted symbols must keep a non-negative value.
    pub fn is_restricted(&self) -> bool {
        self.is_slack() || self.is_artificial()
    }

    /// Whether the symbol may enter the basis during optimization.
    pub fn is_pivotable(&self) -> bool {
        !self.is_dummy()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::External(id) => write!(f, "v{}", id),
            Symbol::Slack(id) => write!(f, "s{}", id),
            Symbol::Dummy(id) => write!(f, "d{}", id),
            Symbol::Artificial(id) => write!(f, "a{}", id),
        }
    }
}
