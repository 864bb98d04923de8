//! Solver configuration.

use rhea_core::EPSILON;

/// Options controlling numeric tolerance and value write-back.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Tolerance for feasibility checks and phase-one success
    pub epsilon: f64,
    /// Keep caller-assigned values of parametric variables during write-back
    /// when doing so leaves every constraint satisfied
    pub reconcile_overrides: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: EPSILON,
            reconcile_overrides: true,
        }
    }
}
