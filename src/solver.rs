//! Shared pieces of the two iterative solvers: the explicit solver state
//! machine, its report, and the Huber kernel used for IRLS weighting.
//!
//! ```text
//! Initialized ──▶ Iterating ──▶ Converged
//!                    │  ├─────▶ MaxIterExceeded
//!                    │  └─────▶ Singular
//!                    └──(loop)
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle of an iterative solve. Terminal states are `Converged`,
/// `MaxIterExceeded` and `Singular`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverState {
    #[default]
    Initialized,
    Iterating,
    Converged,
    MaxIterExceeded,
    Singular,
}

impl SolverState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SolverState::Converged | SolverState::MaxIterExceeded | SolverState::Singular
        )
    }
}

/// Outcome of an iterative solve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverReport {
    pub state: SolverState,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Largest absolute parameter update of the last accepted step.
    pub last_step: f64,
}

impl SolverReport {
    pub fn start(initial_cost: f64) -> Self {
        Self {
            state: SolverState::Initialized,
            iterations: 0,
            initial_cost,
            final_cost: initial_cost,
            last_step: 0.0,
        }
    }

    /// Report for a problem with nothing to optimize.
    pub fn trivial() -> Self {
        Self {
            state: SolverState::Converged,
            ..Self::default()
        }
    }

    pub fn converged(&self) -> bool {
        self.state == SolverState::Converged
    }

    pub(crate) fn finish(mut self, state: SolverState) -> Self {
        debug_assert!(state.is_terminal());
        self.state = state;
        self
    }
}

/// Huber IRLS weight: 1 inside `delta`, `delta / |r|` beyond.
#[inline]
pub fn huber_weight(residual: f64, delta: f64) -> f64 {
    let abs = residual.abs();
    if abs <= delta || abs <= f64::EPSILON {
        1.0
    } else {
        delta / abs
    }
}

/// Huber loss: `r²/2` inside `delta`, linear beyond.
#[inline]
pub fn huber_loss(residual: f64, delta: f64) -> f64 {
    let abs = residual.abs();
    if abs <= delta {
        0.5 * abs * abs
    } else {
        delta * (abs - 0.5 * delta)
    }
}
