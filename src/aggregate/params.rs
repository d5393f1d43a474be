//! Parameter types configuring the aggregation stages.
//!
//! The aggregator receives one [`AggregatorParams`] at construction time;
//! nothing is read from the environment. Every nested group deserializes
//! with defaults so partial JSON configs are accepted.
//!
//! Units: angles are given in degrees, translations in the floor's metric
//! units (the same units as the hypotheses).

use serde::{Deserialize, Serialize};

/// Top-level parameters for a floor aggregation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorParams {
    pub graph: GraphOptions,
    pub cycles: CycleFilterOptions,
    pub rotation: RotationAveragingOptions,
    pub refine: RefinerOptions,
    pub evaluation: EvaluationOptions,
}

/// Hypothesis graph builder options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Records with a verifier confidence below this value are excluded.
    pub min_confidence: f64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
        }
    }
}

/// Cycle consistency filter options.
///
/// - A cycle is consistent when its composed rotation is within
///   `rotation_error_threshold_deg` of identity and its composed translation
///   is within `translation_error_threshold * max(scale, min_cycle_scale)`,
///   where `scale` is the mean translation length of the cycle's edges.
/// - Edge outlier score: `inconsistent / (cycles + significance_prior)`. The
///   prior shrinks scores of edges seen in few cycles toward zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleFilterOptions {
    pub max_cycle_length: usize,
    pub max_cycles: usize,
    pub rotation_error_threshold_deg: f64,
    pub translation_error_threshold: f64,
    pub min_cycle_scale: f64,
    pub outlier_score_threshold: f64,
    pub significance_prior: f64,
    /// Edges without any consistent cycle and below this confidence are rejected.
    pub min_unsupported_confidence: f64,
}

impl Default for CycleFilterOptions {
    fn default() -> Self {
        Self {
            max_cycle_length: 3,
            max_cycles: 200_000,
            rotation_error_threshold_deg: 7.5,
            translation_error_threshold: 0.25,
            min_cycle_scale: 0.5,
            outlier_score_threshold: 0.5,
            significance_prior: 1.0,
            min_unsupported_confidence: 0.5,
        }
    }
}

impl CycleFilterOptions {
    pub const MIN_CYCLE_LENGTH: usize = 3;
    pub const MAX_CYCLE_LENGTH: usize = 6;

    pub fn cycle_length(&self) -> usize {
        self.max_cycle_length
            .clamp(Self::MIN_CYCLE_LENGTH, Self::MAX_CYCLE_LENGTH)
    }
}

/// Robust rotation averaging options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationAveragingOptions {
    /// Huber threshold on the angular residual.
    pub huber_delta_deg: f64,
    pub max_iterations: usize,
    /// Stop once the largest heading update falls below this value.
    pub tolerance_deg: f64,
}

impl Default for RotationAveragingOptions {
    fn default() -> Self {
        Self {
            huber_delta_deg: 10.0,
            max_iterations: 50,
            tolerance_deg: 1e-4,
        }
    }
}

/// Pose-graph refinement options.
///
/// Edge information is `confidence * diag(1/σt², 1/σt², 1/σr²)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerOptions {
    pub translation_sigma: f64,
    pub rotation_sigma_deg: f64,
    /// Weight of the averaged-heading prior relative to one unit-confidence edge.
    pub heading_prior_weight: f64,
    /// Huber threshold on the whitened residual norm; `None` disables robust weighting.
    pub huber_delta: Option<f64>,
    pub max_iterations: usize,
    /// Relative cost decrease below which the solve is considered converged.
    pub cost_tolerance: f64,
    /// Largest parameter update below which the solve is considered converged.
    pub step_tolerance: f64,
    pub initial_damping: f64,
}

impl Default for RefinerOptions {
    fn default() -> Self {
        Self {
            translation_sigma: 0.1,
            rotation_sigma_deg: 2.0,
            heading_prior_weight: 0.1,
            huber_delta: Some(3.0),
            max_iterations: 100,
            cost_tolerance: 1e-10,
            step_tolerance: 1e-9,
            initial_damping: 1e-4,
        }
    }
}

/// Tolerances used when ground truth is available.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationOptions {
    /// An edge is a true inlier when its rotation error against ground truth is below this.
    pub rotation_tolerance_deg: f64,
    /// ... and its translation error is below this.
    pub translation_tolerance: f64,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            rotation_tolerance_deg: 5.0,
            translation_tolerance: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let params: AggregatorParams =
            serde_json::from_str(r#"{ "cycles": { "max_cycle_length": 4 } }"#)
                .expect("params parse");
        assert_eq!(params.cycles.max_cycle_length, 4);
        assert_eq!(params.cycles.outlier_score_threshold, 0.5);
        assert_eq!(params.refine, RefinerOptions::default());
    }

    #[test]
    fn cycle_length_is_clamped() {
        let mut opts = CycleFilterOptions::default();
        opts.max_cycle_length = 2;
        assert_eq!(opts.cycle_length(), 3);
        opts.max_cycle_length = 12;
        assert_eq!(opts.cycle_length(), 6);
    }
}
