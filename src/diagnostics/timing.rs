use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Milliseconds spent in one stage of a floor's aggregation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

/// Stage timings of one floor, in execution order. Component solves are
/// summed per stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming {
            label: label.into(),
            elapsed_ms,
        });
    }

    /// Records the time since `start` under `label` and returns a fresh start.
    pub fn lap(&mut self, label: impl Into<String>, start: Instant) -> Instant {
        self.push(label, start.elapsed().as_secs_f64() * 1000.0);
        Instant::now()
    }

    /// Time recorded under `label`; `None` when the stage did not run.
    pub fn stage_ms(&self, label: &str) -> Option<f64> {
        self.stages
            .iter()
            .filter(|s| s.label == label)
            .map(|s| s.elapsed_ms)
            .reduce(|a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_lookup_sums_repeated_labels() {
        let mut timing = TimingBreakdown::default();
        timing.push("graph", 1.5);
        timing.push("pose_refinement", 2.0);
        timing.push("pose_refinement", 0.5);
        assert_eq!(timing.stage_ms("pose_refinement"), Some(2.5));
        assert_eq!(timing.stage_ms("graph"), Some(1.5));
        assert_eq!(timing.stage_ms("evaluation"), None);
    }

    #[test]
    fn lap_records_in_order() {
        let mut timing = TimingBreakdown::default();
        let t = timing.lap("graph", Instant::now());
        timing.lap("cycle_filter", t);
        let labels: Vec<&str> = timing.stages.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["graph", "cycle_filter"]);
        assert!(timing.stages.iter().all(|s| s.elapsed_ms >= 0.0));
    }
}
