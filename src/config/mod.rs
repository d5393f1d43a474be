//! JSON configuration of the `aggregate_floorplan` tool.
//!
//! ```json
//! {
//!   "input": "data/hypotheses.json",
//!   "output": "out/floor_estimates.json",
//!   "params": { "cycles": { "rotation_error_threshold_deg": 5.0 } }
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the config.

use crate::aggregate::AggregatorParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Hypothesis file: a JSON array of hypotheses, or an object with
    /// `hypotheses` and optional `nodes`.
    pub input: PathBuf,
    /// JSON report path; when absent the report is printed to stdout.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub params: AggregatorParams,
    /// Print the per-floor text summary.
    #[serde(default = "default_summary")]
    pub summary: bool,
}

fn default_summary() -> bool {
    true
}

impl RuntimeConfig {
    fn resolve_paths(mut self, base: &Path) -> Self {
        if self.input.is_relative() {
            self.input = base.join(&self.input);
        }
        if let Some(out) = self.output.as_mut() {
            if out.is_relative() {
                *out = base.join(&*out);
            }
        }
        self
    }
}

pub fn parse_config(json: &str) -> Result<RuntimeConfig, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse config: {e}"))
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: RuntimeConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(config.resolve_paths(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config(r#"{ "input": "hyps.json" }"#).expect("config parses");
        assert_eq!(config.input, PathBuf::from("hyps.json"));
        assert!(config.output.is_none());
        assert!(config.summary);
        assert_eq!(config.params, AggregatorParams::default());
    }

    #[test]
    fn params_override_thresholds() {
        let config = parse_config(
            r#"{
                "input": "hyps.json",
                "output": "out/report.json",
                "summary": false,
                "params": {
                    "cycles": { "rotation_error_threshold_deg": 5.0 },
                    "refine": { "max_iterations": 20, "huber_delta": null }
                }
            }"#,
        )
        .expect("config parses");
        assert_eq!(config.params.cycles.rotation_error_threshold_deg, 5.0);
        assert_eq!(config.params.refine.max_iterations, 20);
        assert!(config.params.refine.huber_delta.is_none());
        assert!(!config.summary);
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let config = parse_config(r#"{ "input": "hyps.json", "output": "/tmp/out.json" }"#)
            .expect("config parses")
            .resolve_paths(Path::new("/data/run1"));
        assert_eq!(config.input, PathBuf::from("/data/run1/hyps.json"));
        assert_eq!(config.output, Some(PathBuf::from("/tmp/out.json")));
    }

    #[test]
    fn missing_input_is_an_error() {
        let err = parse_config(r#"{ "output": "x.json" }"#).unwrap_err();
        assert!(err.contains("input"), "{err}");
    }
}
