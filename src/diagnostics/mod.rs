//! Serializable diagnostics attached to every floor estimate.
//!
//! `FloorDiagnostics` is the main entry point: per-edge labels and residuals,
//! per-component solver reports, label counts, a residual summary, the
//! issue list (dropped records, disconnected components, degenerate filter
//! decisions, solver problems) and a per-stage timing trace.

pub mod issues;
pub mod report;
pub mod timing;

pub use issues::{Issue, SolverStage};
pub use report::{
    ComponentReport, CycleSummary, EdgeReport, FloorDiagnostics, LabelCounts, NodeEstimate,
    ResidualSummary,
};
pub use timing::{StageTiming, TimingBreakdown};
