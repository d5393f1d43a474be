//! Cycle consistency filtering of pairwise hypotheses.
//!
//! Overview
//! - Enumerates simple cycles up to a bounded length (triangles by default).
//! - Composes the relative poses around each cycle; a consistent cycle
//!   returns to identity within a rotation threshold and a translation
//!   threshold scaled to the cycle's size.
//! - Scores each edge by the share of its cycles that are inconsistent,
//!   shrunk toward zero for edges seen in few cycles, and rejects edges
//!   greedily while guarding connectivity.
//!
//! Graphs without cycles produce no outliers from scoring; an edge can only
//! be rejected when a parallel path keeps its endpoints connected.

mod enumerate;
mod filter;

pub use enumerate::{enumerate_cycles, Cycle, CycleEnumeration};
pub use filter::{
    check_cycle, filter_edges, would_disconnect, CycleCheck, EdgeCycleStats, FilterOutcome,
};
