use crate::types::NodeId;
use thiserror::Error;

/// Reasons a single hypothesis record is rejected by the graph builder.
///
/// Rejection is local: the record is dropped and reported, the floor is
/// still aggregated from the remaining records.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum HypothesisError {
    #[error("hypothesis belongs to floor `{found}` but was supplied for floor `{expected}`")]
    FloorMismatch { expected: String, found: String },
    #[error("self-loop on node {0}")]
    SelfLoop(NodeId),
    #[error("non-finite rotation {0}")]
    NonFiniteRotation(f64),
    #[error("non-finite translation [{0}, {1}]")]
    NonFiniteTranslation(f64, f64),
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}
