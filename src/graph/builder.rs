//! Hypothesis graph builder.
//!
//! Validates each record, drops the malformed and low-confidence ones with a
//! diagnostic, resolves same-provenance duplicates by confidence and
//! assembles the remaining records into a [`FloorGraph`].

use super::error::HypothesisError;
use super::{Edge, FloorGraph};
use crate::aggregate::params::GraphOptions;
use crate::types::{FloorHypotheses, Hypothesis, InlierLabel, Provenance};
use log::{debug, warn};
use std::collections::HashMap;

/// Why a record did not become an edge.
#[derive(Clone, Debug, PartialEq)]
pub enum DropReason {
    Malformed(HypothesisError),
    LowConfidence { confidence: f64, threshold: f64 },
    /// Same node pair and provenance as a kept record with at least the same confidence.
    Duplicate { kept_source: usize },
}

/// A record excluded from the graph, addressed by its index in the input.
#[derive(Clone, Debug, PartialEq)]
pub struct DroppedHypothesis {
    pub source_index: usize,
    pub reason: DropReason,
}

/// Output of [`build_floor_graph`].
#[derive(Clone, Debug)]
pub struct BuildOutcome {
    pub graph: FloorGraph,
    pub dropped: Vec<DroppedHypothesis>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct DuplicateKey {
    lo: usize,
    hi: usize,
    provenance: Provenance,
}

/// Checks a single record against its floor and numeric constraints.
pub fn validate_hypothesis(floor_id: &str, hyp: &Hypothesis) -> Result<(), HypothesisError> {
    if hyp.floor_id != floor_id {
        return Err(HypothesisError::FloorMismatch {
            expected: floor_id.to_string(),
            found: hyp.floor_id.clone(),
        });
    }
    if hyp.node_i == hyp.node_j {
        return Err(HypothesisError::SelfLoop(hyp.node_i));
    }
    if !hyp.rotation.is_finite() {
        return Err(HypothesisError::NonFiniteRotation(hyp.rotation));
    }
    let [tx, ty] = hyp.translation;
    if !tx.is_finite() || !ty.is_finite() {
        return Err(HypothesisError::NonFiniteTranslation(tx, ty));
    }
    if !(0.0..=1.0).contains(&hyp.confidence) {
        return Err(HypothesisError::ConfidenceOutOfRange(hyp.confidence));
    }
    Ok(())
}

/// Builds the floor graph from the records of one floor.
///
/// Declared nodes are inserted first (in declaration order) so that
/// panoramas without any valid hypothesis still appear in the output.
pub fn build_floor_graph(floor: &FloorHypotheses, options: &GraphOptions) -> BuildOutcome {
    let mut graph = FloorGraph::new(floor.floor_id.clone());
    let mut dropped = Vec::new();

    for spec in &floor.nodes {
        if spec.floor_id != floor.floor_id {
            warn!(
                "floor {}: node {} declared for floor {}, ignoring",
                floor.floor_id, spec.node_id, spec.floor_id
            );
            continue;
        }
        let idx = graph.ensure_node(spec.node_id);
        if let Some(gt) = spec.ground_truth {
            graph.set_ground_truth(idx, gt);
        }
    }

    let mut seen: HashMap<DuplicateKey, usize> = HashMap::new();
    for (source_index, hyp) in floor.hypotheses.iter().enumerate() {
        if let Err(err) = validate_hypothesis(&floor.floor_id, hyp) {
            warn!(
                "floor {}: dropping malformed hypothesis #{} ({} -> {}): {}",
                floor.floor_id, source_index, hyp.node_i, hyp.node_j, err
            );
            dropped.push(DroppedHypothesis {
                source_index,
                reason: DropReason::Malformed(err),
            });
            continue;
        }
        if hyp.confidence < options.min_confidence {
            dropped.push(DroppedHypothesis {
                source_index,
                reason: DropReason::LowConfidence {
                    confidence: hyp.confidence,
                    threshold: options.min_confidence,
                },
            });
            continue;
        }

        let i = graph.ensure_node(hyp.node_i);
        let j = graph.ensure_node(hyp.node_j);
        let key = DuplicateKey {
            lo: i.min(j),
            hi: i.max(j),
            provenance: hyp.provenance,
        };
        let edge = Edge {
            source_index,
            i,
            j,
            relative: hyp.relative_pose(),
            confidence: hyp.confidence,
            provenance: hyp.provenance,
            label: InlierLabel::Unknown,
        };

        match seen.get(&key) {
            Some(&existing) => {
                let kept = &mut graph.edges[existing];
                if edge.confidence > kept.confidence {
                    dropped.push(DroppedHypothesis {
                        source_index: kept.source_index,
                        reason: DropReason::Duplicate { kept_source: source_index },
                    });
                    // The pair is unchanged, so adjacency stays valid.
                    *kept = edge;
                } else {
                    dropped.push(DroppedHypothesis {
                        source_index,
                        reason: DropReason::Duplicate {
                            kept_source: kept.source_index,
                        },
                    });
                }
            }
            None => {
                let idx = graph.push_edge(edge);
                seen.insert(key, idx);
            }
        }
    }

    debug!(
        "floor {}: graph built with {} nodes, {} edges, {} records dropped",
        floor.floor_id,
        graph.node_count(),
        graph.edge_count(),
        dropped.len()
    );
    BuildOutcome { graph, dropped }
}
