use floorplan_aggregator::{FloorHypotheses, Hypothesis, NodeId, Pose2, Provenance};
use floorplan_aggregator::{AggregatorParams, PoseAggregator};
use std::f64::consts::FRAC_PI_2;

fn main() {
    // Demo stub: a unit square of four panoramas, each turned by 90 degrees
    let corners = [
        Pose2::new(0.0, 0.0, 0.0),
        Pose2::new(1.0, 0.0, FRAC_PI_2),
        Pose2::new(1.0, 1.0, 2.0 * FRAC_PI_2),
        Pose2::new(0.0, 1.0, 3.0 * FRAC_PI_2),
    ];
    let hyps = (0..4)
        .map(|i| {
            let j = (i + 1) % 4;
            let rel = corners[i].between(&corners[j]);
            Hypothesis {
                floor_id: "demo".into(),
                node_i: NodeId(i as u32),
                node_j: NodeId(j as u32),
                rotation: rel.heading,
                translation: [rel.x, rel.y],
                confidence: 1.0,
                provenance: Provenance::Door,
            }
        })
        .collect();

    let aggregator = PoseAggregator::new(AggregatorParams::default());
    let estimate = aggregator.aggregate(&FloorHypotheses::new("demo", hyps));
    for (id, node) in &estimate.poses {
        if let Some(p) = node.pose {
            println!(
                "node {id}: x={:.3} y={:.3} heading={:.1}deg",
                p.x,
                p.y,
                p.heading.to_degrees()
            );
        }
    }
    println!(
        "converged={} latency_ms={:.3}",
        estimate.converged(),
        estimate.diagnostics.timing.total_ms
    );
}
