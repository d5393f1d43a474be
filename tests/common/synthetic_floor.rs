use floorplan_aggregator::{FloorHypotheses, Hypothesis, NodeId, NodeSpec, Pose2, Provenance};
use rand::prelude::*;
use std::f64::consts::FRAC_PI_2;

/// Unit square with headings 0°, 90°, 180°, 270°.
pub fn unit_square() -> Vec<Pose2> {
    vec![
        Pose2::new(0.0, 0.0, 0.0),
        Pose2::new(1.0, 0.0, FRAC_PI_2),
        Pose2::new(1.0, 1.0, 2.0 * FRAC_PI_2),
        Pose2::new(0.0, 1.0, 3.0 * FRAC_PI_2),
    ]
}

pub fn ring_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n).map(|i| (i, (i + 1) % n)).collect()
}

/// `cols x rows` panoramas on a grid, node `r * cols + c`, with varied headings.
pub fn grid_layout(cols: usize, rows: usize, spacing: f64) -> Vec<Pose2> {
    let mut poses = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            let k = (r * cols + c) as f64;
            poses.push(Pose2::new(
                c as f64 * spacing,
                r as f64 * spacing,
                (0.7 * k).sin() * 2.5,
            ));
        }
    }
    poses
}

/// Horizontal, vertical and one diagonal per cell: two triangles per cell.
pub fn grid_pairs(cols: usize, rows: usize) -> Vec<(usize, usize)> {
    let idx = |c: usize, r: usize| r * cols + c;
    let mut pairs = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                pairs.push((idx(c, r), idx(c + 1, r)));
            }
            if r + 1 < rows {
                pairs.push((idx(c, r), idx(c, r + 1)));
            }
            if c + 1 < cols && r + 1 < rows {
                pairs.push((idx(c, r), idx(c + 1, r + 1)));
            }
        }
    }
    pairs
}

pub struct FloorBuilder {
    floor_id: String,
    truth: Vec<Pose2>,
    id_offset: u32,
    hypotheses: Vec<Hypothesis>,
    with_ground_truth: bool,
}

impl FloorBuilder {
    pub fn new(floor_id: &str, truth: Vec<Pose2>) -> Self {
        Self {
            floor_id: floor_id.to_string(),
            truth,
            id_offset: 0,
            hypotheses: Vec::new(),
            with_ground_truth: false,
        }
    }

    /// Node `k` gets id `offset + k`.
    pub fn id_offset(mut self, offset: u32) -> Self {
        self.id_offset = offset;
        self
    }

    pub fn with_ground_truth(mut self) -> Self {
        self.with_ground_truth = true;
        self
    }

    pub fn id(&self, k: usize) -> NodeId {
        NodeId(self.id_offset + k as u32)
    }

    /// Adds exact hypotheses for `pairs`, perturbed by `noise` when given
    /// (uniform translation amplitude, heading amplitude in radians).
    pub fn pairs(
        mut self,
        pairs: &[(usize, usize)],
        confidence: f64,
        noise: Option<(&mut StdRng, f64, f64)>,
    ) -> Self {
        let mut noise = noise;
        for &(i, j) in pairs {
            let mut rel = self.truth[i].between(&self.truth[j]);
            if let Some((rng, t_amp, h_amp)) = noise.as_mut() {
                rel.x += rng.random_range(-1.0..1.0) * *t_amp;
                rel.y += rng.random_range(-1.0..1.0) * *t_amp;
                rel.heading += rng.random_range(-1.0..1.0) * *h_amp;
            }
            let hyp = hypothesis(&self.floor_id, self.id(i), self.id(j), rel, confidence);
            self.hypotheses.push(hyp);
        }
        self
    }

    /// Replaces the measurement of hypothesis `index` by `truth ∘ offset`.
    pub fn corrupt(mut self, index: usize, offset: Pose2) -> Self {
        let hyp = &mut self.hypotheses[index];
        let rel = hyp.relative_pose().compose(&offset);
        hyp.rotation = rel.heading;
        hyp.translation = [rel.x, rel.y];
        self
    }

    pub fn build(self) -> FloorHypotheses {
        let nodes = if self.with_ground_truth {
            self.truth
                .iter()
                .enumerate()
                .map(|(k, pose)| NodeSpec {
                    floor_id: self.floor_id.clone(),
                    node_id: self.id(k),
                    ground_truth: Some(*pose),
                })
                .collect()
        } else {
            Vec::new()
        };
        FloorHypotheses::new(self.floor_id.clone(), self.hypotheses).with_nodes(nodes)
    }
}

pub fn hypothesis(floor_id: &str, i: NodeId, j: NodeId, rel: Pose2, confidence: f64) -> Hypothesis {
    Hypothesis {
        floor_id: floor_id.to_string(),
        node_i: i,
        node_j: j,
        rotation: rel.heading,
        translation: [rel.x, rel.y],
        confidence,
        provenance: Provenance::LayoutOverlap,
    }
}

pub fn angle_diff(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(std::f64::consts::TAU);
    d.min(std::f64::consts::TAU - d)
}

pub fn assert_pose_close(a: &Pose2, b: &Pose2, tol: f64) {
    assert!(
        (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol && angle_diff(a.heading, b.heading) < tol,
        "poses differ: {a:?} vs {b:?}"
    );
}
