use crate::angle::wrap_to_pi;
use crate::graph::FloorGraph;
use crate::types::Pose2;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Discrepancy between an edge's observed relative pose and the one implied
/// by two absolute estimates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResidual {
    pub edge: usize,
    /// Translation error norm (floor units).
    pub translation: f64,
    /// Absolute heading error (radians).
    pub rotation: f64,
    /// `sqrt(translation² + rotation²)`.
    pub norm: f64,
}

/// Error of measurement `z` given estimates `xi`, `xj`:
/// `between(xi, xj) − z` with the heading part wrapped.
#[inline]
pub(crate) fn edge_error(xi: &Pose2, xj: &Pose2, z: &Pose2) -> Vector3<f64> {
    let predicted = xi.between(xj);
    Vector3::new(
        predicted.x - z.x,
        predicted.y - z.y,
        wrap_to_pi(predicted.heading - z.heading),
    )
}

/// Jacobians of [`edge_error`] with respect to `xi` and `xj`.
#[inline]
pub(crate) fn edge_jacobians(xi: &Pose2, xj: &Pose2) -> (Matrix3<f64>, Matrix3<f64>) {
    let (s, c) = xi.heading.sin_cos();
    let dx = xj.x - xi.x;
    let dy = xj.y - xi.y;
    #[rustfmt::skip]
    let ji = Matrix3::new(
        -c, -s, -s * dx + c * dy,
         s, -c, -c * dx - s * dy,
        0.0, 0.0, -1.0,
    );
    #[rustfmt::skip]
    let jj = Matrix3::new(
         c,   s, 0.0,
        -s,   c, 0.0,
        0.0, 0.0, 1.0,
    );
    (ji, jj)
}

/// Residual of `edge` for the given absolute poses of its endpoints.
pub fn edge_residual(graph: &FloorGraph, edge: usize, xi: &Pose2, xj: &Pose2) -> EdgeResidual {
    let e = edge_error(xi, xj, &graph.edge(edge).relative);
    let translation = e.x.hypot(e.y);
    let rotation = e.z.abs();
    EdgeResidual {
        edge,
        translation,
        rotation,
        norm: translation.hypot(rotation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobians_match_finite_differences() {
        let xi = Pose2::new(0.3, -1.2, 0.7);
        let xj = Pose2::new(2.1, 0.4, -2.2);
        let z = Pose2::new(1.0, 2.0, 0.1);
        let (ji, jj) = edge_jacobians(&xi, &xj);
        let h = 1e-6;
        for k in 0..3 {
            let mut d = [0.0; 3];
            d[k] = h;
            let bump = |p: &Pose2| Pose2::new(p.x + d[0], p.y + d[1], p.heading + d[2]);
            let num_i = (edge_error(&bump(&xi), &xj, &z) - edge_error(&xi, &xj, &z)) / h;
            let num_j = (edge_error(&xi, &bump(&xj), &z) - edge_error(&xi, &xj, &z)) / h;
            for r in 0..3 {
                assert!((num_i[r] - ji[(r, k)]).abs() < 1e-4, "d e{r}/d xi{k}");
                assert!((num_j[r] - jj[(r, k)]).abs() < 1e-4, "d e{r}/d xj{k}");
            }
        }
    }

    #[test]
    fn consistent_measurement_has_zero_error() {
        let xi = Pose2::new(1.0, 1.0, 0.5);
        let xj = Pose2::new(-1.0, 2.0, 3.0);
        let e = edge_error(&xi, &xj, &xi.between(&xj));
        assert!(e.norm() < 1e-12);
    }
}
