//! Stroke capture and stroke geometry.
//!
//! A stroke is the transient, session-scoped record of one gesture
//! performance: opened by `start_stroke`, fed by the `continue_stroke`
//! family, and consumed by `end_stroke` or discarded by `cancel_stroke`.
//! The geometric summary (centroid, scale, principal axes) computed at
//! stroke end doubles as the live visual-feedback payload.

use std::time::Instant;

use crate::constants::EPSILON;
use crate::error::{GestureError, Result};
use crate::gesture::StrokeFrame;
use crate::pose::Pose;
use crate::quaternion::Quaternion;
use crate::vec3::Vec3;

/// What a completed stroke turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrokeMode {
    /// Append the stroke as a new sample of the given gesture.
    Record(u32),
    /// Match the stroke against the trained model.
    Identify,
}

/// An in-progress stroke. At most one exists per part.
#[derive(Debug)]
pub struct Stroke {
    pub mode: StrokeMode,
    /// Headset pose captured at `start_stroke`.
    pub hmd_start: Pose,
    /// Most recent headset pose submitted via `update_head_position`.
    pub hmd_latest: Pose,
    pub frames: Vec<StrokeFrame>,
    started: Instant,
}

impl Stroke {
    pub fn new(hmd: Pose, mode: StrokeMode) -> Self {
        Self {
            mode,
            hmd_start: hmd,
            hmd_latest: hmd,
            frames: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Append one canonical frame. A missing rotation records identity.
    pub fn push(&mut self, position: Vec3, rotation: Option<Quaternion>) {
        self.frames.push(StrokeFrame {
            position,
            rotation: rotation.unwrap_or_else(Quaternion::identity),
            hmd: self.hmd_latest,
            t: self.started.elapsed().as_secs_f64(),
        });
    }

    pub fn update_head(&mut self, hmd: Pose) {
        self.hmd_latest = hmd;
    }

    /// Frames captured within the trailing `period_ms` window, for
    /// continuous identification.
    pub fn window(&self, period_ms: u32) -> &[StrokeFrame] {
        let Some(last) = self.frames.last() else {
            return &[];
        };
        let cutoff = last.t - period_ms as f64 / 1000.0;
        let start = self.frames.partition_point(|f| f.t < cutoff);
        &self.frames[start..]
    }
}

/// Geometric summary of a completed stroke: where it was performed, how
/// large it was, and its principal-component frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeSummary {
    /// Centroid of the stroke positions.
    pub position: Vec3,
    /// Largest distance of any point from the centroid.
    pub scale: f64,
    /// Primary, secondary and minor spread axes (orthonormal, right-handed).
    pub axes: [Vec3; 3],
}

impl StrokeSummary {
    /// Compute the summary from at least two positions with nonzero spread.
    pub fn from_positions(positions: &[Vec3]) -> Result<Self> {
        if positions.len() < 2 {
            return Err(GestureError::InsufficientData);
        }

        let n = positions.len() as f64;
        let mut centroid = Vec3::ZERO;
        for p in positions {
            centroid = centroid + *p;
        }
        centroid = centroid * (1.0 / n);

        let mut scale = 0.0f64;
        let mut cov = [[0.0f64; 3]; 3];
        for p in positions {
            let d = *p - centroid;
            scale = scale.max(d.length());
            let da = d.to_array();
            for (i, di) in da.iter().enumerate() {
                for (j, dj) in da.iter().enumerate() {
                    cov[i][j] += di * dj / n;
                }
            }
        }
        if scale < EPSILON {
            return Err(GestureError::NumericInstability);
        }

        let (values, vectors) = jacobi_eigen(cov);

        // Order axes by descending spread.
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
        let column = |j: usize| Vec3::new(vectors[0][j], vectors[1][j], vectors[2][j]);
        let mut axes = [column(order[0]), column(order[1]), column(order[2])];

        // Keep the frame right-handed.
        if axes[0].cross(axes[1]).dot(axes[2]) < 0.0 {
            axes[2] = -axes[2];
        }

        Ok(Self {
            position: centroid,
            scale,
            axes,
        })
    }

    /// The principal-component frame as a quaternion.
    pub fn orientation(&self) -> Result<Quaternion> {
        Quaternion::from_axes(self.axes[0], self.axes[1], self.axes[2])
    }
}

/// Resample a polyline to `n` points spaced uniformly by arc length.
/// Degenerate inputs (single point, zero length) repeat the first point.
pub fn resample(points: &[Vec3], n: usize) -> Vec<Vec3> {
    if n == 0 {
        return Vec::new();
    }
    let Some(&first) = points.first() else {
        return vec![Vec3::ZERO; n];
    };
    if points.len() == 1 || n == 1 {
        return vec![first; n];
    }

    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for pair in points.windows(2) {
        total += (pair[1] - pair[0]).length();
        cumulative.push(total);
    }
    if total < EPSILON {
        return vec![first; n];
    }

    let mut out = Vec::with_capacity(n);
    let mut seg = 0usize;
    for i in 0..n {
        let target = total * i as f64 / (n - 1) as f64;
        while seg + 1 < cumulative.len() - 1 && cumulative[seg + 1] < target {
            seg += 1;
        }
        let seg_len = cumulative[seg + 1] - cumulative[seg];
        let t = if seg_len < EPSILON {
            0.0
        } else {
            (target - cumulative[seg]) / seg_len
        };
        out.push(points[seg] + (points[seg + 1] - points[seg]) * t);
    }
    out
}

/// Cyclic Jacobi eigendecomposition of a symmetric 3x3 matrix.
/// Returns (eigenvalues, eigenvector matrix with eigenvectors as columns).
fn jacobi_eigen(mut a: [[f64; 3]; 3]) -> ([f64; 3], [[f64; 3]; 3]) {
    let mut v = [[0.0; 3]; 3];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..64 {
        // Largest off-diagonal element.
        let (mut p, mut q, mut max) = (0, 1, a[0][1].abs());
        for (i, j) in [(0usize, 2usize), (1, 2)] {
            if a[i][j].abs() > max {
                p = i;
                q = j;
                max = a[i][j].abs();
            }
        }
        if max < 1e-14 {
            break;
        }

        let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
        let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
        let c = 1.0 / (t * t + 1.0).sqrt();
        let s = t * c;

        let apq = a[p][q];
        let app = a[p][p];
        let aqq = a[q][q];
        a[p][p] = app - t * apq;
        a[q][q] = aqq + t * apq;
        a[p][q] = 0.0;
        a[q][p] = 0.0;
        for k in 0..3 {
            if k != p && k != q {
                let akp = a[k][p];
                let akq = a[k][q];
                a[k][p] = c * akp - s * akq;
                a[p][k] = a[k][p];
                a[k][q] = s * akp + c * akq;
                a[q][k] = a[k][q];
            }
            let vkp = v[k][p];
            let vkq = v[k][q];
            v[k][p] = c * vkp - s * vkq;
            v[k][q] = s * vkp + c * vkq;
        }
    }

    ([a[0][0], a[1][1], a[2][2]], v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, dir: Vec3) -> Vec<Vec3> {
        (0..n)
            .map(|i| dir * (i as f64 / (n - 1) as f64))
            .collect()
    }

    #[test]
    fn test_stroke_push_and_mode() {
        let mut stroke = Stroke::new(Pose::identity(), StrokeMode::Identify);
        stroke.push(Vec3::new(0.1, 0.0, 0.0), None);
        stroke.push(Vec3::new(0.2, 0.0, 0.0), Some(Quaternion::identity()));
        assert_eq!(stroke.frames.len(), 2);
        assert_eq!(stroke.mode, StrokeMode::Identify);
        assert!(stroke.frames[1].t >= stroke.frames[0].t);
    }

    #[test]
    fn test_head_update_reflected_in_later_frames() {
        let mut stroke = Stroke::new(Pose::identity(), StrokeMode::Identify);
        stroke.push(Vec3::ZERO, None);
        let moved = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
        stroke.update_head(moved);
        stroke.push(Vec3::ZERO, None);
        assert_eq!(stroke.frames[0].hmd, Pose::identity());
        assert_eq!(stroke.frames[1].hmd, moved);
    }

    #[test]
    fn test_window_selects_trailing_frames() {
        let mut stroke = Stroke::new(Pose::identity(), StrokeMode::Identify);
        for i in 0..10 {
            stroke.push(Vec3::new(i as f64, 0.0, 0.0), None);
        }
        // Fabricate timestamps 0.0s..0.9s for a deterministic window.
        for (i, f) in stroke.frames.iter_mut().enumerate() {
            f.t = i as f64 * 0.1;
        }
        let window = stroke.window(300);
        assert_eq!(window.len(), 4, "0.6s..0.9s inclusive");
        assert_eq!(window[0].position.x, 6.0);
    }

    #[test]
    fn test_summary_of_line_along_x() {
        let summary = StrokeSummary::from_positions(&line(10, Vec3::new(1.0, 0.0, 0.0))).unwrap();
        assert_eq!(summary.position, Vec3::new(0.5, 0.0, 0.0));
        assert!((summary.scale - 0.5).abs() < 1e-9);
        // Primary axis is ±x.
        assert!(summary.axes[0].x.abs() > 0.999, "{:?}", summary.axes[0]);
    }

    #[test]
    fn test_summary_axes_orthonormal_right_handed() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.1, 0.0),
            Vec3::new(2.0, -0.1, 0.3),
            Vec3::new(3.0, 0.2, -0.2),
            Vec3::new(4.0, 0.0, 0.1),
        ];
        let s = StrokeSummary::from_positions(&points).unwrap();
        for axis in s.axes {
            assert!((axis.length() - 1.0).abs() < 1e-9);
        }
        assert!(s.axes[0].dot(s.axes[1]).abs() < 1e-9);
        assert!(s.axes[0].dot(s.axes[2]).abs() < 1e-9);
        assert!((s.axes[0].cross(s.axes[1]).dot(s.axes[2]) - 1.0).abs() < 1e-9);
        // Orientation is convertible.
        s.orientation().unwrap();
    }

    #[test]
    fn test_summary_insufficient_and_degenerate() {
        assert_eq!(
            StrokeSummary::from_positions(&[]).unwrap_err(),
            GestureError::InsufficientData
        );
        assert_eq!(
            StrokeSummary::from_positions(&[Vec3::ZERO]).unwrap_err(),
            GestureError::InsufficientData
        );
        let same = vec![Vec3::new(1.0, 1.0, 1.0); 5];
        assert_eq!(
            StrokeSummary::from_positions(&same).unwrap_err(),
            GestureError::NumericInstability
        );
    }

    #[test]
    fn test_resample_preserves_endpoints() {
        let pts = line(7, Vec3::new(2.0, 0.0, 0.0));
        let out = resample(&pts, 16);
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[15], pts[6]);
        // Uniform spacing along the line.
        let step = (out[1] - out[0]).length();
        for pair in out.windows(2) {
            assert!(((pair[1] - pair[0]).length() - step).abs() < 1e-9);
        }
    }

    #[test]
    fn test_resample_degenerate_inputs() {
        assert_eq!(resample(&[], 4), vec![Vec3::ZERO; 4]);
        let single = vec![Vec3::new(1.0, 2.0, 3.0)];
        assert_eq!(resample(&single, 3), vec![single[0]; 3]);
        let stationary = vec![Vec3::new(1.0, 0.0, 0.0); 5];
        assert_eq!(resample(&stationary, 3), vec![stationary[0]; 3]);
    }

    #[test]
    fn test_jacobi_recovers_diagonal() {
        let (values, _) = jacobi_eigen([[3.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]]);
        let mut sorted = values;
        sorted.sort_by(f64::total_cmp);
        assert!((sorted[0] - 1.0).abs() < 1e-12);
        assert!((sorted[1] - 2.0).abs() < 1e-12);
        assert!((sorted[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_jacobi_eigenvectors_diagonalize() {
        let a = [[2.0, 1.0, 0.0], [1.0, 2.0, 0.5], [0.0, 0.5, 1.0]];
        let (values, v) = jacobi_eigen(a);
        // A * v_col ≈ λ * v_col for each column.
        for j in 0..3 {
            for i in 0..3 {
                let av: f64 = (0..3).map(|k| a[i][k] * v[k][j]).sum();
                assert!(
                    (av - values[j] * v[i][j]).abs() < 1e-9,
                    "column {j} row {i}: {av} vs {}",
                    values[j] * v[i][j]
                );
            }
        }
    }
}
