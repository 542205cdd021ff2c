use serde::{Deserialize, Serialize};

use crate::error::{GestureError, Result};
use crate::quaternion::Quaternion;
use crate::vec3::Vec3;

/// A rigid pose: position plus orientation. Used for headset anchors and
/// controller frames alike.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quaternion,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quaternion::identity(),
        }
    }

    /// Extract a pose from a 4x4 transformation matrix in row-major,
    /// column-vector convention: rotation in the upper-left 3x3, translation
    /// in the fourth column. The rotation columns are re-normalized before
    /// conversion, so mildly scaled matrices are accepted; a degenerate
    /// rotation block reports invalid parameters.
    pub fn from_matrix(m: &[[f64; 4]; 4]) -> Result<Self> {
        let col = |j: usize| Vec3::new(m[0][j], m[1][j], m[2][j]);
        let d0 = col(0).normalized().ok_or(GestureError::InvalidParameter)?;
        let d1 = col(1).normalized().ok_or(GestureError::InvalidParameter)?;
        let d2 = col(2).normalized().ok_or(GestureError::InvalidParameter)?;
        Ok(Self {
            position: Vec3::new(m[0][3], m[1][3], m[2][3]),
            rotation: Quaternion::from_axes(d0, d1, d2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_matrix_identity() {
        let m = [
            [1.0, 0.0, 0.0, 0.5],
            [0.0, 1.0, 0.0, -0.25],
            [0.0, 0.0, 1.0, 2.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let pose = Pose::from_matrix(&m).unwrap();
        assert_eq!(pose.position, Vec3::new(0.5, -0.25, 2.0));
        assert_eq!(pose.rotation, Quaternion::identity());
    }

    #[test]
    fn test_from_matrix_rotation() {
        // 90° about z: x column becomes +y.
        let m = [
            [0.0, -1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let pose = Pose::from_matrix(&m).unwrap();
        let v = pose.rotation.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(v, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_from_matrix_degenerate() {
        let m = [[0.0; 4]; 4];
        assert_eq!(
            Pose::from_matrix(&m).unwrap_err(),
            GestureError::InvalidParameter
        );
    }
}
