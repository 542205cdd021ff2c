//! Euler angle composition and decomposition for all six rotation orders.
//!
//! Angles are carried in a `Vec3` whose x/y/z components are the rotation
//! about that world axis, regardless of where the axis appears in the order.
//! Composition is extrinsic: the first axis of the order is applied first.

use serde::{Deserialize, Serialize};

use crate::quaternion::Quaternion;
use crate::vec3::Vec3;

/// Order in which the three Euler rotation angles compose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationOrder {
    Xyz,
    Xzy,
    #[default]
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

impl RotationOrder {
    /// Stable wire code (0..=5) of this order.
    pub fn as_code(self) -> i32 {
        match self {
            Self::Xyz => 0,
            Self::Xzy => 1,
            Self::Yxz => 2,
            Self::Yzx => 3,
            Self::Zxy => 4,
            Self::Zyx => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Xyz,
            1 => Self::Xzy,
            2 => Self::Yxz,
            3 => Self::Yzx,
            4 => Self::Zxy,
            5 => Self::Zyx,
            _ => return None,
        })
    }

    /// Axis indices (first, middle, last) and whether the permutation of
    /// (x,y,z) is even. Odd permutations flip signs in decomposition.
    fn axes(self) -> (usize, usize, usize, bool) {
        match self {
            Self::Xyz => (0, 1, 2, true),
            Self::Xzy => (0, 2, 1, false),
            Self::Yxz => (1, 0, 2, false),
            Self::Yzx => (1, 2, 0, true),
            Self::Zxy => (2, 0, 1, true),
            Self::Zyx => (2, 1, 0, false),
        }
    }
}

const AXES: [Vec3; 3] = [
    Vec3 {
        x: 1.0,
        y: 0.0,
        z: 0.0,
    },
    Vec3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    },
    Vec3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    },
];

fn angle_about(angles: Vec3, axis: usize) -> f64 {
    match axis {
        0 => angles.x,
        1 => angles.y,
        _ => angles.z,
    }
}

/// Compose per-axis angles into one rotation, first axis of `order` first.
pub fn compose(order: RotationOrder, angles: Vec3) -> Quaternion {
    let (i, j, k, _) = order.axes();
    let qi = Quaternion::from_axis_angle(AXES[i], angle_about(angles, i));
    let qj = Quaternion::from_axis_angle(AXES[j], angle_about(angles, j));
    let qk = Quaternion::from_axis_angle(AXES[k], angle_about(angles, k));
    qk * qj * qi
}

/// Extract per-axis Euler angles from a rotation under the given order.
/// The middle angle is clamped into asin's domain, so inputs drifting
/// slightly off the unit sphere stay finite.
pub fn decompose(order: RotationOrder, q: Quaternion) -> Vec3 {
    let [c0, c1, c2] = q.to_axes();
    // m[row][col]
    let m = [
        [c0.x, c1.x, c2.x],
        [c0.y, c1.y, c2.y],
        [c0.z, c1.z, c2.z],
    ];
    let (i, j, k, even) = order.axes();

    let (first, middle, last) = if even {
        (
            f64::atan2(m[k][j], m[k][k]),
            (-m[k][i]).clamp(-1.0, 1.0).asin(),
            f64::atan2(m[j][i], m[i][i]),
        )
    } else {
        (
            f64::atan2(-m[k][j], m[k][k]),
            m[k][i].clamp(-1.0, 1.0).asin(),
            f64::atan2(-m[j][i], m[i][i]),
        )
    };

    let mut out = [0.0f64; 3];
    out[i] = first;
    out[j] = middle;
    out[k] = last;
    Vec3::new(out[0], out[1], out[2])
}
