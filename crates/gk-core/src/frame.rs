//! Frame-of-reference normalization.
//!
//! Raw controller motion is captured in room coordinates. Before a stroke is
//! stored or matched it is re-expressed in a gesture-local frame derived from
//! the headset pose, so that gestures become invariant to where the user
//! stands and — per configured axis — where they look.

use serde::{Deserialize, Serialize};

use crate::euler::{self, RotationOrder};
use crate::gesture::StrokeFrame;
use crate::pose::Pose;
use crate::quaternion::Quaternion;

/// Which point of view anchors one rotation axis of the gesture frame.
///
/// `Head`: that axis of the headset rotation is subtracted out, so motion is
/// interpreted relative to where the user is looking. `World`: the axis stays
/// room-fixed (gestures distinguish north/south/up/down of the room).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOfReference {
    #[default]
    Head,
    World,
}

impl FrameOfReference {
    pub fn as_code(self) -> i32 {
        match self {
            Self::Head => 0,
            Self::World => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Head),
            1 => Some(Self::World),
            _ => None,
        }
    }
}

/// How the positional anchor of the gesture frame follows the headset.
///
/// `UseLatest`: every head pose submitted during the stroke re-anchors
/// subsequent frames. `UseInitial`: the pose captured at stroke start anchors
/// the whole stroke and later updates are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateHeadPositionPolicy {
    #[default]
    UseLatest,
    UseInitial,
}

impl UpdateHeadPositionPolicy {
    pub fn as_code(self) -> i32 {
        match self {
            Self::UseLatest => 0,
            Self::UseInitial => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::UseLatest),
            1 => Some(Self::UseInitial),
            _ => None,
        }
    }
}

/// Per-part frame-of-reference policy.
///
/// `yaw` governs the y axis (looking left/right), `pitch` the x axis
/// (looking up/down), `roll` the z axis (head tilt). Changing the config
/// affects future strokes only; stored samples keep the processed frames
/// computed with the settings active at recording time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    pub yaw: FrameOfReference,
    pub pitch: FrameOfReference,
    pub roll: FrameOfReference,
    pub rotation_order: RotationOrder,
    pub head_position_policy: UpdateHeadPositionPolicy,
}

impl FrameConfig {
    /// The rotation to subtract from controller motion for a given headset
    /// orientation: the headset rotation reduced to its Head-anchored axes.
    /// All-World configurations yield the identity.
    pub fn reference_rotation(&self, hmd_rotation: Quaternion) -> Quaternion {
        let mut angles = euler::decompose(self.rotation_order, hmd_rotation);
        if self.pitch == FrameOfReference::World {
            angles.x = 0.0;
        }
        if self.yaw == FrameOfReference::World {
            angles.y = 0.0;
        }
        if self.roll == FrameOfReference::World {
            angles.z = 0.0;
        }
        euler::compose(self.rotation_order, angles)
    }

    /// Re-express one raw frame in the gesture-local frame anchored at `hmd`.
    pub fn normalize_frame(&self, frame: &StrokeFrame, hmd: &Pose) -> StrokeFrame {
        let reference = self.reference_rotation(hmd.rotation);
        let inv = reference.conjugate();
        StrokeFrame {
            position: inv.rotate(frame.position - hmd.position),
            rotation: (inv * frame.rotation).normalize(),
            hmd: frame.hmd,
            t: frame.t,
        }
    }

    /// Normalize a whole stroke. Under `UseInitial` every frame is anchored
    /// at `initial_hmd`; under `UseLatest` each frame uses the headset pose
    /// that was current when it was captured.
    pub fn normalize_frames(&self, frames: &[StrokeFrame], initial_hmd: &Pose) -> Vec<StrokeFrame> {
        frames
            .iter()
            .map(|f| {
                let anchor = match self.head_position_policy {
                    UpdateHeadPositionPolicy::UseInitial => initial_hmd,
                    UpdateHeadPositionPolicy::UseLatest => &f.hmd,
                };
                self.normalize_frame(f, anchor)
            })
            .collect()
    }
}
