use serde::{Deserialize, Serialize};

use crate::error::{GestureError, Result};
use crate::pose::Pose;
use crate::quaternion::Quaternion;
use crate::stroke::{self, StrokeSummary};
use crate::vec3::Vec3;

/// One captured input frame of a stroke.
///
/// `hmd` is the headset pose that was current when the frame was captured
/// (the stroke-start pose until the caller submits a head update). `t` is
/// seconds since stroke start.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeFrame {
    pub position: Vec3,
    pub rotation: Quaternion,
    pub hmd: Pose,
    pub t: f64,
}

/// One recorded performance of a gesture.
///
/// `frames` is the raw capture; `processed` is the same motion expressed in
/// the gesture-local frame that was configured at recording time. Immutable
/// once recorded, except for deletion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sample {
    pub hmd: Pose,
    pub frames: Vec<StrokeFrame>,
    pub processed: Vec<StrokeFrame>,
}

impl Sample {
    /// Frame count of the raw or processed sequence.
    pub fn len(&self, processed: bool) -> usize {
        if processed {
            self.processed.len()
        } else {
            self.frames.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Frame-wise average of a gesture's samples, in the gesture-local frame.
#[derive(Clone, Debug)]
pub struct MeanStroke {
    pub positions: Vec<Vec3>,
    pub rotations: Vec<Quaternion>,
    pub summary: StrokeSummary,
}

/// A named, enable-flagged gesture owning its recorded samples.
///
/// The id is assigned by the owning part and never reused within a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gesture {
    pub id: u32,
    pub name: String,
    pub enabled: bool,
    pub metadata: String,
    pub samples: Vec<Sample>,
}

impl Gesture {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            enabled: true,
            metadata: String::new(),
            samples: Vec::new(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn sample(&self, index: usize) -> Result<&Sample> {
        self.samples.get(index).ok_or(GestureError::InvalidIndex)
    }

    pub fn delete_sample(&mut self, index: usize) -> Result<()> {
        if index >= self.samples.len() {
            return Err(GestureError::InvalidIndex);
        }
        self.samples.remove(index);
        Ok(())
    }

    /// Frame-wise average over all samples' processed sequences, resampled
    /// to `resolution` points. Rotations are averaged by incremental slerp.
    /// Fails with insufficient data when the gesture has no usable samples.
    pub fn mean_stroke(&self, resolution: usize) -> Result<MeanStroke> {
        let usable: Vec<&Sample> = self
            .samples
            .iter()
            .filter(|s| !s.processed.is_empty())
            .collect();
        if usable.is_empty() || resolution == 0 {
            return Err(GestureError::InsufficientData);
        }

        let mut positions = vec![Vec3::ZERO; resolution];
        let mut rotations = vec![Quaternion::identity(); resolution];

        for (n, sample) in usable.iter().enumerate() {
            let pts: Vec<Vec3> = sample.processed.iter().map(|f| f.position).collect();
            let resampled = stroke::resample(&pts, resolution);
            let rots = resample_rotations(&sample.processed, resolution);

            let t = 1.0 / (n as f64 + 1.0);
            for i in 0..resolution {
                positions[i] = positions[i] + (resampled[i] - positions[i]) * t;
                rotations[i] = if n == 0 {
                    rots[i]
                } else {
                    rotations[i].slerp(rots[i], t)
                };
            }
        }

        let summary = StrokeSummary::from_positions(&positions)?;
        Ok(MeanStroke {
            positions,
            rotations,
            summary,
        })
    }
}

/// Pick rotations at `n` evenly spaced frame indices. Rotation streams are
/// not arc-length parameterized; index spacing is close enough for the mean.
fn resample_rotations(frames: &[StrokeFrame], n: usize) -> Vec<Quaternion> {
    if frames.is_empty() {
        return vec![Quaternion::identity(); n];
    }
    (0..n)
        .map(|i| {
            let idx = if n == 1 {
                0
            } else {
                (i * (frames.len() - 1)) / (n - 1)
            };
            frames[idx].rotation
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_sample(from: Vec3, to: Vec3, points: usize) -> Sample {
        let frames: Vec<StrokeFrame> = (0..points)
            .map(|i| {
                let t = i as f64 / (points - 1) as f64;
                StrokeFrame {
                    position: from + (to - from) * t,
                    rotation: Quaternion::identity(),
                    hmd: Pose::identity(),
                    t,
                }
            })
            .collect();
        Sample {
            hmd: Pose::identity(),
            frames: frames.clone(),
            processed: frames,
        }
    }

    #[test]
    fn test_new_gesture_defaults() {
        let g = Gesture::new(3, "swipe");
        assert_eq!(g.id, 3);
        assert_eq!(g.name, "swipe");
        assert!(g.enabled);
        assert!(g.metadata.is_empty());
        assert_eq!(g.sample_count(), 0);
    }

    #[test]
    fn test_sample_access_and_delete() {
        let mut g = Gesture::new(0, "g");
        g.samples
            .push(line_sample(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 5));
        assert_eq!(g.sample(0).unwrap().len(false), 5);
        assert_eq!(g.sample(1).unwrap_err(), GestureError::InvalidIndex);

        g.delete_sample(0).unwrap();
        assert_eq!(g.sample_count(), 0);
        assert_eq!(g.delete_sample(0).unwrap_err(), GestureError::InvalidIndex);
    }

    #[test]
    fn test_mean_stroke_of_identical_samples() {
        let mut g = Gesture::new(0, "line");
        for _ in 0..3 {
            g.samples
                .push(line_sample(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 10));
        }
        let mean = g.mean_stroke(8).unwrap();
        assert_eq!(mean.positions.len(), 8);
        assert_eq!(mean.rotations.len(), 8);
        // Mean of identical lines is the line itself.
        assert_eq!(mean.positions[0], Vec3::ZERO);
        assert_eq!(mean.positions[7], Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_mean_stroke_averages() {
        let mut g = Gesture::new(0, "avg");
        g.samples
            .push(line_sample(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 6));
        g.samples
            .push(line_sample(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), 6));
        let mean = g.mean_stroke(4).unwrap();
        let last = mean.positions[3];
        assert!((last.x - 0.5).abs() < 1e-9 && (last.y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mean_stroke_without_samples() {
        let g = Gesture::new(0, "empty");
        assert_eq!(
            g.mean_stroke(8).unwrap_err(),
            GestureError::InsufficientData
        );
    }
}
