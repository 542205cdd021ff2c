//! Multi-part (e.g. bimanual) gesture systems.
//!
//! A `GestureCombinations` holds N independently configured parts plus a
//! set of named combinations, each requiring one gesture per part (or none
//! for parts the combination does not use). Per-part identification runs
//! through the parts themselves; the combination identifier aggregates the
//! latest per-part results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GestureError, Result};
use crate::gesture::{MeanStroke, Sample, StrokeFrame};
use crate::identify::Identification;
use crate::part::{Part, StrokeOutcome};
use crate::pose::Pose;
use crate::quaternion::Quaternion;
use crate::trainer::{Trainer, TrainingObserver, TrainingSet};
use crate::vec3::Vec3;

/// A named multi-part gesture: one required gesture id per part, or `None`
/// for parts this combination leaves unused.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Combination {
    pub id: u32,
    pub name: String,
    pub metadata: String,
    pub required: Vec<Option<u32>>,
}

/// Result of identifying the latest per-part results as one combination.
#[derive(Clone, Debug)]
pub struct CombinationResult {
    pub combination_id: u32,
    pub probability: f64,
    pub similarity: f64,
    /// Latest per-part scores, one entry per part, for diagnostics.
    pub part_probabilities: Vec<f64>,
    pub part_similarities: Vec<f64>,
}

/// A recognition system with N parts and a combination set.
#[derive(Debug)]
pub struct GestureCombinations {
    parts: Vec<Part>,
    combinations: Vec<Combination>,
    next_combination_id: u32,
    trainer: Trainer,
}

impl GestureCombinations {
    pub fn new(parts: usize) -> Result<Self> {
        if parts == 0 {
            return Err(GestureError::InvalidParameter);
        }
        Ok(Self {
            parts: (0..parts).map(|_| Part::new()).collect(),
            combinations: Vec::new(),
            next_combination_id: 0,
            trainer: Trainer::new(),
        })
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, part: usize) -> Result<&Part> {
        self.parts.get(part).ok_or(GestureError::InvalidIndex)
    }

    pub(crate) fn part_mut(&mut self, part: usize) -> Result<&mut Part> {
        self.parts.get_mut(part).ok_or(GestureError::InvalidIndex)
    }

    fn ensure_not_training(&self) -> Result<()> {
        if self.trainer.is_training() {
            return Err(GestureError::CurrentlyTraining);
        }
        Ok(())
    }

    // --- Part flags and configuration ---

    pub fn frame_config(&self, part: usize) -> Result<crate::frame::FrameConfig> {
        Ok(self.part(part)?.frame)
    }

    pub fn set_frame_config(&mut self, part: usize, config: crate::frame::FrameConfig) -> Result<()> {
        self.part_mut(part)?.frame = config;
        Ok(())
    }

    pub fn part_enabled(&self, part: usize) -> Result<bool> {
        Ok(self.part(part)?.is_enabled())
    }

    /// Disabled parts keep their data but are excluded from combination
    /// scoring and training.
    pub fn set_part_enabled(&mut self, part: usize, enabled: bool) -> Result<()> {
        self.part_mut(part)?.set_enabled(enabled);
        Ok(())
    }

    // --- Per-part gesture store ---

    pub fn create_gesture(&mut self, part: usize, name: &str) -> Result<u32> {
        self.ensure_not_training()?;
        Ok(self.part_mut(part)?.create_gesture(name))
    }

    pub fn delete_gesture(&mut self, part: usize, id: u32) -> Result<()> {
        self.ensure_not_training()?;
        self.part_mut(part)?.delete_gesture(id)
    }

    pub fn delete_all_gestures(&mut self, part: usize) -> Result<()> {
        self.ensure_not_training()?;
        self.part_mut(part)?.delete_all_gestures();
        Ok(())
    }

    pub fn gesture_count(&self, part: usize) -> Result<usize> {
        Ok(self.part(part)?.gesture_count())
    }

    pub fn gesture_ids(&self, part: usize) -> Result<Vec<u32>> {
        Ok(self.part(part)?.gesture_ids())
    }

    pub fn gesture_name(&self, part: usize, id: u32) -> Result<&str> {
        self.part(part)?.gesture_name(id)
    }

    pub fn set_gesture_name(&mut self, part: usize, id: u32, name: &str) -> Result<()> {
        self.part_mut(part)?.set_gesture_name(id, name)
    }

    pub fn gesture_enabled(&self, part: usize, id: u32) -> Result<bool> {
        self.part(part)?.gesture_enabled(id)
    }

    pub fn set_gesture_enabled(&mut self, part: usize, id: u32, enabled: bool) -> Result<()> {
        self.ensure_not_training()?;
        self.part_mut(part)?.set_gesture_enabled(id, enabled)
    }

    pub fn gesture_metadata(&self, part: usize, id: u32) -> Result<&str> {
        self.part(part)?.gesture_metadata(id)
    }

    pub fn set_gesture_metadata(&mut self, part: usize, id: u32, metadata: &str) -> Result<()> {
        self.part_mut(part)?.set_gesture_metadata(id, metadata)
    }

    pub fn sample_count(&self, part: usize, id: u32) -> Result<usize> {
        self.part(part)?.sample_count(id)
    }

    pub fn sample_len(&self, part: usize, id: u32, sample: usize, processed: bool) -> Result<usize> {
        self.part(part)?.sample_len(id, sample, processed)
    }

    pub fn sample_stroke(
        &self,
        part: usize,
        id: u32,
        sample: usize,
        processed: bool,
    ) -> Result<&[StrokeFrame]> {
        self.part(part)?.sample_stroke(id, sample, processed)
    }

    pub fn delete_sample(&mut self, part: usize, id: u32, sample: usize) -> Result<()> {
        self.ensure_not_training()?;
        self.part_mut(part)?.delete_sample(id, sample)
    }

    pub fn delete_all_samples(&mut self, part: usize, id: u32) -> Result<()> {
        self.ensure_not_training()?;
        self.part_mut(part)?.delete_all_samples(id)
    }

    pub fn mean_stroke(&self, part: usize, id: u32) -> Result<MeanStroke> {
        self.part(part)?.mean_stroke(id)
    }

    /// Copy a gesture's samples across parts, optionally mirrored per axis.
    /// With `into` unset a new gesture is created in the target part under
    /// the source name; otherwise samples are appended to the given gesture.
    pub fn copy_gesture(
        &mut self,
        from_part: usize,
        from_id: u32,
        to_part: usize,
        into: Option<u32>,
        mirror: (bool, bool, bool),
    ) -> Result<u32> {
        self.ensure_not_training()?;
        let source = self.part(from_part)?.gesture(from_id)?;
        let name = source.name.clone();
        let samples: Vec<Sample> = source
            .samples
            .iter()
            .map(|s| mirror_sample(s, mirror))
            .collect();

        let target = self.part_mut(to_part)?;
        let target_id = match into {
            Some(id) => {
                target.gesture(id)?;
                id
            }
            None => target.create_gesture(&name),
        };
        for sample in samples {
            target.append_sample(target_id, sample)?;
        }
        Ok(target_id)
    }

    // --- Stroke state machine, per part ---

    pub fn is_stroke_started(&self, part: usize) -> Result<bool> {
        Ok(self.part(part)?.is_stroke_started())
    }

    pub fn start_stroke(
        &mut self,
        part: usize,
        hmd: Pose,
        record_as_sample: Option<u32>,
    ) -> Result<()> {
        if record_as_sample.is_some() {
            self.ensure_not_training()?;
        }
        self.part_mut(part)?.start_stroke(hmd, record_as_sample)
    }

    pub fn continue_stroke(&mut self, part: usize, position: Vec3) -> Result<()> {
        self.part_mut(part)?.continue_stroke(position)
    }

    pub fn continue_stroke_with_rotation(
        &mut self,
        part: usize,
        position: Vec3,
        rotation: Quaternion,
    ) -> Result<()> {
        self.part_mut(part)?
            .continue_stroke_with_rotation(position, rotation)
    }

    pub fn continue_stroke_with_euler(
        &mut self,
        part: usize,
        position: Vec3,
        angles: Vec3,
    ) -> Result<()> {
        self.part_mut(part)?
            .continue_stroke_with_euler(position, angles)
    }

    pub fn continue_stroke_with_matrix(
        &mut self,
        part: usize,
        matrix: &[[f64; 4]; 4],
    ) -> Result<()> {
        self.part_mut(part)?.continue_stroke_with_matrix(matrix)
    }

    /// Submit a fresh headset pose to every part with an open stroke.
    pub fn update_head_position(&mut self, hmd: Pose) -> Result<()> {
        for part in &mut self.parts {
            if part.is_stroke_started() {
                part.update_head_position(hmd)?;
            }
        }
        Ok(())
    }

    pub fn cancel_stroke(&mut self, part: usize) -> Result<()> {
        self.part_mut(part)?.cancel_stroke()
    }

    pub fn end_stroke(&mut self, part: usize) -> Result<StrokeOutcome> {
        self.part_mut(part)?.end_stroke()
    }

    pub fn contd_identify_part(&mut self, part: usize, hmd: Pose) -> Result<Identification> {
        self.part_mut(part)?.contd_identify(hmd)
    }

    pub fn contd_record(&mut self, part: usize, hmd: Pose) -> Result<()> {
        self.ensure_not_training()?;
        self.part_mut(part)?.contd_record(hmd)
    }

    /// Run continuous identification on every enabled part with an open
    /// stroke, then score the combinations against the refreshed results.
    pub fn contd_identify(&mut self, hmd: Pose) -> Result<CombinationResult> {
        for part in &mut self.parts {
            if part.is_enabled() && part.is_stroke_started() {
                // A part whose window cannot be identified keeps its
                // previous latest result.
                let _ = part.contd_identify(hmd);
            }
        }
        self.identify_gesture_combination()
    }

    pub fn contd_identification_period(&self, part: usize) -> Result<u32> {
        Ok(self.part(part)?.contd_identification_period())
    }

    pub fn set_contd_identification_period(&mut self, part: usize, ms: u32) -> Result<()> {
        self.part_mut(part)?.set_contd_identification_period(ms)
    }

    pub fn contd_identification_smoothing(&self, part: usize) -> Result<usize> {
        Ok(self.part(part)?.contd_identification_smoothing())
    }

    pub fn set_contd_identification_smoothing(&mut self, part: usize, samples: usize) -> Result<()> {
        self.part_mut(part)?.set_contd_identification_smoothing(samples)
    }

    /// Latest per-part probability/similarity, for diagnostics.
    pub fn part_scores(&self, part: usize) -> Result<(f64, f64)> {
        let latest = self.part(part)?.latest_result();
        Ok(latest.map_or((0.0, 0.0), |c| (c.probability, c.similarity)))
    }

    // --- Combination store ---

    pub fn combination_count(&self) -> usize {
        self.combinations.len()
    }

    pub fn combination_ids(&self) -> Vec<u32> {
        self.combinations.iter().map(|c| c.id).collect()
    }

    pub fn combinations(&self) -> &[Combination] {
        &self.combinations
    }

    pub fn create_combination(&mut self, name: &str) -> u32 {
        let id = self.next_combination_id;
        self.next_combination_id += 1;
        self.combinations.push(Combination {
            id,
            name: name.to_string(),
            metadata: String::new(),
            required: vec![None; self.parts.len()],
        });
        id
    }

    pub fn delete_combination(&mut self, id: u32) -> Result<()> {
        let pos = self
            .combinations
            .iter()
            .position(|c| c.id == id)
            .ok_or(GestureError::InvalidIndex)?;
        self.combinations.remove(pos);
        Ok(())
    }

    pub fn delete_all_combinations(&mut self) {
        self.combinations.clear();
    }

    fn combination(&self, id: u32) -> Result<&Combination> {
        self.combinations
            .iter()
            .find(|c| c.id == id)
            .ok_or(GestureError::InvalidIndex)
    }

    fn combination_mut(&mut self, id: u32) -> Result<&mut Combination> {
        self.combinations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(GestureError::InvalidIndex)
    }

    pub fn combination_name(&self, id: u32) -> Result<&str> {
        Ok(&self.combination(id)?.name)
    }

    pub fn set_combination_name(&mut self, id: u32, name: &str) -> Result<()> {
        self.combination_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn combination_metadata(&self, id: u32) -> Result<&str> {
        Ok(&self.combination(id)?.metadata)
    }

    pub fn set_combination_metadata(&mut self, id: u32, metadata: &str) -> Result<()> {
        self.combination_mut(id)?.metadata = metadata.to_string();
        Ok(())
    }

    /// Set which gesture a combination requires on one part. `None` marks
    /// the part unused by this combination.
    pub fn set_combination_part_gesture(
        &mut self,
        id: u32,
        part: usize,
        gesture: Option<u32>,
    ) -> Result<()> {
        if part >= self.parts.len() {
            return Err(GestureError::InvalidIndex);
        }
        if let Some(gesture_id) = gesture {
            self.part(part)?.gesture(gesture_id)?;
        }
        self.combination_mut(id)?.required[part] = gesture;
        Ok(())
    }

    pub fn combination_part_gesture(&self, id: u32, part: usize) -> Result<Option<u32>> {
        self.combination(id)?
            .required
            .get(part)
            .copied()
            .ok_or(GestureError::InvalidIndex)
    }

    // --- Combination identification ---

    /// Score every combination against the latest per-part identification
    /// results and return the best one. A combination scores the minimum
    /// probability over its required parts; any required part whose latest
    /// result does not match drops the combination to zero. Disabled parts
    /// are skipped entirely - neither required nor penalized.
    pub fn identify_gesture_combination(&self) -> Result<CombinationResult> {
        let part_probabilities: Vec<f64> = self
            .parts
            .iter()
            .map(|p| p.latest_result().map_or(0.0, |c| c.probability))
            .collect();
        let part_similarities: Vec<f64> = self
            .parts
            .iter()
            .map(|p| p.latest_result().map_or(0.0, |c| c.similarity))
            .collect();

        let mut best: Option<(u32, f64, f64)> = None;
        for combination in &self.combinations {
            let Some((probability, similarity)) = self.score_combination(combination) else {
                continue;
            };
            let better = match best {
                Some((best_id, best_p, _)) => {
                    probability > best_p
                        || (probability == best_p && combination.id < best_id)
                }
                None => true,
            };
            if better {
                best = Some((combination.id, probability, similarity));
            }
        }

        match best {
            Some((combination_id, probability, similarity)) if probability > 0.0 => {
                Ok(CombinationResult {
                    combination_id,
                    probability,
                    similarity,
                    part_probabilities,
                    part_similarities,
                })
            }
            _ => Err(GestureError::NoMatch),
        }
    }

    fn score_combination(&self, combination: &Combination) -> Option<(f64, f64)> {
        let mut probability: Option<f64> = None;
        let mut similarity: Option<f64> = None;
        for (part, required) in self.parts.iter().zip(&combination.required) {
            let Some(required_id) = required else {
                continue;
            };
            if !part.is_enabled() {
                continue;
            }
            match part.latest_result() {
                Some(latest) if latest.gesture_id == *required_id => {
                    probability = Some(probability.map_or(latest.probability, |p: f64| {
                        p.min(latest.probability)
                    }));
                    similarity = Some(
                        similarity.map_or(latest.similarity, |s: f64| s.min(latest.similarity)),
                    );
                }
                _ => return Some((0.0, 0.0)),
            }
        }
        // A combination with no required part on any enabled part cannot
        // match anything.
        Some((probability?, similarity.unwrap_or(0.0)))
    }

    // --- Training ---

    pub fn start_training(&mut self, observer: Arc<dyn TrainingObserver>) -> Result<()> {
        let sets: Vec<TrainingSet> = self
            .parts
            .iter()
            .filter(|p| p.is_enabled())
            .map(|p| TrainingSet {
                slot: p.model_slot().clone(),
                strokes: p.training_strokes(),
            })
            .collect();
        self.trainer.start(sets, observer)
    }

    pub fn stop_training(&self) -> bool {
        self.trainer.stop()
    }

    pub fn is_training(&self) -> bool {
        self.trainer.is_training()
    }

    /// Block until a running training pass completes. CLI/test convenience.
    pub fn wait_for_training(&mut self) {
        self.trainer.wait();
    }

    pub fn gesture_recognition_score(&self, part: usize) -> Result<f64> {
        Ok(self.part(part)?.recognition_score())
    }

    pub fn max_training_time(&self) -> u64 {
        self.trainer.max_training_time()
    }

    pub fn set_max_training_time(&mut self, seconds: u64) {
        self.trainer.set_max_training_time(seconds);
    }

    pub fn max_training_threads(&self) -> i32 {
        self.trainer.max_training_threads()
    }

    pub fn set_max_training_threads(&mut self, threads: i32) {
        self.trainer.set_max_training_threads(threads);
    }

    // --- Persistence support ---

    pub fn next_combination_id(&self) -> u32 {
        self.next_combination_id
    }

    pub(crate) fn restore_combinations(
        &mut self,
        combinations: Vec<Combination>,
        next_combination_id: u32,
    ) {
        let floor = combinations.iter().map(|c| c.id + 1).max().unwrap_or(0);
        self.combinations = combinations;
        self.next_combination_id = next_combination_id.max(floor);
    }
}

fn mirror_vec(v: Vec3, mirror: (bool, bool, bool)) -> Vec3 {
    Vec3::new(
        if mirror.0 { -v.x } else { v.x },
        if mirror.1 { -v.y } else { v.y },
        if mirror.2 { -v.z } else { v.z },
    )
}

/// Reflect a rotation through the mirrored axes: a reflection across the
/// plane normal to an axis keeps that axis component and negates the others.
fn mirror_quat(q: Quaternion, mirror: (bool, bool, bool)) -> Quaternion {
    let mut q = q;
    if mirror.0 {
        q = Quaternion::new(q.w, q.x, -q.y, -q.z);
    }
    if mirror.1 {
        q = Quaternion::new(q.w, -q.x, q.y, -q.z);
    }
    if mirror.2 {
        q = Quaternion::new(q.w, -q.x, -q.y, q.z);
    }
    q
}

fn mirror_frame(f: &StrokeFrame, mirror: (bool, bool, bool)) -> StrokeFrame {
    StrokeFrame {
        position: mirror_vec(f.position, mirror),
        rotation: mirror_quat(f.rotation, mirror),
        hmd: Pose::new(
            mirror_vec(f.hmd.position, mirror),
            mirror_quat(f.hmd.rotation, mirror),
        ),
        t: f.t,
    }
}

fn mirror_sample(sample: &Sample, mirror: (bool, bool, bool)) -> Sample {
    Sample {
        hmd: Pose::new(
            mirror_vec(sample.hmd.position, mirror),
            mirror_quat(sample.hmd.rotation, mirror),
        ),
        frames: sample.frames.iter().map(|f| mirror_frame(f, mirror)).collect(),
        processed: sample
            .processed
            .iter()
            .map(|f| mirror_frame(f, mirror))
            .collect(),
    }
}
