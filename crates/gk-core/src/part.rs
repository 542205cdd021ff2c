//! One recognition channel: its gesture collection, frame-of-reference
//! policy, continuous-identification settings, published model slot and the
//! in-progress stroke (at most one at any time).

use crate::constants::{DEFAULT_CONTD_PERIOD_MS, DEFAULT_CONTD_SMOOTHING};
use crate::error::{GestureError, Result};
use crate::euler;
use crate::frame::FrameConfig;
use crate::gesture::{Gesture, MeanStroke, Sample, StrokeFrame};
use crate::identify::{self, Candidate, ContdState, Identification};
use crate::model::{self, ModelSlot};
use crate::pose::Pose;
use crate::quaternion::Quaternion;
use crate::stroke::{Stroke, StrokeMode, StrokeSummary};
use crate::vec3::Vec3;

/// What `end_stroke` produced. The summary (centroid, scale, principal
/// axes) is returned in both modes for live visual feedback.
#[derive(Clone, Debug)]
pub enum StrokeOutcome {
    Recorded {
        gesture_id: u32,
        summary: StrokeSummary,
    },
    Identified {
        result: Identification,
        summary: StrokeSummary,
    },
}

impl StrokeOutcome {
    pub fn summary(&self) -> &StrokeSummary {
        match self {
            Self::Recorded { summary, .. } | Self::Identified { summary, .. } => summary,
        }
    }
}

/// An independent recognition channel (one hand, or one sequential phase).
#[derive(Debug)]
pub struct Part {
    gestures: Vec<Gesture>,
    /// Monotonic id source; deleted gesture ids are never handed out again.
    next_gesture_id: u32,
    pub frame: FrameConfig,
    contd_period_ms: u32,
    contd_smoothing: usize,
    enabled: bool,
    stroke: Option<Stroke>,
    model: ModelSlot,
    contd_state: ContdState,
    latest: Option<Candidate>,
}

impl Default for Part {
    fn default() -> Self {
        Self::new()
    }
}

impl Part {
    pub fn new() -> Self {
        Self {
            gestures: Vec::new(),
            next_gesture_id: 0,
            frame: FrameConfig::default(),
            contd_period_ms: DEFAULT_CONTD_PERIOD_MS,
            contd_smoothing: DEFAULT_CONTD_SMOOTHING,
            enabled: true,
            stroke: None,
            model: ModelSlot::new(),
            contd_state: ContdState::default(),
            latest: None,
        }
    }

    // --- Gesture store ---

    pub fn gesture_count(&self) -> usize {
        self.gestures.len()
    }

    /// Gesture ids in registration order.
    pub fn gesture_ids(&self) -> Vec<u32> {
        self.gestures.iter().map(|g| g.id).collect()
    }

    /// Enabled gesture ids in registration order — the "live" set that
    /// probability vectors cover.
    pub fn enabled_gesture_ids(&self) -> Vec<u32> {
        self.gestures
            .iter()
            .filter(|g| g.enabled)
            .map(|g| g.id)
            .collect()
    }

    pub fn gestures(&self) -> &[Gesture] {
        &self.gestures
    }

    pub fn create_gesture(&mut self, name: &str) -> u32 {
        let id = self.next_gesture_id;
        self.next_gesture_id += 1;
        self.gestures.push(Gesture::new(id, name));
        self.model.mark_stale();
        id
    }

    pub fn delete_gesture(&mut self, id: u32) -> Result<()> {
        let pos = self
            .gestures
            .iter()
            .position(|g| g.id == id)
            .ok_or(GestureError::InvalidIndex)?;
        self.gestures.remove(pos);
        self.model.mark_stale();
        // A cached result naming the deleted gesture is meaningless now.
        if self.latest.is_some_and(|c| c.gesture_id == id) {
            self.latest = None;
        }
        Ok(())
    }

    pub fn delete_all_gestures(&mut self) {
        self.gestures.clear();
        self.latest = None;
        self.model.mark_stale();
    }

    pub fn gesture(&self, id: u32) -> Result<&Gesture> {
        self.gestures
            .iter()
            .find(|g| g.id == id)
            .ok_or(GestureError::InvalidIndex)
    }

    fn gesture_mut(&mut self, id: u32) -> Result<&mut Gesture> {
        self.gestures
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(GestureError::InvalidIndex)
    }

    pub fn gesture_name(&self, id: u32) -> Result<&str> {
        Ok(&self.gesture(id)?.name)
    }

    pub fn set_gesture_name(&mut self, id: u32, name: &str) -> Result<()> {
        self.gesture_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn gesture_enabled(&self, id: u32) -> Result<bool> {
        Ok(self.gesture(id)?.enabled)
    }

    /// Disabled gestures keep their samples but leave the live set used by
    /// training and identification.
    pub fn set_gesture_enabled(&mut self, id: u32, enabled: bool) -> Result<()> {
        let gesture = self.gesture_mut(id)?;
        if gesture.enabled != enabled {
            gesture.enabled = enabled;
            self.model.mark_stale();
        }
        Ok(())
    }

    pub fn gesture_metadata(&self, id: u32) -> Result<&str> {
        Ok(&self.gesture(id)?.metadata)
    }

    pub fn set_gesture_metadata(&mut self, id: u32, metadata: &str) -> Result<()> {
        self.gesture_mut(id)?.metadata = metadata.to_string();
        Ok(())
    }

    pub fn sample_count(&self, id: u32) -> Result<usize> {
        Ok(self.gesture(id)?.sample_count())
    }

    pub fn sample_len(&self, id: u32, sample: usize, processed: bool) -> Result<usize> {
        Ok(self.gesture(id)?.sample(sample)?.len(processed))
    }

    pub fn sample_stroke(&self, id: u32, sample: usize, processed: bool) -> Result<&[StrokeFrame]> {
        let sample = self.gesture(id)?.sample(sample)?;
        Ok(if processed {
            &sample.processed
        } else {
            &sample.frames
        })
    }

    pub fn delete_sample(&mut self, id: u32, sample: usize) -> Result<()> {
        self.gesture_mut(id)?.delete_sample(sample)?;
        self.model.mark_stale();
        Ok(())
    }

    /// Attach an externally produced sample (gesture copy, import).
    pub(crate) fn append_sample(&mut self, id: u32, sample: Sample) -> Result<()> {
        self.gesture_mut(id)?.samples.push(sample);
        self.model.mark_stale();
        Ok(())
    }

    /// Deleting the last sample does not delete the gesture.
    pub fn delete_all_samples(&mut self, id: u32) -> Result<()> {
        self.gesture_mut(id)?.samples.clear();
        self.model.mark_stale();
        Ok(())
    }

    pub fn mean_stroke(&self, id: u32) -> Result<MeanStroke> {
        let resolution = self.model.load().resolution;
        self.gesture(id)?.mean_stroke(resolution)
    }

    // --- Part flags and tuning ---

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn contd_identification_period(&self) -> u32 {
        self.contd_period_ms
    }

    pub fn set_contd_identification_period(&mut self, ms: u32) -> Result<()> {
        if ms == 0 {
            return Err(GestureError::InvalidParameter);
        }
        self.contd_period_ms = ms;
        Ok(())
    }

    pub fn contd_identification_smoothing(&self) -> usize {
        self.contd_smoothing
    }

    pub fn set_contd_identification_smoothing(&mut self, samples: usize) -> Result<()> {
        if samples == 0 {
            return Err(GestureError::InvalidParameter);
        }
        self.contd_smoothing = samples;
        Ok(())
    }

    // --- Stroke state machine ---

    pub fn is_stroke_started(&self) -> bool {
        self.stroke.is_some()
    }

    /// Open a stroke. `record_as_sample` selects record mode for that
    /// gesture; `None` selects identification mode.
    pub fn start_stroke(&mut self, hmd: Pose, record_as_sample: Option<u32>) -> Result<()> {
        if self.stroke.is_some() {
            return Err(GestureError::StrokeNotEnded);
        }
        let mode = match record_as_sample {
            Some(id) => {
                self.gesture(id)?;
                StrokeMode::Record(id)
            }
            None => StrokeMode::Identify,
        };
        self.stroke = Some(Stroke::new(hmd, mode));
        Ok(())
    }

    pub fn continue_stroke(&mut self, position: Vec3) -> Result<()> {
        self.push_frame(position, None)
    }

    pub fn continue_stroke_with_rotation(
        &mut self,
        position: Vec3,
        rotation: Quaternion,
    ) -> Result<()> {
        self.push_frame(position, Some(rotation))
    }

    /// Euler-angle input, interpreted under this part's rotation order.
    pub fn continue_stroke_with_euler(&mut self, position: Vec3, angles: Vec3) -> Result<()> {
        let rotation = euler::compose(self.frame.rotation_order, angles);
        self.push_frame(position, Some(rotation))
    }

    /// A full 4x4 pose matrix as produced by engine transform hierarchies.
    pub fn continue_stroke_with_matrix(&mut self, matrix: &[[f64; 4]; 4]) -> Result<()> {
        let pose = Pose::from_matrix(matrix)?;
        self.push_frame(pose.position, Some(pose.rotation))
    }

    fn push_frame(&mut self, position: Vec3, rotation: Option<Quaternion>) -> Result<()> {
        let stroke = self.stroke.as_mut().ok_or(GestureError::StrokeNotStarted)?;
        stroke.push(position, rotation);
        Ok(())
    }

    /// Submit a fresh headset pose mid-stroke. Honored by normalization
    /// only under the UseLatest head-position policy.
    pub fn update_head_position(&mut self, hmd: Pose) -> Result<()> {
        let stroke = self.stroke.as_mut().ok_or(GestureError::StrokeNotStarted)?;
        stroke.update_head(hmd);
        Ok(())
    }

    /// Discard the open stroke. The gesture store is left untouched.
    pub fn cancel_stroke(&mut self) -> Result<()> {
        if self.stroke.take().is_none() {
            return Err(GestureError::StrokeNotStarted);
        }
        self.contd_state.clear();
        Ok(())
    }

    /// Close the stroke and consume it according to its mode. The stroke is
    /// closed regardless of the outcome; a failure after this point never
    /// leaves the part mid-stroke.
    pub fn end_stroke(&mut self) -> Result<StrokeOutcome> {
        let stroke = self.stroke.take().ok_or(GestureError::StrokeNotStarted)?;
        self.contd_state.clear();

        let processed = self
            .frame
            .normalize_frames(&stroke.frames, &stroke.hmd_start);
        let positions: Vec<Vec3> = processed.iter().map(|f| f.position).collect();
        let summary = StrokeSummary::from_positions(&positions)?;

        match stroke.mode {
            StrokeMode::Record(gesture_id) => {
                let gesture = self.gesture_mut(gesture_id)?;
                gesture.samples.push(Sample {
                    hmd: stroke.hmd_start,
                    frames: stroke.frames,
                    processed,
                });
                self.model.mark_stale();
                Ok(StrokeOutcome::Recorded {
                    gesture_id,
                    summary,
                })
            }
            StrokeMode::Identify => {
                let model = self.model.load();
                let features = model::features(&processed, model.resolution)?;
                let enabled = self.enabled_gesture_ids();
                match identify::identify(&model, &enabled, &features) {
                    Ok(result) => {
                        self.latest = Some(Candidate {
                            gesture_id: result.gesture_id,
                            probability: result.probability,
                            similarity: result.similarity,
                        });
                        Ok(StrokeOutcome::Identified { result, summary })
                    }
                    Err(e) => {
                        self.latest = None;
                        Err(e)
                    }
                }
            }
        }
    }

    // --- Continuous identification ---

    /// Identify the trailing window of the open stroke and smooth the
    /// resulting gesture-id stream. Returns the smoothed primary answer
    /// with the raw per-gesture vector of the newest window.
    pub fn contd_identify(&mut self, hmd: Pose) -> Result<Identification> {
        let period = self.contd_period_ms;
        let (window, initial) = {
            let stroke = self.stroke.as_mut().ok_or(GestureError::StrokeNotStarted)?;
            stroke.update_head(hmd);
            (stroke.window(period).to_vec(), stroke.hmd_start)
        };
        if window.len() < 2 {
            return Err(GestureError::InsufficientData);
        }

        let processed = self.frame.normalize_frames(&window, &initial);
        let model = self.model.load();
        let features = model::features(&processed, model.resolution)?;
        let enabled = self.enabled_gesture_ids();
        let raw = identify::identify(&model, &enabled, &features)?;

        self.contd_state.push(
            Candidate {
                gesture_id: raw.gesture_id,
                probability: raw.probability,
                similarity: raw.similarity,
            },
            self.contd_smoothing,
        );
        let smoothed = self.contd_state.smoothed().expect("history nonempty");
        self.latest = Some(smoothed);

        Ok(Identification {
            gesture_id: smoothed.gesture_id,
            probability: smoothed.probability,
            similarity: smoothed.similarity,
            candidates: raw.candidates,
        })
    }

    /// Record the trailing window of an open record-mode stroke as one
    /// sample, for continuous gestures that have no discrete end.
    pub fn contd_record(&mut self, hmd: Pose) -> Result<()> {
        let period = self.contd_period_ms;
        let (window, initial, gesture_id) = {
            let stroke = self.stroke.as_mut().ok_or(GestureError::StrokeNotStarted)?;
            let StrokeMode::Record(gesture_id) = stroke.mode else {
                return Err(GestureError::InvalidParameter);
            };
            stroke.update_head(hmd);
            (stroke.window(period).to_vec(), stroke.hmd_start, gesture_id)
        };
        if window.len() < 2 {
            return Err(GestureError::InsufficientData);
        }

        let processed = self.frame.normalize_frames(&window, &initial);
        let gesture = self.gesture_mut(gesture_id)?;
        gesture.samples.push(Sample {
            hmd: initial,
            frames: window,
            processed,
        });
        self.model.mark_stale();
        Ok(())
    }

    // --- Model access ---

    pub fn model_slot(&self) -> &ModelSlot {
        &self.model
    }

    /// Score of the model currently in place — not of a live training run.
    pub fn recognition_score(&self) -> f64 {
        self.model.load().score
    }

    pub fn latest_result(&self) -> Option<Candidate> {
        self.latest
    }

    /// Processed strokes of every enabled gesture, cloned for the trainer.
    pub fn training_strokes(&self) -> Vec<(u32, Vec<Vec<StrokeFrame>>)> {
        self.gestures
            .iter()
            .filter(|g| g.enabled)
            .map(|g| {
                (
                    g.id,
                    g.samples.iter().map(|s| s.processed.clone()).collect(),
                )
            })
            .collect()
    }

    /// Restore the gesture collection wholesale (persistence path).
    pub fn restore(&mut self, gestures: Vec<Gesture>, next_gesture_id: u32) {
        let floor = gestures.iter().map(|g| g.id + 1).max().unwrap_or(0);
        self.gestures = gestures;
        self.next_gesture_id = next_gesture_id.max(floor);
        self.latest = None;
        self.contd_state.clear();
        self.model.mark_stale();
    }

    pub fn next_gesture_id(&self) -> u32 {
        self.next_gesture_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_RESOLUTION;

    fn hmd() -> Pose {
        Pose::identity()
    }

    /// Drive a straight-line stroke through the state machine.
    fn run_stroke(part: &mut Part, dir: Vec3, record: Option<u32>) -> Result<StrokeOutcome> {
        part.start_stroke(hmd(), record)?;
        for i in 0..20 {
            part.continue_stroke(dir * (i as f64 / 19.0))?;
        }
        part.end_stroke()
    }

    fn x_axis() -> Vec3 {
        Vec3::new(1.0, 0.0, 0.0)
    }

    fn y_axis() -> Vec3 {
        Vec3::new(0.0, 1.0, 0.0)
    }

    #[test]
    fn test_record_appends_exactly_one_sample() {
        let mut part = Part::new();
        let g = part.create_gesture("swipe");
        let outcome = run_stroke(&mut part, x_axis(), Some(g)).unwrap();
        assert!(matches!(
            outcome,
            StrokeOutcome::Recorded { gesture_id, .. } if gesture_id == g
        ));
        assert_eq!(part.sample_count(g).unwrap(), 1);
        assert!(!part.is_stroke_started(), "part returns to idle");
    }

    #[test]
    fn test_identify_mode_appends_nothing() {
        let mut part = Part::new();
        let g = part.create_gesture("swipe");
        // No model yet: identification reports no match, but the stroke
        // closes and no sample appears.
        let err = run_stroke(&mut part, x_axis(), None).unwrap_err();
        assert_eq!(err, GestureError::NoMatch);
        assert_eq!(part.sample_count(g).unwrap(), 0);
        assert!(!part.is_stroke_started());
    }

    #[test]
    fn test_cancel_leaves_store_unchanged() {
        let mut part = Part::new();
        let g = part.create_gesture("swipe");
        run_stroke(&mut part, x_axis(), Some(g)).unwrap();

        part.start_stroke(hmd(), Some(g)).unwrap();
        part.continue_stroke(Vec3::new(0.3, 0.0, 0.0)).unwrap();
        part.cancel_stroke().unwrap();

        assert_eq!(part.sample_count(g).unwrap(), 1);
        assert!(!part.is_stroke_started());
        assert_eq!(
            part.cancel_stroke().unwrap_err(),
            GestureError::StrokeNotStarted
        );
    }

    #[test]
    fn test_stroke_state_errors() {
        let mut part = Part::new();
        assert_eq!(
            part.continue_stroke(Vec3::ZERO).unwrap_err(),
            GestureError::StrokeNotStarted
        );
        assert_eq!(
            part.end_stroke().unwrap_err(),
            GestureError::StrokeNotStarted
        );
        assert_eq!(
            part.update_head_position(hmd()).unwrap_err(),
            GestureError::StrokeNotStarted
        );

        part.start_stroke(hmd(), None).unwrap();
        assert_eq!(
            part.start_stroke(hmd(), None).unwrap_err(),
            GestureError::StrokeNotEnded
        );
    }

    #[test]
    fn test_start_stroke_validates_gesture_id() {
        let mut part = Part::new();
        assert_eq!(
            part.start_stroke(hmd(), Some(42)).unwrap_err(),
            GestureError::InvalidIndex
        );
        assert!(!part.is_stroke_started(), "failed start leaves part idle");
    }

    #[test]
    fn test_empty_stroke_is_insufficient() {
        let mut part = Part::new();
        part.create_gesture("g");
        part.start_stroke(hmd(), Some(0)).unwrap();
        assert_eq!(
            part.end_stroke().unwrap_err(),
            GestureError::InsufficientData
        );
        assert!(!part.is_stroke_started(), "stroke closed regardless");
    }

    #[test]
    fn test_gesture_ids_not_reused_after_delete() {
        let mut part = Part::new();
        for i in 0..5 {
            part.create_gesture(&format!("g{i}"));
        }
        part.delete_gesture(2).unwrap();
        let fresh = part.create_gesture("new");
        assert_eq!(fresh, 5, "deleted id 2 must not be handed out again");
        assert_eq!(part.gesture_ids(), vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn test_store_accessors_and_invalid_index() {
        let mut part = Part::new();
        let g = part.create_gesture("circle");
        part.set_gesture_name(g, "ring").unwrap();
        assert_eq!(part.gesture_name(g).unwrap(), "ring");
        part.set_gesture_metadata(g, "{\"hint\":1}").unwrap();
        assert_eq!(part.gesture_metadata(g).unwrap(), "{\"hint\":1}");

        assert_eq!(part.gesture_name(99).unwrap_err(), GestureError::InvalidIndex);
        assert_eq!(part.sample_count(99).unwrap_err(), GestureError::InvalidIndex);
        assert_eq!(part.delete_gesture(99).unwrap_err(), GestureError::InvalidIndex);
        assert_eq!(
            part.delete_all_samples(99).unwrap_err(),
            GestureError::InvalidIndex
        );
    }

    #[test]
    fn test_disable_retains_samples() {
        let mut part = Part::new();
        let g = part.create_gesture("swipe");
        run_stroke(&mut part, x_axis(), Some(g)).unwrap();

        part.set_gesture_enabled(g, false).unwrap();
        assert!(!part.gesture_enabled(g).unwrap());
        assert_eq!(part.sample_count(g).unwrap(), 1, "samples retained");
        assert!(part.enabled_gesture_ids().is_empty());

        part.set_gesture_enabled(g, true).unwrap();
        assert_eq!(part.enabled_gesture_ids(), vec![g]);
    }

    #[test]
    fn test_raw_and_processed_sample_access() {
        let mut part = Part::new();
        let g = part.create_gesture("swipe");
        run_stroke(&mut part, x_axis(), Some(g)).unwrap();

        assert_eq!(part.sample_len(g, 0, false).unwrap(), 20);
        assert_eq!(part.sample_len(g, 0, true).unwrap(), 20);
        let raw = part.sample_stroke(g, 0, false).unwrap();
        let processed = part.sample_stroke(g, 0, true).unwrap();
        // Identity head pose: normalization is a no-op here.
        assert_eq!(raw[5].position, processed[5].position);
        assert_eq!(
            part.sample_stroke(g, 1, false).unwrap_err(),
            GestureError::InvalidIndex
        );
    }

    #[test]
    fn test_identify_with_manual_model() {
        let mut part = Part::new();
        let ga = part.create_gesture("along-x");
        let gb = part.create_gesture("along-y");
        for _ in 0..3 {
            run_stroke(&mut part, x_axis(), Some(ga)).unwrap();
            run_stroke(&mut part, y_axis(), Some(gb)).unwrap();
        }

        // Fit a model directly from the recorded strokes.
        let training: Vec<(u32, Vec<Vec<f64>>)> = part
            .training_strokes()
            .iter()
            .map(|(id, strokes)| {
                (
                    *id,
                    strokes
                        .iter()
                        .map(|s| model::features(s, DEFAULT_RESOLUTION).unwrap())
                        .collect(),
                )
            })
            .collect();
        part.model_slot()
            .store(model::fit(&training, DEFAULT_RESOLUTION, 1.0, 1.0));

        let outcome = run_stroke(&mut part, x_axis(), None).unwrap();
        let StrokeOutcome::Identified { result, summary } = outcome else {
            panic!("expected identification");
        };
        assert_eq!(result.gesture_id, ga);
        assert!(result.probability > 0.5);
        assert_eq!(result.candidates.len(), 2);
        assert!(summary.scale > 0.0);
        assert_eq!(part.latest_result().unwrap().gesture_id, ga);
    }

    #[test]
    fn test_contd_identify_smooths_over_windows() {
        let mut part = Part::new();
        let ga = part.create_gesture("along-x");
        let gb = part.create_gesture("along-y");
        for _ in 0..3 {
            run_stroke(&mut part, x_axis(), Some(ga)).unwrap();
            run_stroke(&mut part, y_axis(), Some(gb)).unwrap();
        }
        let training: Vec<(u32, Vec<Vec<f64>>)> = part
            .training_strokes()
            .iter()
            .map(|(id, strokes)| {
                (
                    *id,
                    strokes
                        .iter()
                        .map(|s| model::features(s, DEFAULT_RESOLUTION).unwrap())
                        .collect(),
                )
            })
            .collect();
        part.model_slot()
            .store(model::fit(&training, DEFAULT_RESOLUTION, 1.0, 1.0));

        part.start_stroke(hmd(), None).unwrap();
        for i in 0..20 {
            part.continue_stroke(x_axis() * (i as f64 / 19.0)).unwrap();
        }
        let result = part.contd_identify(hmd()).unwrap();
        assert_eq!(result.gesture_id, ga);
        part.cancel_stroke().unwrap();
    }

    #[test]
    fn test_contd_record_requires_record_mode() {
        let mut part = Part::new();
        part.create_gesture("g");
        part.start_stroke(hmd(), None).unwrap();
        for i in 0..5 {
            part.continue_stroke(x_axis() * i as f64).unwrap();
        }
        assert_eq!(
            part.contd_record(hmd()).unwrap_err(),
            GestureError::InvalidParameter
        );
        part.cancel_stroke().unwrap();

        part.start_stroke(hmd(), Some(0)).unwrap();
        for i in 0..5 {
            part.continue_stroke(x_axis() * i as f64).unwrap();
        }
        part.contd_record(hmd()).unwrap();
        assert_eq!(part.sample_count(0).unwrap(), 1);
        part.cancel_stroke().unwrap();
    }

    #[test]
    fn test_contd_tuning_validation() {
        let mut part = Part::new();
        assert_eq!(
            part.set_contd_identification_period(0).unwrap_err(),
            GestureError::InvalidParameter
        );
        part.set_contd_identification_period(250).unwrap();
        assert_eq!(part.contd_identification_period(), 250);

        assert_eq!(
            part.set_contd_identification_smoothing(0).unwrap_err(),
            GestureError::InvalidParameter
        );
        part.set_contd_identification_smoothing(9).unwrap();
        assert_eq!(part.contd_identification_smoothing(), 9);
    }

    #[test]
    fn test_restore_keeps_id_monotonicity() {
        let mut part = Part::new();
        part.restore(vec![Gesture::new(4, "loaded")], 0);
        let id = part.create_gesture("fresh");
        assert!(id > 4, "restored ids must not be reissued");
    }
}
