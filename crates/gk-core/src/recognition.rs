//! The single-part recognition facade: one part plus its trainer, exposing
//! the full contract surface for the common one-handed case.

use std::sync::Arc;

use crate::error::{GestureError, Result};
use crate::frame::FrameConfig;
use crate::gesture::{MeanStroke, StrokeFrame};
use crate::identify::{Candidate, Identification};
use crate::part::{Part, StrokeOutcome};
use crate::pose::Pose;
use crate::quaternion::Quaternion;
use crate::trainer::{Trainer, TrainingObserver, TrainingSet};
use crate::vec3::Vec3;

/// A recognition system with exactly one part.
#[derive(Debug)]
pub struct GestureRecognition {
    part: Part,
    trainer: Trainer,
}

impl Default for GestureRecognition {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureRecognition {
    pub fn new() -> Self {
        Self {
            part: Part::new(),
            trainer: Trainer::new(),
        }
    }

    pub fn part(&self) -> &Part {
        &self.part
    }

    pub(crate) fn part_mut(&mut self) -> &mut Part {
        &mut self.part
    }

    fn ensure_not_training(&self) -> Result<()> {
        if self.trainer.is_training() {
            return Err(GestureError::CurrentlyTraining);
        }
        Ok(())
    }

    // --- Gesture store ---

    pub fn gesture_count(&self) -> usize {
        self.part.gesture_count()
    }

    pub fn gesture_ids(&self) -> Vec<u32> {
        self.part.gesture_ids()
    }

    pub fn enabled_gesture_ids(&self) -> Vec<u32> {
        self.part.enabled_gesture_ids()
    }

    pub fn create_gesture(&mut self, name: &str) -> Result<u32> {
        self.ensure_not_training()?;
        Ok(self.part.create_gesture(name))
    }

    pub fn delete_gesture(&mut self, id: u32) -> Result<()> {
        self.ensure_not_training()?;
        self.part.delete_gesture(id)
    }

    pub fn delete_all_gestures(&mut self) -> Result<()> {
        self.ensure_not_training()?;
        self.part.delete_all_gestures();
        Ok(())
    }

    pub fn gesture_name(&self, id: u32) -> Result<&str> {
        self.part.gesture_name(id)
    }

    pub fn set_gesture_name(&mut self, id: u32, name: &str) -> Result<()> {
        self.part.set_gesture_name(id, name)
    }

    pub fn gesture_enabled(&self, id: u32) -> Result<bool> {
        self.part.gesture_enabled(id)
    }

    pub fn set_gesture_enabled(&mut self, id: u32, enabled: bool) -> Result<()> {
        self.ensure_not_training()?;
        self.part.set_gesture_enabled(id, enabled)
    }

    pub fn gesture_metadata(&self, id: u32) -> Result<&str> {
        self.part.gesture_metadata(id)
    }

    pub fn set_gesture_metadata(&mut self, id: u32, metadata: &str) -> Result<()> {
        self.part.set_gesture_metadata(id, metadata)
    }

    pub fn sample_count(&self, id: u32) -> Result<usize> {
        self.part.sample_count(id)
    }

    pub fn sample_len(&self, id: u32, sample: usize, processed: bool) -> Result<usize> {
        self.part.sample_len(id, sample, processed)
    }

    pub fn sample_stroke(&self, id: u32, sample: usize, processed: bool) -> Result<&[StrokeFrame]> {
        self.part.sample_stroke(id, sample, processed)
    }

    pub fn delete_sample(&mut self, id: u32, sample: usize) -> Result<()> {
        self.ensure_not_training()?;
        self.part.delete_sample(id, sample)
    }

    pub fn delete_all_samples(&mut self, id: u32) -> Result<()> {
        self.ensure_not_training()?;
        self.part.delete_all_samples(id)
    }

    pub fn mean_stroke(&self, id: u32) -> Result<MeanStroke> {
        self.part.mean_stroke(id)
    }

    // --- Frame of reference ---

    pub fn frame_config(&self) -> &FrameConfig {
        &self.part.frame
    }

    pub fn set_frame_config(&mut self, config: FrameConfig) {
        self.part.frame = config;
    }

    // --- Stroke state machine ---

    pub fn is_stroke_started(&self) -> bool {
        self.part.is_stroke_started()
    }

    pub fn start_stroke(&mut self, hmd: Pose, record_as_sample: Option<u32>) -> Result<()> {
        if record_as_sample.is_some() {
            self.ensure_not_training()?;
        }
        self.part.start_stroke(hmd, record_as_sample)
    }

    pub fn continue_stroke(&mut self, position: Vec3) -> Result<()> {
        self.part.continue_stroke(position)
    }

    pub fn continue_stroke_with_rotation(
        &mut self,
        position: Vec3,
        rotation: Quaternion,
    ) -> Result<()> {
        self.part.continue_stroke_with_rotation(position, rotation)
    }

    pub fn continue_stroke_with_euler(&mut self, position: Vec3, angles: Vec3) -> Result<()> {
        self.part.continue_stroke_with_euler(position, angles)
    }

    pub fn continue_stroke_with_matrix(&mut self, matrix: &[[f64; 4]; 4]) -> Result<()> {
        self.part.continue_stroke_with_matrix(matrix)
    }

    pub fn update_head_position(&mut self, hmd: Pose) -> Result<()> {
        self.part.update_head_position(hmd)
    }

    pub fn cancel_stroke(&mut self) -> Result<()> {
        self.part.cancel_stroke()
    }

    pub fn end_stroke(&mut self) -> Result<StrokeOutcome> {
        self.part.end_stroke()
    }

    // --- Continuous identification ---

    pub fn contd_identify(&mut self, hmd: Pose) -> Result<Identification> {
        self.part.contd_identify(hmd)
    }

    pub fn contd_record(&mut self, hmd: Pose) -> Result<()> {
        self.ensure_not_training()?;
        self.part.contd_record(hmd)
    }

    pub fn contd_identification_period(&self) -> u32 {
        self.part.contd_identification_period()
    }

    pub fn set_contd_identification_period(&mut self, ms: u32) -> Result<()> {
        self.part.set_contd_identification_period(ms)
    }

    pub fn contd_identification_smoothing(&self) -> usize {
        self.part.contd_identification_smoothing()
    }

    pub fn set_contd_identification_smoothing(&mut self, samples: usize) -> Result<()> {
        self.part.set_contd_identification_smoothing(samples)
    }

    pub fn latest_result(&self) -> Option<Candidate> {
        self.part.latest_result()
    }

    // --- Training ---

    pub fn start_training(&mut self, observer: Arc<dyn TrainingObserver>) -> Result<()> {
        let set = TrainingSet {
            slot: self.part.model_slot().clone(),
            strokes: self.part.training_strokes(),
        };
        self.trainer.start(vec![set], observer)
    }

    /// Request cooperative cancellation; the last best model stays active.
    /// Returns whether a run was in progress.
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

    /// Held-out score (0-1) of the model in place - not of a live run.
    pub fn recognition_score(&self) -> f64 {
        self.part.recognition_score()
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmd() -> Pose {
        Pose::identity()
    }

    fn record_stroke(gr: &mut GestureRecognition, dir: Vec3, gesture: u32) {
        gr.start_stroke(hmd(), Some(gesture)).unwrap();
        for i in 0..20 {
            gr.continue_stroke(dir * (i as f64 / 19.0)).unwrap();
        }
        gr.end_stroke().unwrap();
    }

    #[test]
    fn test_train_then_identify_end_to_end() {
        let mut gr = GestureRecognition::new();
        let ga = gr.create_gesture("along-x").unwrap();
        let gb = gr.create_gesture("along-y").unwrap();
        for _ in 0..5 {
            record_stroke(&mut gr, Vec3::new(1.0, 0.0, 0.0), ga);
            record_stroke(&mut gr, Vec3::new(0.0, 1.0, 0.0), gb);
        }

        gr.set_max_training_time(10);
        gr.start_training(Arc::new(())).unwrap();
        gr.wait_for_training();
        assert!(!gr.is_training());
        assert!(
            gr.recognition_score() > 0.9,
            "separable training data must score high, got {}",
            gr.recognition_score()
        );

        // Held-out stroke near gesture A's mean.
        gr.start_stroke(hmd(), None).unwrap();
        for i in 0..20 {
            let t = i as f64 / 19.0;
            gr.continue_stroke(Vec3::new(t, 0.02 * (t * 5.0).sin(), 0.0))
                .unwrap();
        }
        let outcome = gr.end_stroke().unwrap();
        let StrokeOutcome::Identified { result, .. } = outcome else {
            panic!("expected identification outcome");
        };
        assert_eq!(result.gesture_id, ga);
        assert!(result.probability > 0.5);
    }

    #[test]
    fn test_structural_mutation_blocked_while_training() {
        let mut gr = GestureRecognition::new();
        let ga = gr.create_gesture("a").unwrap();
        let gb = gr.create_gesture("b").unwrap();
        for _ in 0..4 {
            record_stroke(&mut gr, Vec3::new(1.0, 0.0, 0.0), ga);
            record_stroke(&mut gr, Vec3::new(0.0, 1.0, 0.0), gb);
        }
        gr.set_max_training_time(10);
        gr.start_training(Arc::new(())).unwrap();

        if gr.is_training() {
            assert_eq!(
                gr.create_gesture("c").unwrap_err(),
                GestureError::CurrentlyTraining
            );
            assert_eq!(
                gr.delete_gesture(ga).unwrap_err(),
                GestureError::CurrentlyTraining
            );
            assert_eq!(
                gr.start_stroke(hmd(), Some(ga)).unwrap_err(),
                GestureError::CurrentlyTraining
            );
            // Identification is explicitly allowed during training.
            gr.start_stroke(hmd(), None).unwrap();
            gr.cancel_stroke().unwrap();
        }

        gr.stop_training();
        gr.wait_for_training();
    }

    #[test]
    fn test_training_requires_enough_data() {
        let mut gr = GestureRecognition::new();
        assert_eq!(
            gr.start_training(Arc::new(())).unwrap_err(),
            GestureError::NoGestures
        );
        let ga = gr.create_gesture("a").unwrap();
        record_stroke(&mut gr, Vec3::new(1.0, 0.0, 0.0), ga);
        assert_eq!(
            gr.start_training(Arc::new(())).unwrap_err(),
            GestureError::NoGestures
        );
    }

    #[test]
    fn test_disable_excludes_without_retraining() {
        let mut gr = GestureRecognition::new();
        let ga = gr.create_gesture("a").unwrap();
        let gb = gr.create_gesture("b").unwrap();
        for _ in 0..4 {
            record_stroke(&mut gr, Vec3::new(1.0, 0.0, 0.0), ga);
            record_stroke(&mut gr, Vec3::new(0.0, 1.0, 0.0), gb);
        }
        gr.set_max_training_time(10);
        gr.start_training(Arc::new(())).unwrap();
        gr.wait_for_training();

        let identify_x = |gr: &mut GestureRecognition| {
            gr.start_stroke(hmd(), None).unwrap();
            for i in 0..20 {
                gr.continue_stroke(Vec3::new(i as f64 / 19.0, 0.0, 0.0))
                    .unwrap();
            }
            gr.end_stroke()
        };

        let before = identify_x(&mut gr).unwrap();
        let StrokeOutcome::Identified { result, .. } = before else {
            panic!("expected identification");
        };
        assert_eq!(result.candidates.len(), 2);

        gr.set_gesture_enabled(ga, false).unwrap();
        match identify_x(&mut gr) {
            Ok(StrokeOutcome::Identified { result, .. }) => {
                assert_eq!(result.candidates.len(), 1, "live set shrank");
                assert_ne!(result.gesture_id, ga);
            }
            // An x-stroke may simply stop matching anything once "a" is out.
            Err(GestureError::NoMatch) => {}
            other => panic!("unexpected: {other:?}"),
        }

        // Re-enabling restores the previous behavior without retraining.
        gr.set_gesture_enabled(ga, true).unwrap();
        let after = identify_x(&mut gr).unwrap();
        let StrokeOutcome::Identified { result, .. } = after else {
            panic!("expected identification");
        };
        assert_eq!(result.gesture_id, ga);
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(gr.sample_count(ga).unwrap(), 4, "samples untouched");
    }
}
