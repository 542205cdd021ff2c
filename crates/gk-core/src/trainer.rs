//! Background training.
//!
//! The trainer clones the enabled training data, hill-climbs the model
//! hyperparameters against a leave-one-out recognition score on worker
//! threads, and publishes every improvement into the parts' model slots.
//! The caller's real-time thread keeps identifying against the last
//! published snapshot throughout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::constants::{
    CONVERGENCE_ROUNDS, DEFAULT_MAX_TRAINING_SECS, DEFAULT_RESOLUTION, MIN_SAMPLES_PER_GESTURE,
    MIN_TRAINING_GESTURES,
};
use crate::error::{GestureError, Result};
use crate::gesture::StrokeFrame;
use crate::identify;
use crate::model::{self, Model, ModelSlot};

/// Progress listener for a training run. Fired from the worker threads, so
/// implementations must be reentrant-safe and non-blocking.
pub trait TrainingObserver: Send + Sync {
    /// A candidate improved the held-out recognition score (0-1).
    fn on_update(&self, _score: f64) {}
    /// The run ended - naturally, by wall-clock bound, or by cancellation.
    /// Fired exactly once per run with the final best score.
    fn on_finish(&self, _score: f64) {}
}

/// No-op observer for callers that only poll.
impl TrainingObserver for () {}

/// One part's contribution to a training run: its model slot to publish
/// into, and its enabled processed strokes, cloned at start.
pub struct TrainingSet {
    pub slot: ModelSlot,
    pub strokes: Vec<(u32, Vec<Vec<StrokeFrame>>)>,
}

#[derive(Clone, Copy, Debug)]
struct Params {
    resolution: usize,
    temperature: f64,
    sigma_scale: f64,
}

impl Params {
    fn base() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            temperature: 1.0,
            sigma_scale: 1.0,
        }
    }
}

struct Best {
    score: f64,
    params: Params,
    since_improve: u32,
}

#[derive(Debug)]
struct Shared {
    cancel: AtomicBool,
    active: AtomicBool,
}

/// The asynchronous, cancellable background optimizer.
#[derive(Debug)]
pub struct Trainer {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    max_time: Duration,
    max_threads: i32,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Trainer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cancel: AtomicBool::new(false),
                active: AtomicBool::new(false),
            }),
            handle: None,
            max_time: Duration::from_secs(DEFAULT_MAX_TRAINING_SECS),
            max_threads: 0,
        }
    }

    pub fn is_training(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Wall-clock bound for one training run, in seconds.
    pub fn max_training_time(&self) -> u64 {
        self.max_time.as_secs()
    }

    pub fn set_max_training_time(&mut self, seconds: u64) {
        self.max_time = Duration::from_secs(seconds.max(1));
    }

    /// Worker-thread bound. Zero or negative means engine-chosen
    /// (one worker per available core).
    pub fn max_training_threads(&self) -> i32 {
        self.max_threads
    }

    pub fn set_max_training_threads(&mut self, threads: i32) {
        self.max_threads = threads;
    }

    /// Start a run over the given training sets. Fails with
    /// `CurrentlyTraining` if a run is active, or `NoGestures` if no set
    /// qualifies (at least two enabled gestures with enough samples each).
    pub fn start(
        &mut self,
        sets: Vec<TrainingSet>,
        observer: Arc<dyn TrainingObserver>,
    ) -> Result<()> {
        if self.is_training() {
            return Err(GestureError::CurrentlyTraining);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let sets: Vec<TrainingSet> = sets
            .into_iter()
            .map(|mut set| {
                set.strokes
                    .retain(|(_, samples)| samples.len() >= MIN_SAMPLES_PER_GESTURE);
                set
            })
            .filter(|set| set.strokes.len() >= MIN_TRAINING_GESTURES)
            .collect();
        if sets.is_empty() {
            return Err(GestureError::NoGestures);
        }

        self.shared.cancel.store(false, Ordering::Release);
        self.shared.active.store(true, Ordering::Release);

        let shared = self.shared.clone();
        let max_time = self.max_time;
        let threads = effective_threads(self.max_threads);

        self.handle = Some(thread::spawn(move || {
            run_training(shared, sets, observer, max_time, threads);
        }));
        Ok(())
    }

    /// Request cooperative cancellation. The best model found so far stays
    /// published. Returns whether a run was active.
    pub fn stop(&self) -> bool {
        if !self.is_training() {
            return false;
        }
        self.shared.cancel.store(true, Ordering::Release);
        true
    }

    /// Block until the current run (if any) has finished. Test and CLI
    /// convenience; the engine API itself never blocks.
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Trainer {
    fn drop(&mut self) {
        self.shared.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn effective_threads(max_threads: i32) -> usize {
    if max_threads > 0 {
        max_threads as usize
    } else {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

fn run_training(
    shared: Arc<Shared>,
    sets: Vec<TrainingSet>,
    observer: Arc<dyn TrainingObserver>,
    max_time: Duration,
    threads: usize,
) {
    let sets = Arc::new(sets);
    let best = Arc::new(Mutex::new(Best {
        score: -1.0,
        params: Params::base(),
        since_improve: 0,
    }));
    let deadline = Instant::now() + max_time;

    let workers: Vec<JoinHandle<()>> = (0..threads)
        .map(|worker| {
            let shared = shared.clone();
            let sets = sets.clone();
            let best = best.clone();
            let observer = observer.clone();
            thread::spawn(move || {
                worker_loop(&shared, &sets, &best, observer.as_ref(), deadline, worker)
            })
        })
        .collect();
    for worker in workers {
        let _ = worker.join();
    }

    let final_score = best
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .score
        .max(0.0);
    shared.active.store(false, Ordering::Release);
    observer.on_finish(final_score);
}

fn worker_loop(
    shared: &Shared,
    sets: &[TrainingSet],
    best: &Mutex<Best>,
    observer: &dyn TrainingObserver,
    deadline: Instant,
    worker: usize,
) {
    let mut rng = SmallRng::seed_from_u64(0x6b67 + worker as u64);
    let mut first = worker == 0;

    loop {
        if shared.cancel.load(Ordering::Acquire) || Instant::now() > deadline {
            return;
        }
        let base = {
            let guard = best.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if guard.since_improve >= CONVERGENCE_ROUNDS {
                return;
            }
            guard.params
        };

        // Worker 0 scores the untouched defaults first so a model is
        // published even when no perturbation ever improves on them.
        let params = if first {
            first = false;
            base
        } else {
            perturb(base, &mut rng)
        };

        let Some((score, models)) = evaluate(sets, params) else {
            let mut guard = best.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.since_improve += 1;
            continue;
        };

        let mut guard = best.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if score > guard.score + 1e-9 {
            guard.score = score;
            guard.params = params;
            guard.since_improve = 0;
            for (set, model) in sets.iter().zip(models) {
                set.slot.store(model);
            }
            observer.on_update(score);
        } else {
            guard.since_improve += 1;
        }
    }
}

fn perturb(base: Params, rng: &mut SmallRng) -> Params {
    const RESOLUTIONS: [usize; 4] = [16, 24, 32, 48];
    let resolution = if rng.random::<f64>() < 0.3 {
        RESOLUTIONS[rng.random_range(0..RESOLUTIONS.len())]
    } else {
        base.resolution
    };
    Params {
        resolution,
        temperature: (base.temperature * (rng.random_range(-0.25..0.25f64)).exp())
            .clamp(0.25, 4.0),
        sigma_scale: (base.sigma_scale * (rng.random_range(-0.25..0.25f64)).exp())
            .clamp(0.25, 4.0),
    }
}

/// Score one candidate by leave-one-out cross-validation over every set,
/// and fit the full models that the candidate would publish. Returns `None`
/// when feature extraction fails across the board.
fn evaluate(sets: &[TrainingSet], params: Params) -> Option<(f64, Vec<Model>)> {
    let mut models = Vec::with_capacity(sets.len());
    let mut total_score = 0.0;
    let mut scored_sets = 0usize;

    for set in sets {
        let featured: Vec<(u32, Vec<Vec<f64>>)> = set
            .strokes
            .iter()
            .map(|(id, strokes)| {
                let vectors = strokes
                    .iter()
                    .filter_map(|s| model::features(s, params.resolution).ok())
                    .collect();
                (*id, vectors)
            })
            .collect();
        let enabled: Vec<u32> = featured.iter().map(|(id, _)| *id).collect();

        let mut correct = 0usize;
        let mut total = 0usize;
        for (hold_idx, (gesture_id, vectors)) in featured.iter().enumerate() {
            for (sample_idx, held_out) in vectors.iter().enumerate() {
                let training: Vec<(u32, Vec<Vec<f64>>)> = featured
                    .iter()
                    .enumerate()
                    .map(|(i, (id, vs))| {
                        let vs = if i == hold_idx {
                            vs.iter()
                                .enumerate()
                                .filter(|(j, _)| *j != sample_idx)
                                .map(|(_, v)| v.clone())
                                .collect()
                        } else {
                            vs.clone()
                        };
                        (*id, vs)
                    })
                    .collect();
                let fold = model::fit(
                    &training,
                    params.resolution,
                    params.temperature,
                    params.sigma_scale,
                );
                total += 1;
                if let Ok(result) = identify::identify(&fold, &enabled, held_out)
                    && result.gesture_id == *gesture_id
                {
                    correct += 1;
                }
            }
        }
        if total == 0 {
            continue;
        }

        let part_score = correct as f64 / total as f64;
        let mut full = model::fit(
            &featured,
            params.resolution,
            params.temperature,
            params.sigma_scale,
        );
        full.score = part_score;
        models.push(full);
        total_score += part_score;
        scored_sets += 1;
    }

    if scored_sets == 0 {
        return None;
    }
    Some((total_score / scored_sets as f64, models))
}
