//! The trained recognition model: per-gesture prototypes over normalized
//! stroke features, published to identifiers as immutable snapshots.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RESOLUTION;
use crate::error::Result;
use crate::gesture::StrokeFrame;
use crate::stroke::{self, StrokeSummary};
use crate::vec3::Vec3;

/// Mean feature vector of one gesture plus its intra-class spread.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prototype {
    pub gesture_id: u32,
    pub mean: Vec<f64>,
    pub sigma: f64,
}

/// An immutable classifier snapshot.
///
/// Derived from the enabled samples of enabled gestures. `stale` flags that
/// the store changed since the model was fitted; identification against a
/// stale model is permitted but not guaranteed accurate until retraining.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    pub resolution: usize,
    pub temperature: f64,
    pub prototypes: Vec<Prototype>,
    /// Held-out recognition score (0-1) measured when the model was fitted.
    pub score: f64,
    pub stale: bool,
}

impl Model {
    pub fn empty() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            temperature: 1.0,
            prototypes: Vec::new(),
            score: 0.0,
            stale: false,
        }
    }

    pub fn prototype(&self, gesture_id: u32) -> Option<&Prototype> {
        self.prototypes.iter().find(|p| p.gesture_id == gesture_id)
    }
}

/// Extract the model feature vector of a processed stroke: positions
/// centered at the centroid, scaled to unit extent, resampled to
/// `resolution` points and flattened.
pub fn features(frames: &[StrokeFrame], resolution: usize) -> Result<Vec<f64>> {
    let positions: Vec<Vec3> = frames.iter().map(|f| f.position).collect();
    let summary = StrokeSummary::from_positions(&positions)?;
    let inv_scale = 1.0 / summary.scale;

    let centered: Vec<Vec3> = positions
        .iter()
        .map(|p| (*p - summary.position) * inv_scale)
        .collect();
    let resampled = stroke::resample(&centered, resolution);

    let mut out = Vec::with_capacity(resolution * 3);
    for p in resampled {
        out.push(p.x);
        out.push(p.y);
        out.push(p.z);
    }
    Ok(out)
}

/// Mean per-coordinate distance between two feature vectors.
pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (sq / a.len().max(1) as f64).sqrt()
}

/// Fit prototypes from per-gesture feature sets. `sigma_scale` widens or
/// narrows every class spread; the trainer tunes it.
pub fn fit(
    training: &[(u32, Vec<Vec<f64>>)],
    resolution: usize,
    temperature: f64,
    sigma_scale: f64,
) -> Model {
    let mut prototypes = Vec::with_capacity(training.len());
    for (gesture_id, vectors) in training {
        if vectors.is_empty() {
            continue;
        }
        let dims = vectors[0].len();
        let mut mean = vec![0.0f64; dims];
        for v in vectors {
            for (m, x) in mean.iter_mut().zip(v) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= vectors.len() as f64;
        }

        let spread: f64 =
            vectors.iter().map(|v| distance(v, &mean)).sum::<f64>() / vectors.len() as f64;
        let sigma = (spread * sigma_scale).max(0.05);

        prototypes.push(Prototype {
            gesture_id: *gesture_id,
            mean,
            sigma,
        });
    }

    Model {
        resolution,
        temperature,
        prototypes,
        score: 0.0,
        stale: false,
    }
}

/// Shared slot holding the part's published model. Identification loads a
/// cheap `Arc` snapshot; the trainer swaps in whole replacement models, so
/// readers never observe a partially written model.
#[derive(Clone, Debug)]
pub struct ModelSlot {
    inner: Arc<RwLock<Arc<Model>>>,
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(Model::empty()))),
        }
    }

    pub fn load(&self) -> Arc<Model> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn store(&self, model: Model) {
        let mut slot = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Arc::new(model);
    }

    /// Flag the published model as out of sync with the store.
    pub fn mark_stale(&self) {
        let current = self.load();
        if current.stale {
            return;
        }
        let mut updated = (*current).clone();
        updated.stale = true;
        self.store(updated);
    }
}
