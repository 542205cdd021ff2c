//! The single-gesture identifier: a pure function of (normalized stroke,
//! published model) producing a ranked candidate list, plus the smoothing
//! state used by continuous identification.

use std::collections::VecDeque;

use crate::constants::{CONFIDENCE_FLOOR, RESERVE_MASS};
use crate::error::{GestureError, Result};
use crate::model::{self, Model};

/// Per-gesture identification scores.
///
/// `probability` entries are non-negative and sum to at most 1 across a
/// result (the remainder is reserve mass for "matches nothing well").
/// `similarity` is an independent closeness score in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub gesture_id: u32,
    pub probability: f64,
    pub similarity: f64,
}

/// Result of identifying one stroke.
#[derive(Clone, Debug)]
pub struct Identification {
    pub gesture_id: u32,
    pub probability: f64,
    pub similarity: f64,
    /// One entry per enabled gesture, in registration order.
    pub candidates: Vec<Candidate>,
}

/// Match stroke features against the model, restricted to `enabled` gesture
/// ids (registration order). Ties break deterministically toward the lower
/// gesture id. Reports no match when no enabled gesture has a prototype or
/// the best similarity falls below the confidence floor.
pub fn identify(model: &Model, enabled: &[u32], features: &[f64]) -> Result<Identification> {
    if enabled.is_empty() {
        return Err(GestureError::NoMatch);
    }

    let mut weights = Vec::with_capacity(enabled.len());
    let mut similarities = Vec::with_capacity(enabled.len());
    let mut any_prototype = false;

    for &id in enabled {
        match model.prototype(id) {
            Some(proto) if proto.mean.len() == features.len() => {
                any_prototype = true;
                let d = model::distance(features, &proto.mean);
                let scaled = d / (proto.sigma * model.temperature);
                weights.push((-0.5 * scaled * scaled).exp());
                similarities.push(1.0 / (1.0 + d / proto.sigma));
            }
            // A fitted prototype whose dimensions disagree with the model
            // resolution can only come from a damaged database.
            Some(_) => return Err(GestureError::InconsistentModel),
            // Gesture added or re-enabled after the model was fitted: it
            // cannot win but stays in the vector.
            None => {
                weights.push(0.0);
                similarities.push(0.0);
            }
        }
    }
    if !any_prototype {
        return Err(GestureError::NoMatch);
    }

    let total: f64 = weights.iter().sum::<f64>() + RESERVE_MASS;
    let candidates: Vec<Candidate> = enabled
        .iter()
        .zip(weights.iter().zip(&similarities))
        .map(|(&gesture_id, (&w, &similarity))| Candidate {
            gesture_id,
            probability: w / total,
            similarity,
        })
        .collect();

    let best = candidates
        .iter()
        .max_by(|a, b| {
            a.probability
                .total_cmp(&b.probability)
                .then(b.gesture_id.cmp(&a.gesture_id))
        })
        .copied()
        .expect("candidates nonempty");

    if best.similarity < CONFIDENCE_FLOOR {
        return Err(GestureError::NoMatch);
    }

    Ok(Identification {
        gesture_id: best.gesture_id,
        probability: best.probability,
        similarity: best.similarity,
        candidates,
    })
}

/// Sliding vote over the most recent continuous-identification results.
/// Trades reaction latency for a stable gesture-id stream.
#[derive(Clone, Debug, Default)]
pub struct ContdState {
    history: VecDeque<Candidate>,
}

impl ContdState {
    /// Record one raw result, keeping at most `smoothing` entries.
    pub fn push(&mut self, result: Candidate, smoothing: usize) {
        self.history.push_back(result);
        while self.history.len() > smoothing.max(1) {
            self.history.pop_front();
        }
    }

    /// Recency-weighted vote over the retained results: each entry counts
    /// its probability times its age rank. Scores of the winning id are
    /// averaged for the reported probability/similarity.
    pub fn smoothed(&self) -> Option<Candidate> {
        let mut votes: Vec<(u32, f64)> = Vec::new();
        for (age, entry) in self.history.iter().enumerate() {
            let weight = (age + 1) as f64 * entry.probability;
            match votes.iter_mut().find(|(id, _)| *id == entry.gesture_id) {
                Some((_, v)) => *v += weight,
                None => votes.push((entry.gesture_id, weight)),
            }
        }
        let (winner, _) = votes
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))?;

        let matching: Vec<&Candidate> = self
            .history
            .iter()
            .filter(|e| e.gesture_id == winner)
            .collect();
        let n = matching.len() as f64;
        Some(Candidate {
            gesture_id: winner,
            probability: matching.iter().map(|e| e.probability).sum::<f64>() / n,
            similarity: matching.iter().map(|e| e.similarity).sum::<f64>() / n,
        })
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
