//! JSON wire format for whole systems.
//!
//! The wire format uses camelCase field names, stores vectors as `[x, y, z]`
//! and quaternions as `[w, x, y, z]` arrays, and carries the trained model
//! alongside the gesture data. It doubles as the save/load-to-buffer surface:
//! importing replaces a system, merging folds another system's gestures in
//! by name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::combination::{Combination, GestureCombinations};
use crate::error::{GestureError, Result};
use crate::frame::FrameConfig;
use crate::gesture::{Gesture, Sample, StrokeFrame};
use crate::model::{Model, Prototype};
use crate::part::Part;
use crate::pose::Pose;
use crate::quaternion::Quaternion;
use crate::recognition::GestureRecognition;
use crate::vec3::Vec3;

pub const CURRENT_VERSION: &str = "1.0";

fn default_true() -> bool {
    true
}

// --- Wire format types ---

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireSystem {
    pub version: String,
    pub parts: Vec<WirePart>,
    #[serde(default)]
    pub combinations: Vec<WireCombination>,
    #[serde(default)]
    pub next_combination_id: u32,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub frame: FrameConfig,
    pub contd_period_ms: u32,
    pub contd_smoothing: usize,
    #[serde(default)]
    pub next_gesture_id: u32,
    pub gestures: Vec<WireGesture>,
    #[serde(default)]
    pub model: Option<WireModel>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireGesture {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub samples: Vec<WireSample>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireSample {
    pub hmd: WirePose,
    pub frames: Vec<WireFrame>,
    pub processed: Vec<WireFrame>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WirePose {
    pub p: [f64; 3],
    pub q: [f64; 4],
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireFrame {
    pub p: [f64; 3],
    pub q: [f64; 4],
    pub hmd_p: [f64; 3],
    pub hmd_q: [f64; 4],
    #[serde(default)]
    pub t: f64,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireModel {
    pub resolution: usize,
    pub temperature: f64,
    pub score: f64,
    #[serde(default)]
    pub stale: bool,
    pub prototypes: Vec<WirePrototype>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WirePrototype {
    pub gesture_id: u32,
    pub mean: Vec<f64>,
    pub sigma: f64,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireCombination {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub metadata: String,
    pub required: Vec<Option<u32>>,
}

// --- Conversion: domain -> wire ---

fn pose_to_wire(pose: &Pose) -> WirePose {
    WirePose {
        p: pose.position.to_array(),
        q: pose.rotation.to_array(),
    }
}

fn frame_to_wire(frame: &StrokeFrame) -> WireFrame {
    WireFrame {
        p: frame.position.to_array(),
        q: frame.rotation.to_array(),
        hmd_p: frame.hmd.position.to_array(),
        hmd_q: frame.hmd.rotation.to_array(),
        t: frame.t,
    }
}

fn sample_to_wire(sample: &Sample) -> WireSample {
    WireSample {
        hmd: pose_to_wire(&sample.hmd),
        frames: sample.frames.iter().map(frame_to_wire).collect(),
        processed: sample.processed.iter().map(frame_to_wire).collect(),
    }
}

fn gesture_to_wire(gesture: &Gesture) -> WireGesture {
    WireGesture {
        id: gesture.id,
        name: gesture.name.clone(),
        enabled: gesture.enabled,
        metadata: gesture.metadata.clone(),
        samples: gesture.samples.iter().map(sample_to_wire).collect(),
    }
}

fn model_to_wire(model: &Model) -> WireModel {
    WireModel {
        resolution: model.resolution,
        temperature: model.temperature,
        score: model.score,
        stale: model.stale,
        prototypes: model
            .prototypes
            .iter()
            .map(|p| WirePrototype {
                gesture_id: p.gesture_id,
                mean: p.mean.clone(),
                sigma: p.sigma,
            })
            .collect(),
    }
}

pub fn part_to_wire(part: &Part) -> WirePart {
    WirePart {
        enabled: part.is_enabled(),
        frame: part.frame,
        contd_period_ms: part.contd_identification_period(),
        contd_smoothing: part.contd_identification_smoothing(),
        next_gesture_id: part.next_gesture_id(),
        gestures: part.gestures().iter().map(gesture_to_wire).collect(),
        model: Some(model_to_wire(&part.model_slot().load())),
    }
}

impl WireSystem {
    pub fn from_system(system: &GestureCombinations) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            parts: system.parts().iter().map(part_to_wire).collect(),
            combinations: system
                .combinations()
                .iter()
                .map(|c| WireCombination {
                    id: c.id,
                    name: c.name.clone(),
                    metadata: c.metadata.clone(),
                    required: c.required.clone(),
                })
                .collect(),
            next_combination_id: system.next_combination_id(),
        }
    }

    pub fn into_system(self) -> Result<GestureCombinations> {
        let mut system = GestureCombinations::new(self.parts.len())?;
        for (idx, wire_part) in self.parts.into_iter().enumerate() {
            apply_part(system.part_mut(idx)?, wire_part)?;
        }
        let part_count = system.part_count();
        let combinations: Vec<Combination> = self
            .combinations
            .into_iter()
            .map(|c| {
                let mut required = c.required;
                required.resize(part_count, None);
                Combination {
                    id: c.id,
                    name: c.name,
                    metadata: c.metadata,
                    required,
                }
            })
            .collect();
        system.restore_combinations(combinations, self.next_combination_id);
        Ok(system)
    }
}

// --- Conversion: wire -> domain ---

fn pose_from_wire(pose: &WirePose) -> Pose {
    Pose::new(Vec3::from_array(pose.p), Quaternion::from_array(pose.q))
}

fn frame_from_wire(frame: &WireFrame) -> StrokeFrame {
    StrokeFrame {
        position: Vec3::from_array(frame.p),
        rotation: Quaternion::from_array(frame.q),
        hmd: Pose::new(
            Vec3::from_array(frame.hmd_p),
            Quaternion::from_array(frame.hmd_q),
        ),
        t: frame.t,
    }
}

fn sample_from_wire(sample: &WireSample) -> Sample {
    Sample {
        hmd: pose_from_wire(&sample.hmd),
        frames: sample.frames.iter().map(frame_from_wire).collect(),
        processed: sample.processed.iter().map(frame_from_wire).collect(),
    }
}

fn gesture_from_wire(wire: WireGesture) -> Gesture {
    let mut gesture = Gesture::new(wire.id, &wire.name);
    gesture.enabled = wire.enabled;
    gesture.metadata = wire.metadata;
    gesture.samples = wire.samples.iter().map(sample_from_wire).collect();
    gesture
}

pub fn apply_part(part: &mut Part, wire: WirePart) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    if !wire.gestures.iter().all(|g| seen.insert(g.id)) {
        return Err(GestureError::CorruptedState);
    }
    part.set_enabled(wire.enabled);
    part.frame = wire.frame;
    part.set_contd_identification_period(wire.contd_period_ms)
        .map_err(|_| GestureError::InvalidFile)?;
    part.set_contd_identification_smoothing(wire.contd_smoothing)
        .map_err(|_| GestureError::InvalidFile)?;

    let gestures = wire.gestures.into_iter().map(gesture_from_wire).collect();
    part.restore(gestures, wire.next_gesture_id);

    if let Some(wire_model) = wire.model {
        part.model_slot().store(Model {
            resolution: wire_model.resolution.max(2),
            temperature: wire_model.temperature,
            prototypes: wire_model
                .prototypes
                .into_iter()
                .map(|p| Prototype {
                    gesture_id: p.gesture_id,
                    mean: p.mean,
                    sigma: p.sigma,
                })
                .collect(),
            score: wire_model.score,
            stale: wire_model.stale,
        });
    }
    Ok(())
}

// --- Buffer import/export ---

pub fn export_json(system: &GestureCombinations) -> Result<String> {
    serde_json::to_string_pretty(&WireSystem::from_system(system))
        .map_err(|_| GestureError::InternallyCorrupted)
}

pub fn import_json(json: &str) -> Result<GestureCombinations> {
    let wire: WireSystem =
        serde_json::from_str(json).map_err(|_| GestureError::InvalidFile)?;
    wire.into_system()
}

/// Fold another system's gestures in by name: samples of same-name gestures
/// are appended, unknown names create gestures, and combinations unknown by
/// name are recreated with their required ids remapped.
pub fn merge_json(system: &mut GestureCombinations, json: &str) -> Result<()> {
    let wire: WireSystem =
        serde_json::from_str(json).map_err(|_| GestureError::InvalidFile)?;
    merge_wire(system, wire)
}

/// Merge an already-parsed wire system. See `merge_json`.
pub fn merge_wire(system: &mut GestureCombinations, wire: WireSystem) -> Result<()> {
    if system.is_training() {
        return Err(GestureError::CurrentlyTraining);
    }
    if wire.parts.len() > system.part_count() {
        return Err(GestureError::InvalidParameter);
    }

    let mut id_maps: Vec<HashMap<u32, u32>> = Vec::with_capacity(wire.parts.len());
    for (idx, wire_part) in wire.parts.into_iter().enumerate() {
        let mut map = HashMap::new();
        let part = system.part_mut(idx)?;
        for wire_gesture in wire_part.gestures {
            let existing = part
                .gestures()
                .iter()
                .find(|g| g.name == wire_gesture.name)
                .map(|g| g.id);
            let target_id = match existing {
                Some(id) => id,
                None => {
                    let id = part.create_gesture(&wire_gesture.name);
                    part.set_gesture_enabled(id, wire_gesture.enabled)?;
                    part.set_gesture_metadata(id, &wire_gesture.metadata)?;
                    id
                }
            };
            map.insert(wire_gesture.id, target_id);
            for wire_sample in &wire_gesture.samples {
                part.append_sample(target_id, sample_from_wire(wire_sample))?;
            }
        }
        id_maps.push(map);
    }

    for wire_combination in wire.combinations {
        let known = system
            .combinations()
            .iter()
            .any(|c| c.name == wire_combination.name);
        if known {
            continue;
        }
        let id = system.create_combination(&wire_combination.name);
        system.set_combination_metadata(id, &wire_combination.metadata)?;
        for (part_idx, required) in wire_combination
            .required
            .iter()
            .enumerate()
            .take(id_maps.len())
        {
            if let Some(old_id) = required
                && let Some(new_id) = id_maps[part_idx].get(old_id)
            {
                system.set_combination_part_gesture(id, part_idx, Some(*new_id))?;
            }
        }
    }
    Ok(())
}

/// Replace one part's state from a single-part wire payload (the per-part
/// save/load surface of combination systems).
pub fn import_part(system: &mut GestureCombinations, part: usize, wire: WirePart) -> Result<()> {
    if system.is_training() {
        return Err(GestureError::CurrentlyTraining);
    }
    apply_part(system.part_mut(part)?, wire)
}

/// Single-part systems share the wire format: one part, no combinations.
pub fn export_recognition_json(system: &GestureRecognition) -> Result<String> {
    let wire = WireSystem {
        version: CURRENT_VERSION.to_string(),
        parts: vec![part_to_wire(system.part())],
        combinations: Vec::new(),
        next_combination_id: 0,
    };
    serde_json::to_string_pretty(&wire).map_err(|_| GestureError::InternallyCorrupted)
}

pub fn import_recognition_json(json: &str) -> Result<GestureRecognition> {
    let wire: WireSystem =
        serde_json::from_str(json).map_err(|_| GestureError::InvalidFile)?;
    let [wire_part] = <[WirePart; 1]>::try_from(wire.parts)
        .map_err(|_| GestureError::InvalidParameter)?;
    let mut system = GestureRecognition::new();
    apply_part(system.part_mut(), wire_part)?;
    Ok(system)
}
