//! gesturekit 3D gesture recognition engine.
//!
//! Captures time-bounded motion strokes per part (hand/side), normalizes
//! them into a configurable head- or world-anchored frame of reference,
//! stores them as named gesture samples, trains a recognition model on a
//! background thread, and identifies single gestures and multi-part
//! combinations against immutable model snapshots.
//!
//! Zero file I/O — persistence lives in gk-store.

pub mod combination;
pub mod constants;
pub mod error;
pub mod euler;
pub mod frame;
pub mod gesture;
pub mod identify;
pub mod model;
pub mod part;
pub mod pose;
pub mod quaternion;
pub mod recognition;
pub mod stroke;
pub mod trainer;
pub mod vec3;
pub mod wire;

pub use combination::{Combination, CombinationResult, GestureCombinations};
pub use error::{GestureError, Result};
pub use euler::RotationOrder;
pub use frame::{FrameConfig, FrameOfReference, UpdateHeadPositionPolicy};
pub use gesture::{Gesture, MeanStroke, Sample, StrokeFrame};
pub use identify::{Candidate, Identification};
pub use model::{Model, ModelSlot, Prototype};
pub use part::{Part, StrokeOutcome};
pub use pose::Pose;
pub use quaternion::Quaternion;
pub use recognition::GestureRecognition;
pub use stroke::{StrokeMode, StrokeSummary};
pub use trainer::{Trainer, TrainingObserver, TrainingSet};
pub use vec3::Vec3;
pub use wire::{WireSystem, export_json, import_json, merge_json};

/// Human-readable engine version for compatibility diagnostics.
pub const VERSION: &str = concat!("gesturekit ", env!("CARGO_PKG_VERSION"));
