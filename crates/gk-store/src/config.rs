//! Engine configuration from a TOML file in the data directory.
//!
//! Every setting is optional; absent keys keep the engine defaults. The
//! file configures defaults applied to a freshly opened system - stored
//! samples keep the frame-of-reference they were recorded under.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gk_core::{
    FrameOfReference, GestureCombinations, RotationOrder, UpdateHeadPositionPolicy,
};

use crate::error::{Result, StoreError};

pub const CONFIG_FILE: &str = "config.toml";

/// Default base directory for all gesturekit storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".gesturekit")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve the data directory: `GK_DATA_DIR` overrides the home default.
pub fn data_dir() -> PathBuf {
    env::var("GK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_base_dir())
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub frame_of_reference: FrameTable,
    pub contd: ContdTable,
    pub training: TrainingTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameTable {
    pub yaw: FrameOfReference,
    pub pitch: FrameOfReference,
    pub roll: FrameOfReference,
    pub rotation_order: RotationOrder,
    pub head_position_policy: UpdateHeadPositionPolicy,
}

impl Default for FrameTable {
    fn default() -> Self {
        let config = gk_core::FrameConfig::default();
        Self {
            yaw: config.yaw,
            pitch: config.pitch,
            roll: config.roll,
            rotation_order: config.rotation_order,
            head_position_policy: config.head_position_policy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContdTable {
    pub period_ms: u32,
    pub smoothing: usize,
}

impl Default for ContdTable {
    fn default() -> Self {
        Self {
            period_ms: gk_core::constants::DEFAULT_CONTD_PERIOD_MS,
            smoothing: gk_core::constants::DEFAULT_CONTD_SMOOTHING,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingTable {
    pub max_seconds: u64,
    /// Zero or negative: engine-chosen (one worker per core).
    pub max_threads: i32,
}

impl Default for TrainingTable {
    fn default() -> Self {
        Self {
            max_seconds: gk_core::constants::DEFAULT_MAX_TRAINING_SECS,
            max_threads: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| StoreError::InvalidData(format!("config parse error: {e}")))
    }

    /// Load the config file from a directory; a missing file yields the
    /// defaults, a malformed one is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), "engine config loaded");
                Self::from_toml_str(&content)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Apply these settings to every part of a system, plus the trainer
    /// bounds.
    pub fn apply(&self, system: &mut GestureCombinations) -> Result<()> {
        let frame = gk_core::FrameConfig {
            yaw: self.frame_of_reference.yaw,
            pitch: self.frame_of_reference.pitch,
            roll: self.frame_of_reference.roll,
            rotation_order: self.frame_of_reference.rotation_order,
            head_position_policy: self.frame_of_reference.head_position_policy,
        };
        for part in 0..system.part_count() {
            system.set_frame_config(part, frame)?;
            system
                .set_contd_identification_period(part, self.contd.period_ms)
                .map_err(StoreError::Engine)?;
            system
                .set_contd_identification_smoothing(part, self.contd.smoothing)
                .map_err(StoreError::Engine)?;
        }
        system.set_max_training_time(self.training.max_seconds);
        system.set_max_training_threads(self.training.max_threads);
        Ok(())
    }
}
