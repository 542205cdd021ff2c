use std::fs;
use std::path::Path;

use gk_core::{export_json, import_json, merge_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Import a wire-format JSON export file into this store, replacing
    /// its contents.
    pub fn import_json_file(&self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json)
    }

    /// Import a wire-format JSON string into this store.
    pub fn import_json_str(&self, json: &str) -> Result<()> {
        let system = import_json(json).map_err(StoreError::Engine)?;
        self.save_system(&system)
    }

    /// Merge a wire-format JSON export file into this store by gesture name.
    pub fn merge_json_file(&self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut system = self.load_system()?;
        merge_json(&mut system, &json).map_err(StoreError::Engine)?;
        self.save_system(&system)
    }

    /// Export the store contents to a wire-format JSON file.
    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    /// Export the store contents as a wire-format JSON string.
    pub fn export_json_string(&self) -> Result<String> {
        let system = self.load_system()?;
        export_json(&system).map_err(StoreError::Engine)
    }
}
