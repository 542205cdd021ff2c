use std::fmt;

use gk_core::GestureError;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Engine(GestureError),
    InvalidData(String),
}

impl StoreError {
    /// Map onto the engine's stable signed error codes. Storage-level
    /// failures surface as "invalid file".
    pub fn code(&self) -> i32 {
        match self {
            StoreError::Engine(e) => e.code(),
            StoreError::Sqlite(_) | StoreError::InvalidData(_) => {
                GestureError::InvalidFile.code()
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            StoreError::Engine(e) => write!(f, "engine error: {e}"),
            StoreError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<GestureError> for StoreError {
    fn from(e: GestureError) -> Self {
        StoreError::Engine(e)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_codes_pass_through() {
        let err = StoreError::Engine(GestureError::CurrentlySaving);
        assert_eq!(err.code(), -17);
    }

    #[test]
    fn test_storage_failures_map_to_invalid_file() {
        let err = StoreError::InvalidData("bad".into());
        assert_eq!(err.code(), -4);
    }
}
