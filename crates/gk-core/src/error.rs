//! The engine error taxonomy.
//!
//! Every fallible operation in this crate maps its failure onto exactly one
//! of these kinds. Each kind carries a stable signed integer code (0 is
//! reserved for success and is never an error); external callers select
//! behavior by code, so the numbering must never change.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GestureError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GestureError {
    /// No gesture (or combination) matches.
    #[error("no gesture (or combination) matches")]
    NoMatch,
    /// Invalid index or id provided to a function.
    #[error("invalid index provided to function")]
    InvalidIndex,
    /// Invalid file path provided to a function.
    #[error("invalid file path provided to function")]
    InvalidPath,
    /// Path to an invalid or unreadable file.
    #[error("path to an invalid file provided to function")]
    InvalidFile,
    /// Calculations failed due to numeric instability.
    #[error("calculations failed due to numeric instability")]
    NumericInstability,
    /// The internal state of the recognition engine was corrupted.
    #[error("the internal state of the engine was corrupted")]
    CorruptedState,
    /// Available data (number of samples etc.) is insufficient.
    #[error("available data is insufficient for this operation")]
    InsufficientData,
    /// The operation cannot run while the engine is training.
    #[error("the engine is currently training")]
    CurrentlyTraining,
    /// No gestures registered.
    #[error("no gestures registered")]
    NoGestures,
    /// The model is inconsistent - retraining might solve the issue.
    #[error("the model is inconsistent - re-training might solve the issue")]
    InconsistentModel,
    /// File or object exists and can't be overwritten.
    #[error("file or object exists and can't be overwritten")]
    CannotOverwrite,
    /// The stroke was not started yet (missing start_stroke).
    #[error("stroke was not started yet (missing start_stroke)")]
    StrokeNotStarted,
    /// The stroke was not finished yet (missing end_stroke).
    #[error("stroke was not finished yet (missing end_stroke)")]
    StrokeNotEnded,
    /// The recognition object is internally corrupted or inconsistent.
    #[error("the recognition object is internally corrupted")]
    InternallyCorrupted,
    /// The operation cannot run while a gesture database is loading.
    #[error("the engine is currently loading a gesture database")]
    CurrentlyLoading,
    /// The license is not valid or does not permit the operation.
    #[error("the provided license is not valid for this operation")]
    InvalidLicense,
    /// The operation cannot run while a gesture database is being saved.
    #[error("the engine is currently saving a gesture database")]
    CurrentlySaving,
    /// Invalid parameter(s) provided to a function.
    #[error("invalid parameter(s) provided to function")]
    InvalidParameter,
}

impl GestureError {
    /// The stable wire code of this error kind. Always negative.
    pub fn code(&self) -> i32 {
        match self {
            Self::NoMatch => -1,
            Self::InvalidIndex => -2,
            Self::InvalidPath => -3,
            Self::InvalidFile => -4,
            Self::NumericInstability => -5,
            Self::CorruptedState => -6,
            Self::InsufficientData => -7,
            Self::CurrentlyTraining => -8,
            Self::NoGestures => -9,
            Self::InconsistentModel => -10,
            Self::CannotOverwrite => -11,
            Self::StrokeNotStarted => -12,
            Self::StrokeNotEnded => -13,
            Self::InternallyCorrupted => -14,
            Self::CurrentlyLoading => -15,
            Self::InvalidLicense => -16,
            Self::CurrentlySaving => -17,
            Self::InvalidParameter => -18,
        }
    }

    /// Recover an error kind from its wire code.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::NoMatch,
            -2 => Self::InvalidIndex,
            -3 => Self::InvalidPath,
            -4 => Self::InvalidFile,
            -5 => Self::NumericInstability,
            -6 => Self::CorruptedState,
            -7 => Self::InsufficientData,
            -8 => Self::CurrentlyTraining,
            -9 => Self::NoGestures,
            -10 => Self::InconsistentModel,
            -11 => Self::CannotOverwrite,
            -12 => Self::StrokeNotStarted,
            -13 => Self::StrokeNotEnded,
            -14 => Self::InternallyCorrupted,
            -15 => Self::CurrentlyLoading,
            -16 => Self::InvalidLicense,
            -17 => Self::CurrentlySaving,
            -18 => Self::InvalidParameter,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in -18..=-1 {
            let err = GestureError::from_code(code).expect("every code in -18..=-1 is assigned");
            assert_eq!(err.code(), code);
            assert!(seen.insert(err.code()));
        }
    }

    #[test]
    fn test_unknown_codes_rejected() {
        assert_eq!(GestureError::from_code(0), None);
        assert_eq!(GestureError::from_code(1), None);
        assert_eq!(GestureError::from_code(-19), None);
    }

    #[test]
    fn test_display_is_descriptive() {
        let msg = GestureError::StrokeNotStarted.to_string();
        assert!(msg.contains("start_stroke"), "got: {msg}");
    }
}
