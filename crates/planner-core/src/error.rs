//! Unified error types for the production planner.
//!
//! This module provides a common error type [`PlannerError`] that can
//! represent errors from any stage of the pipeline. Component-specific
//! failures are converted to `PlannerError` for uniform handling at the
//! CLI boundary.
//!
//! # Example
//!
//! ```ignore
//! use planner_core::{PlannerError, PlannerResult};
//!
//! fn normalize(path: &str) -> PlannerResult<()> {
//!     let raw = load_config(path)?;
//!     validate(&raw)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all planner operations.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors (malformed input per §7: missing base date,
    /// unparseable dates, unknown product/dose)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Solver/algorithm errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A follow-up stage referenced a predecessor (Mab/SS/Hold/Harvest) that
    /// does not exist on the line. Per §7 this is fatal, not logged-and-skipped.
    #[error("Ambiguous follow-up reference on line {line}: {message}")]
    AmbiguousFollowUpReference { line: String, message: String },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using PlannerError.
pub type PlannerResult<T> = Result<T, PlannerError>;

impl From<anyhow::Error> for PlannerError {
    fn from(err: anyhow::Error) -> Self {
        PlannerError::Other(err.to_string())
    }
}

impl From<String> for PlannerError {
    fn from(s: String) -> Self {
        PlannerError::Other(s)
    }
}

impl From<&str> for PlannerError {
    fn from(s: &str) -> Self {
        PlannerError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlannerError::Solver("no incumbent before timeout".into());
        assert!(err.to_string().contains("Solver error"));
        assert!(err.to_string().contains("no incumbent"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let planner_err: PlannerError = io_err.into();
        assert!(matches!(planner_err, PlannerError::Io(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn example_fn() -> PlannerResult<i32> {
            Ok(42)
        }
        assert_eq!(example_fn().unwrap(), 42);
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> PlannerResult<()> {
            Err(PlannerError::Validation("test".into()))
        }

        fn outer() -> PlannerResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }

    #[test]
    fn test_ambiguous_follow_up_display() {
        let err = PlannerError::AmbiguousFollowUpReference {
            line: "L1".into(),
            message: "no Mab/SS/Hold/Harvest predecessor for Follow_Up_1500".into(),
        };
        assert!(err.to_string().contains("L1"));
    }
}
