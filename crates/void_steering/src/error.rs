//! Error types for the steering system
//!
//! Per-tick steering never fails; errors only surface when a pathfinder is
//! constructed from a configuration that cannot produce sensible output.

use thiserror::Error;

/// Steering system errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SteeringError {
    /// A configuration field is out of range
    #[error("Invalid steering configuration: {field} {reason}")]
    InvalidConfig {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl SteeringError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SteeringError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for steering operations
pub type Result<T> = std::result::Result<T, SteeringError>;
