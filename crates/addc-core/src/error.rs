//! Error types for addc-core.
//!
//! Errors fall into three families:
//! - configuration errors (bad `kmax`, a misbehaving distance function,
//!   unreadable config files, out-of-range parameters)
//! - invariant violations inside the closest-pair index (these indicate a
//!   bug in the caller of the index, never a runtime condition)
//! - input validation (dimension mismatch, non-finite coordinates)

use thiserror::Error;

use crate::closest_pair::SlotId;

/// Top-level error type for addc-core.
#[derive(Debug, Error)]
pub enum AddcError {
    /// Construction-time configuration is invalid.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong
        message: String,
    },

    /// The distance function returned a negative, non-finite or asymmetric value.
    #[error("Invalid distance from '{metric}': {message}")]
    InvalidDistance {
        /// Name of the offending distance function
        metric: String,
        /// What was detected
        message: String,
    },

    /// Loading configuration from file or environment failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid parameter provided to a query (e.g. trim threshold).
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of what's wrong with the parameter
        message: String,
    },

    /// Attempted to insert a slot that is already live.
    #[error("Invariant violation: slot {slot} is already live")]
    SlotAlreadyLive {
        /// The offending slot
        slot: SlotId,
    },

    /// Attempted to move or remove a slot that is not live.
    #[error("Invariant violation: slot {slot} is not live")]
    SlotNotLive {
        /// The offending slot
        slot: SlotId,
    },

    /// Closest pair requested with fewer than two live slots.
    #[error("Invariant violation: closest pair needs at least 2 live slots, have {live}")]
    TooFewSlots {
        /// Number of live slots at the time of the query
        live: usize,
    },

    /// Point dimension differs from the dimension fixed by the first point.
    #[error("Dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the first ingested point
        expected: usize,
        /// Dimension of the rejected point
        actual: usize,
    },

    /// Point is empty or contains NaN/Infinity.
    #[error("Invalid point: {message}")]
    InvalidPoint {
        /// Description of the problem
        message: String,
    },
}

impl AddcError {
    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an InvalidDistance error.
    pub fn invalid_distance(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDistance {
            metric: metric.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create an InvalidPoint error.
    pub fn invalid_point(message: impl Into<String>) -> Self {
        Self::InvalidPoint {
            message: message.into(),
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// True for errors caused by configuration (including a bad distance function).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::InvalidDistance { .. } | Self::Config(_)
        )
    }

    /// True for internal-state errors that indicate a bug in the index caller.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::SlotAlreadyLive { .. } | Self::SlotNotLive { .. } | Self::TooFewSlots { .. }
        )
    }
}

impl From<config::ConfigError> for AddcError {
    fn from(err: config::ConfigError) -> Self {
        AddcError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for AddcError {
    fn from(err: toml::de::Error) -> Self {
        AddcError::Config(err.to_string())
    }
}

/// Result type alias for addc operations.
pub type AddcResult<T> = Result<T, AddcError>;
