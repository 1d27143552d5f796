//! Error types for the generation layer.

use commsdsl_parse::ParseError;
use thiserror::Error;

/// Failure to compute the wire order of frame layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerOrderError {
    /// A checksum layer names a layer the frame does not have.
    #[error("checksum layer '{layer}' references unknown layer '{target}'")]
    MissingLayer {
        /// Checksum layer name.
        layer: String,
        /// Referenced layer name.
        target: String,
    },

    /// `until` of a checksum layer must name the payload layer.
    #[error("checksum layer '{layer}' must reach until the payload layer, not '{target}'")]
    UntilNotPayload {
        /// Checksum layer name.
        layer: String,
        /// Referenced layer name.
        target: String,
    },

    /// A checksum layer has neither `from` nor `until`.
    #[error("checksum layer '{layer}' does not specify its coverage")]
    MissingCoverage {
        /// Checksum layer name.
        layer: String,
    },

    /// Placement rules of several checksum layers contradict each other.
    #[error("checksum layer '{layer}' cannot be placed, placement rules form a cycle")]
    Cycle {
        /// Layer whose move repeated an earlier order.
        layer: String,
    },
}

/// Error type for generation operations.
#[derive(Debug, Error)]
pub enum GenError {
    /// Schema parsing or validation error.
    #[error("schema error: {0}")]
    Parse(#[from] ParseError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation called in the wrong phase.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Error message.
        message: String,
    },

    /// Warnings were reported while warnings are treated as errors.
    #[error("{count} warning(s) treated as errors")]
    WarningAsError {
        /// Number of reported warnings.
        count: usize,
    },

    /// Field properties not supported by generation.
    #[error("field '{field}': {message}")]
    Field {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },

    /// Layer order of a frame could not be computed.
    #[error("frame '{frame}': {source}")]
    Frame {
        /// Frame name.
        frame: String,
        /// Ordering failure.
        #[source]
        source: LayerOrderError,
    },

    /// Error raised by a backend hook.
    #[error("backend error: {message}")]
    Backend {
        /// Error message.
        message: String,
    },

    /// Graph invariant violation.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl GenError {
    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a field error.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a backend error with the given message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates an internal error, asserting in debug builds.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(false, "internal error: {message}");
        Self::Internal { message }
    }
}
