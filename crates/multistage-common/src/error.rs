//! Error types shared across the multi-stage crates
//!
//! Errors carry enough context (field path, resource kind) to point an
//! operator at the offending part of a test definition.

use thiserror::Error;

/// Main error type for fatal, non step-scoped failures
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// A test definition or step failed validation
    #[error("validation error: {}{message}", field_prefix(.field))]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "steps[2].timeout")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },
}

fn field_prefix(field: &Option<String>) -> String {
    field.as_deref().map(|f| format!("{}: ", f)).unwrap_or_default()
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error pointing at a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = Error::validation("step name must not be empty");
        assert_eq!(
            err.to_string(),
            "validation error: step name must not be empty"
        );
    }

    #[test]
    fn validation_error_names_field() {
        let err = Error::validation_for_field("test[0].as", "duplicate step name: e2e");
        assert_eq!(
            err.to_string(),
            "validation error: test[0].as: duplicate step name: e2e"
        );
        assert!(matches!(err, Error::Validation { field: Some(ref f), .. } if f == "test[0].as"));
    }

    #[test]
    fn json_errors_become_serialization_errors() {
        let json_err = serde_json::from_str::<u32>("not-a-number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization { kind: None, .. }));
    }
}
