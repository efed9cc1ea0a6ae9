//! # Error Handling
//!
//! Provides the unified `SyncError` enum used across the workspace.
//!
//! Fatal errors (`SpecParse`, `SpecSchema`) abort a run before any write.
//! Everything else is scoped to one artifact or one endpoint and is reported
//! next to its identity rather than aborting siblings.

use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum SyncError {
    /// The contract text is not valid JSON/YAML.
    #[from(ignore)]
    #[display("Spec parse error: {_0}")]
    SpecParse(String),

    /// The contract parsed but lacks the minimum OpenAPI shape.
    #[from(ignore)]
    #[display("Spec schema error: {_0}")]
    SpecSchema(String),

    /// Several managed files claim the same endpoint identity.
    #[from(ignore)]
    #[display("Duplicate artifacts for {endpoint}: {files}")]
    DuplicateArtifact {
        /// Endpoint identity (`METHOD /path`).
        endpoint: String,
        /// Comma separated file names, canonical file first.
        files: String,
    },

    /// A file or directory in the target could not be read during the scan.
    #[from(ignore)]
    #[display("Unreadable file {file}: {reason}")]
    UnreadableArtifact {
        /// File name relative to the target directory.
        file: String,
        /// Underlying failure.
        reason: String,
    },

    /// The marker region of an artifact scheduled for update is missing or damaged.
    #[from(ignore)]
    #[display("Manual override conflict for {endpoint} in {file}: generated markers not found")]
    ManualOverrideConflict {
        /// Endpoint identity (`METHOD /path`).
        endpoint: String,
        /// File name of the artifact.
        file: String,
    },

    /// A filesystem operation on a specific artifact failed (after retry).
    #[from(ignore)]
    #[display("Failed to write {file}: {source}")]
    FileWrite {
        /// File name of the artifact.
        file: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The run was cancelled before this endpoint was processed.
    #[from(ignore)]
    #[display("Cancelled before processing {endpoint}")]
    Cancelled {
        /// Endpoint identity (`METHOD /path`).
        endpoint: String,
    },

    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

impl SyncError {
    /// True for errors that abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::SpecParse(_) | SyncError::SpecSchema(_))
    }
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for SyncError {}

/// Helper type alias for Result using SyncError.
pub type AppResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: SyncError = io_err.into();
        assert!(matches!(app_err, SyncError::Io(_)));
        assert!(!app_err.is_fatal());
    }

    #[test]
    fn test_string_conversion() {
        let msg = String::from("something wrong");
        let app_err: SyncError = msg.into();
        match app_err {
            SyncError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to SyncError::General"),
        }
    }

    #[test]
    fn test_conflict_display_carries_identity() {
        let err = SyncError::ManualOverrideConflict {
            endpoint: "PUT /pet".into(),
            file: "test_update_pet.py".into(),
        };
        let text = err.to_string();
        assert!(text.contains("PUT /pet"));
        assert!(text.contains("test_update_pet.py"));
    }

    #[test]
    fn test_spec_errors_are_fatal() {
        assert!(SyncError::SpecParse("x".into()).is_fatal());
        assert!(SyncError::SpecSchema("x".into()).is_fatal());
    }
}
