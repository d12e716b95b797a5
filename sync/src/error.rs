//! Error types for the reconciliation engine

use std::path::PathBuf;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type shared by the engine and the resource adapters
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Missing or invalid configuration; aborts the whole invocation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Non-2xx response from the remote solution
    #[error("Remote error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// IO errors tied to a local path
    #[error("Local IO error at '{path}': {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema-invalid local resource or unparseable remote payload
    #[error("Format error at '{path}': {message}")]
    Format { path: PathBuf, message: String },

    /// File does not carry the marker an adapter needs
    #[error("Not a recognized file '{path}': {reason}")]
    NotARecognizedFile { path: PathBuf, reason: String },

    /// Item state that cannot be reconciled automatically
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Two syncable kinds claiming the same flag letter
    #[error("Flag '-{flag}' is already registered by '{existing}'")]
    DuplicateFlag { flag: char, existing: String },

    /// Filter pattern errors
    #[error("Filter pattern error: {0}")]
    FilterPattern(String),

    /// External diff command failures
    #[error("External diff error: {0}")]
    ExternalDiff(String),

    /// YAML serialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new remote error
    pub fn remote_error(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    /// Create a new local IO error
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Create a new format error
    pub fn format_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new unrecognized file error
    pub fn not_recognized(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::NotARecognizedFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the remote reported that the item changed underneath us
    pub fn is_remote_conflict(&self) -> bool {
        matches!(self, Self::Remote { status: 409 | 412, .. })
    }

    /// Errors that only affect one file during local collection
    pub fn is_skippable_file_error(&self) -> bool {
        matches!(self, Self::NotARecognizedFile { .. } | Self::LocalIo { .. } | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_conflict_detection() {
        assert!(SyncError::remote_error(409, "changed").is_remote_conflict());
        assert!(SyncError::remote_error(412, "precondition").is_remote_conflict());
        assert!(!SyncError::remote_error(500, "boom").is_remote_conflict());
        assert!(!SyncError::config_error("missing id").is_remote_conflict());
    }

    #[test]
    fn test_skippable_file_errors() {
        let not_recognized = SyncError::not_recognized("a.lua", "missing header");
        assert!(not_recognized.is_skippable_file_error());

        let io = SyncError::local_io("a.lua", std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(io.is_skippable_file_error());

        let format = SyncError::format_error("a.yaml", "bad schema");
        assert!(!format.is_skippable_file_error());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = SyncError::DuplicateFlag {
            flag: 'f',
            existing: "files".to_string(),
        };
        assert_eq!(err.to_string(), "Flag '-f' is already registered by 'files'");
    }
}
