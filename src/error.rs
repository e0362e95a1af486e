//! Error handling for Patchwire
//!
//! Structural edits never leave the live graph half-wired: anything that fails
//! before a destructive step surfaces here, while per-edge connection failures
//! are collected in operation reports instead.

use thiserror::Error;

use crate::patch::{Connection, LinkId, ModuleId};

/// Result type alias for Patchwire operations
pub type Result<T> = std::result::Result<T, PatchError>;

/// Main error type for Patchwire operations
#[derive(Error, Debug)]
pub enum PatchError {
    // Graph Errors
    #[error("Could not create module of type '{type_tag}'")]
    ModuleCreationFailed { type_tag: String },

    #[error("Module not found: {id}")]
    ModuleNotFound { id: ModuleId },

    #[error("Link not found: {link}")]
    LinkNotFound { link: LinkId },

    #[error("No cable carries {connection}")]
    ConnectionNotFound { connection: Connection },

    #[error("Pin direction mismatch: {reason}")]
    InvalidPinDirection { reason: String },

    #[error("Connection rejected by graph: {reason}")]
    ConnectionRejected { reason: String },

    #[error("Links cannot be spliced as a stereo pair: {reason}")]
    StereoLinkMismatch { reason: String },

    // Composite Errors
    #[error("Module {id} is not a composite module")]
    NotComposite { id: ModuleId },

    #[error("Selection is empty")]
    EmptySelection,

    #[error("Invalid state blob: {reason}")]
    InvalidBlob { reason: String },

    // History Errors
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PatchError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PatchError::ModuleCreationFailed { .. } => "MODULE_CREATION_FAILED",
            PatchError::ModuleNotFound { .. } => "MODULE_NOT_FOUND",
            PatchError::LinkNotFound { .. } | PatchError::ConnectionNotFound { .. } => {
                "LINK_NOT_FOUND"
            }
            PatchError::InvalidPinDirection { .. } => "INVALID_PIN_DIRECTION",
            PatchError::ConnectionRejected { .. } => "CONNECTION_REJECTED",
            PatchError::StereoLinkMismatch { .. } => "STEREO_LINK_MISMATCH",
            PatchError::NotComposite { .. } => "NOT_COMPOSITE",
            PatchError::EmptySelection => "EMPTY_SELECTION",
            PatchError::InvalidBlob { .. } => "INVALID_BLOB",
            PatchError::NothingToUndo => "NOTHING_TO_UNDO",
            PatchError::NothingToRedo => "NOTHING_TO_REDO",
            PatchError::Config { .. } => "CONFIG_ERROR",
            PatchError::Io(_) => "IO_ERROR",
            PatchError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error leaves the session usable as-is.
    ///
    /// Gesture-driven edits treat recoverable errors as "no effect".
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PatchError::Io(_) | PatchError::Config { .. })
    }

    /// Get a user-facing hint for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            PatchError::ModuleCreationFailed { .. } => {
                Some("Check that the module type is installed and spelled correctly.")
            }
            PatchError::LinkNotFound { .. } | PatchError::ConnectionNotFound { .. } => {
                Some("The cable changed since it was selected; select it again.")
            }
            PatchError::StereoLinkMismatch { .. } => Some(
                "Select two cables that share a source and a destination on adjacent channels.",
            ),
            PatchError::NothingToUndo => Some("There are no edits to undo."),
            PatchError::NothingToRedo => Some("There are no undone edits to redo."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PatchError::ModuleCreationFailed {
            type_tag: "nope".to_string(),
        };
        assert_eq!(err.error_code(), "MODULE_CREATION_FAILED");
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_recoverable() {
        assert!(PatchError::NothingToUndo.is_recoverable());
        let io = PatchError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(!io.is_recoverable());
    }

    #[test]
    fn test_display_includes_module() {
        let err = PatchError::ModuleNotFound { id: ModuleId(7) };
        assert_eq!(err.to_string(), "Module not found: 7");
    }

    #[test]
    fn test_missing_connection_reads_as_missing_link() {
        let err = PatchError::ConnectionNotFound {
            connection: Connection::new(ModuleId(5), 0, ModuleId::SINK, 1),
        };
        assert_eq!(err.error_code(), "LINK_NOT_FOUND");
        assert!(err.to_string().contains("5"));
        assert!(err.is_recoverable());
    }
}
