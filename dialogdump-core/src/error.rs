/// Structured error types for dialogdump-core.
///
/// Dumper hooks are plugin code and return `anyhow::Result`; the drivers wrap
/// those failures into [`DumpError::Dumper`] so callers can tell which hook
/// failed for which dialog.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dialogdump-core operations
#[derive(Error, Debug)]
pub enum DumpError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Configuration error (unknown dumper, unrecognized option, bad config file)
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// The provider failed to enumerate dialogs or stream messages
    #[error("Provider error: {reason}")]
    Provider { reason: String },

    /// A provider yielded messages out of newest-to-oldest order
    #[error("Message {id} in dialog '{dialog_id}' is not older than previous message {previous}")]
    Ordering {
        dialog_id: String,
        id: i64,
        previous: i64,
    },

    /// A dumper lifecycle hook failed
    #[error("Dumper hook '{hook}' failed for {}: {source:#}", dialog_label(.dialog_id))]
    Dumper {
        hook: &'static str,
        dialog_id: Option<String>,
        source: anyhow::Error,
    },

    /// Progress store failed to load or save a record
    #[error("Progress store error at {path:?}: {reason}")]
    Store { path: PathBuf, reason: String },
}

/// Result type alias for dialogdump-core operations
pub type Result<T> = std::result::Result<T, DumpError>;

fn dialog_label(dialog_id: &Option<String>) -> String {
    match dialog_id {
        Some(id) => format!("dialog '{id}'"),
        None => "session".to_string(),
    }
}

impl DumpError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a provider error
    pub fn provider(reason: impl Into<String>) -> Self {
        Self::Provider {
            reason: reason.into(),
        }
    }

    /// Wrap a failure raised by a session-level hook
    pub fn session_hook(hook: &'static str, source: anyhow::Error) -> Self {
        Self::Dumper {
            hook,
            dialog_id: None,
            source,
        }
    }

    /// Wrap a failure raised by a dialog-level hook
    pub fn dialog_hook(hook: &'static str, dialog_id: &str, source: anyhow::Error) -> Self {
        Self::Dumper {
            hook,
            dialog_id: Some(dialog_id.to_string()),
            source,
        }
    }

    /// Create a store error
    pub fn store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Store {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Configuration errors abort the session before any dialog is touched
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
