//! Error kinds and the success/message result returned at the public boundary
//!
//! Recoverable errors carry a message that can be shown to the user as-is.
//! Unexpected errors (I/O, JSON, archives) are logged in full and replaced by a
//! generic message before they leave the registry.

use thiserror::Error;

/// Errors raised by mod registration, reconciliation and document parsing
#[derive(Debug, Error)]
pub enum ModError {
    /// Registration was rejected (duplicate identity, missing id, folder clash)
    #[error("{0}")]
    Registration(String),

    /// A mod's storage folder does not exist
    #[error("{0}")]
    MissingStorage(String),

    /// A mod.json file is missing or unreadable
    #[error("{0}")]
    Metadata(String),

    /// Text did not match an expected format (campaign tuples)
    #[error("{0}")]
    Format(String),

    /// Operation is not valid for the current state
    #[error("{0}")]
    InvalidState(String),

    /// The game folder is unset, invalid, or could not be located
    #[error("{0}")]
    GameFolder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive error: {0}")]
    Archive(String),
}

impl ModError {
    /// True when the message is safe to present to an end user
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ModError::Registration(_)
                | ModError::MissingStorage(_)
                | ModError::Metadata(_)
                | ModError::Format(_)
                | ModError::InvalidState(_)
                | ModError::GameFolder(_)
        )
    }
}

impl From<walkdir::Error> for ModError {
    fn from(e: walkdir::Error) -> Self {
        ModError::Io(e.into())
    }
}

pub type ModResult<T> = std::result::Result<T, ModError>;

/// Success flag plus an optional message, returned by public registry operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: Option<String>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Convert an error into an outcome, logging the full detail.
    ///
    /// Recoverable errors keep their own message; anything else is reported
    /// with `generic` so raw I/O errors never reach the user.
    pub fn from_error(err: &ModError, generic: impl Into<String>) -> Self {
        if err.is_recoverable() {
            tracing::warn!("{}", err);
            Self::failed(err.to_string())
        } else {
            tracing::error!("{:?}", err);
            Self::failed(generic)
        }
    }

    /// Mark as failed and append a message, space-separated from earlier ones
    pub fn push_failure(&mut self, message: impl AsRef<str>) {
        self.success = false;
        let message = message.as_ref().trim();
        if message.is_empty() {
            return;
        }
        match &mut self.message {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(message);
            }
            None => self.message = Some(message.to_string()),
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}
