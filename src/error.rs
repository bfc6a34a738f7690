//! Centralized error handling for the dataops engine.
//!
//! Every fallible library operation returns [`Result<T>`], whose error type is
//! [`DataOpsError`]. The variants follow the failure taxonomy of the engine:
//!
//! ```
//! use insight_dataops::error::DataOpsError;
//!
//! fn describe(err: &DataOpsError) -> &'static str {
//!     match err {
//!         DataOpsError::Ingestion(_) => "the upload could not be read",
//!         DataOpsError::SafetyViolation(_) => "the action was rejected",
//!         DataOpsError::PlannerFailure(_) => "the instruction could not be planned",
//!         _ => "something else went wrong",
//!     }
//! }
//! ```
//!
//! ## Context Extension Trait
//!
//! [`ResultExt`] adds `.context()` to any `Result` whose error converts into
//! [`DataOpsError`]:
//!
//! ```no_run
//! use insight_dataops::error::ResultExt as _;
//!
//! fn load() -> insight_dataops::error::Result<String> {
//!     let text = std::fs::read_to_string("people.csv").context("Failed to read upload")?;
//!     Ok(text)
//! }
//! ```

use std::fmt;

/// Main error type for dataops operations.
#[derive(Debug)]
pub enum DataOpsError {
    /// Malformed, empty or unsupported source file
    Ingestion(String),

    /// Destructive operation without an explicit, specific target
    SafetyViolation(String),

    /// The planner produced no usable plan
    PlannerFailure(String),

    /// A plan operation failed parameter validation
    InvalidOperation { index: usize, message: String },

    /// A positional target outside the row-set under the strict range policy
    OutOfRange(String),

    /// No dataset with the given id is cached
    DatasetNotFound(String),

    /// The action needs an active dataset
    NoActiveDataset,

    /// A one-shot commit was attempted while the draft holds unsaved changes
    UnsavedDraft(String),

    /// The snapshot changed while a plan was being prepared for it
    ConcurrentModification(String),

    /// I/O errors (config files, exports)
    Io(std::io::Error),

    /// JSON / CSV encoding errors
    Serialization(String),

    /// Generic error with context
    Other(String),
}

impl DataOpsError {
    pub fn invalid_operation(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            index,
            message: message.into(),
        }
    }

    /// Whether the failure rejected a plan before any row was touched.
    pub fn is_plan_rejection(&self) -> bool {
        matches!(
            self,
            Self::SafetyViolation(_) | Self::InvalidOperation { .. } | Self::OutOfRange(_)
        )
    }
}

impl fmt::Display for DataOpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingestion(msg) => write!(f, "Ingestion error: {msg}"),
            Self::SafetyViolation(msg) => write!(f, "Safety check failed: {msg}"),
            Self::PlannerFailure(msg) => write!(f, "Planner failure: {msg}"),
            Self::InvalidOperation { index, message } => {
                write!(f, "Invalid operation {}: {message}", index + 1)
            }
            Self::OutOfRange(msg) => write!(f, "Target out of range: {msg}"),
            Self::DatasetNotFound(id) => write!(f, "Dataset not found: {id}"),
            Self::NoActiveDataset => write!(f, "No active dataset"),
            Self::UnsavedDraft(msg) => write!(f, "Unsaved draft changes: {msg}"),
            Self::ConcurrentModification(msg) => write!(f, "Concurrent modification: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DataOpsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DataOpsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for DataOpsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

impl From<csv::Error> for DataOpsError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(format!("CSV error: {err}"))
    }
}

impl From<anyhow::Error> for DataOpsError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Result type alias for dataops operations.
pub type Result<T> = std::result::Result<T, DataOpsError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DataOpsError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: DataOpsError = e.into();
            DataOpsError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: DataOpsError = e.into();
            DataOpsError::Other(format!("{}: {}", f(), err))
        })
    }
}
