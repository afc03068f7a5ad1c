//! Error types for the handle manager
//!
//! Every [`HandleError`] except [`HandleError::ReleaseFailed`] and
//! [`HandleError::Exhausted`] is a boundary contract violation: the caller
//! passed a handle it does not own. The native boundary treats all of them as
//! fatal.

use crate::handle::Handle;

/// Result type for handle operations
pub type HandleResult<T> = Result<T, HandleError>;

/// Handle manager error types
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The null handle was passed where a live handle is required
    #[error("null handle used where a live handle is required")]
    Null,

    /// A negative handle value
    #[error("invalid negative handle {0}")]
    Negative(isize),

    /// Index beyond anything the table ever allocated
    #[error("handle {handle} is out of range (table has {capacity} slots)")]
    OutOfRange {
        /// Offending handle
        handle: Handle,
        /// Number of slots in the table
        capacity: usize,
    },

    /// Slot is empty: the handle was already closed or never installed
    #[error("handle {0} is not live (already closed or never allocated)")]
    NotLive(Handle),

    /// Protected constant passed to close/consume/attach
    #[error("handle {handle} is the permanent constant `{name}`")]
    Constant {
        /// Offending handle
        handle: Handle,
        /// Constant name
        name: &'static str,
    },

    /// Table reached `max_handles`
    #[error("handle table exhausted (limit {limit})")]
    Exhausted {
        /// Configured limit
        limit: usize,
    },

    /// Custom constant table rejected at construction
    #[error("invalid constant table: {0}")]
    InvalidConstantTable(String),

    /// A release callback failed while closing a handle
    #[error("release callback #{position} for handle {handle} failed: {source}")]
    ReleaseFailed {
        /// Handle being closed
        handle: Handle,
        /// Position of the callback in attachment order
        position: usize,
        /// Underlying failure
        #[source]
        source: ReleaseError,
    },
}

impl HandleError {
    /// Whether this error means the caller broke the handle contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            HandleError::Null
                | HandleError::Negative(_)
                | HandleError::OutOfRange { .. }
                | HandleError::NotLive(_)
                | HandleError::Constant { .. }
        )
    }
}

/// Failure reported by a release callback
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ReleaseError {
    message: String,
}

impl ReleaseError {
    /// Create a release error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ReleaseError {
    fn from(s: String) -> Self {
        ReleaseError::new(s)
    }
}

impl From<&str> for ReleaseError {
    fn from(s: &str) -> Self {
        ReleaseError::new(s)
    }
}

/// Failure to load [`HandleOptions`](crate::HandleOptions)
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// TOML syntax or schema error
    #[error("invalid handle options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but are inconsistent
    #[error("invalid handle options: {0}")]
    Invalid(String),
}
