//! Error types for registry operations.

use evr_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the event registry.
///
/// Every variant carries the name of the operation that raised it and the
/// key or argument at fault. All errors are terminal for the current call.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The key to register already holds a record.
    #[error("[{op}] event '{key}' already exists")]
    AlreadyExists { op: &'static str, key: String },

    /// A queried or update-target key holds no record.
    #[error("[{op}] event '{key}' does not exist")]
    NotFound { op: &'static str, key: String },

    /// An argument did not parse as the expected structured shape.
    #[error("[{op}] malformed {arg}: {reason}")]
    MalformedInput {
        op: &'static str,
        arg: &'static str,
        reason: String,
    },

    /// An argument parsed but carries nothing to act on.
    #[error("[{op}] {arg} is empty")]
    EmptyInput { op: &'static str, arg: &'static str },

    /// The ledger store failed to read, write, or iterate.
    #[error("[{op}] {action}({target}) failed: {source}")]
    Store {
        op: &'static str,
        action: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    /// No handler is registered under the requested operation name.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// The operation was invoked with the wrong number of arguments.
    #[error("[{op}] expects {expected} argument(s), got {got}")]
    WrongArity {
        op: &'static str,
        expected: usize,
        got: usize,
    },
}

impl RegistryError {
    pub(crate) fn store(
        op: &'static str,
        action: &'static str,
        target: impl Into<String>,
        source: StoreError,
    ) -> Self {
        Self::Store {
            op,
            action,
            target: target.into(),
            source,
        }
    }

    /// Name of the operation that raised the error, if known.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::AlreadyExists { op, .. }
            | Self::NotFound { op, .. }
            | Self::MalformedInput { op, .. }
            | Self::EmptyInput { op, .. }
            | Self::Store { op, .. }
            | Self::WrongArity { op, .. } => Some(*op),
            Self::UnknownOperation(_) => None,
        }
    }
}

/// Convenience type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
