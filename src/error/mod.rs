//! Error definitions
//!
//! Usage errors raised by the stepping API. Application errors handed to
//! [`CallRequest::reject`](crate::ledger::CallRequest::reject) never pass
//! through this type; they reach the intercepted future untouched.

use thiserror::Error;

use crate::ledger::CallId;

/// Main error type for callstep
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A call request was resolved or rejected more than once.
    #[error("{call} was already settled")]
    AlreadySettled {
        /// The request that was settled twice.
        call: CallId,
    },

    /// A value of the wrong type was used to settle a request or look up a method.
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        /// The type the call site expects.
        expected: &'static str,
        /// The type that was supplied.
        found: &'static str,
    },

    /// A ledger index was out of range.
    #[error("no call at index {index} (ledger holds {len})")]
    NoSuchCall {
        /// The requested index.
        index: usize,
        /// Number of calls in the ledger at the time.
        len: usize,
    },

    /// A method name was not registered in the method table.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A stub session was started while another one was active.
    #[error("a stub session is already active")]
    SessionActive,

    /// A guarded future did not settle within one tick.
    #[error("future was not settled within one tick")]
    NotSettled,
}

impl Error {
    /// Create a type mismatch error from two types.
    #[must_use]
    pub fn type_mismatch<Expected: ?Sized, Found: ?Sized>() -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<Expected>(),
            found: std::any::type_name::<Found>(),
        }
    }

    /// Create an unknown method error.
    #[must_use]
    pub fn unknown_method(name: impl Into<String>) -> Self {
        Self::UnknownMethod(name.into())
    }

    /// Returns `true` for the completion-guard sentinel.
    #[must_use]
    pub fn is_not_settled(&self) -> bool {
        matches!(self, Self::NotSettled)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
