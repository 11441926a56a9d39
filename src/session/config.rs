//! Session configuration.

use std::fmt;

/// What [`Session::stub`](crate::Session::stub) does when the session is
/// already stubbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NestingPolicy {
    /// Fail with [`Error::SessionActive`](crate::Error::SessionActive).
    #[default]
    Reject,
    /// Clear the ledger and stay stubbed.
    ///
    /// The first teardown that follows ends the session, nested or not.
    Reset,
}

impl fmt::Display for NestingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NestingPolicy::Reject => write!(f, "reject"),
            NestingPolicy::Reset => write!(f, "reset"),
        }
    }
}

/// Configuration for a [`Session`](crate::Session).
///
/// # Example
///
/// ```rust
/// use callstep::{NestingPolicy, Session, SessionConfig};
///
/// let config = SessionConfig::new()
///     .with_name("checkout")
///     .with_nesting(NestingPolicy::Reset);
/// let session = Session::with_config(config);
/// assert_eq!(session.config().nesting, NestingPolicy::Reset);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Policy for starting a session that is already active.
    pub nesting: NestingPolicy,
    /// Log a warning when a session ends with unsettled calls.
    pub warn_on_unsettled: bool,
    /// Label attached to the session's log events.
    pub name: Option<String>,
}

impl SessionConfig {
    /// Default configuration: reject nesting, warn on unsettled calls.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nesting: NestingPolicy::Reject,
            warn_on_unsettled: true,
            name: None,
        }
    }

    /// Sets the nesting policy.
    #[must_use]
    pub fn with_nesting(mut self, nesting: NestingPolicy) -> Self {
        self.nesting = nesting;
        self
    }

    /// Enables or disables the unsettled-call warning.
    #[must_use]
    pub fn with_warn_on_unsettled(mut self, warn: bool) -> Self {
        self.warn_on_unsettled = warn;
        self
    }

    /// Sets the label used in log events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("default")
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
