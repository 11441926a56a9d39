//! The handle a `with_stub` body receives.

use std::future::Future;

use crate::error::Result;
use crate::intercept::FnRef;
use crate::ledger::CallRequest;
use crate::session::Session;
use crate::tick::TaskHandle;

/// Ledger access and tick control for the body of
/// [`Session::with_stub`].
///
/// Exposes reading the ledger, advancing ticks and spawning the code
/// under test; starting and ending the session stays with `with_stub`.
#[derive(Debug, Clone)]
pub struct StubContext {
    session: Session,
}

impl StubContext {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    /// Snapshot of the ledger, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRequest> {
        self.session.calls()
    }

    /// The call at `index`, or `None` if out of range.
    #[must_use]
    pub fn call_at(&self, index: usize) -> Option<CallRequest> {
        self.session.call_at(index)
    }

    /// The call at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchCall`](crate::Error::NoSuchCall) if out of range.
    pub fn expect_call(&self, index: usize) -> Result<CallRequest> {
        self.session.expect_call(index)
    }

    /// Number of calls in the ledger.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.session.call_count()
    }

    /// Calls to `fn_ref` currently in the ledger, in call order.
    #[must_use]
    pub fn calls_to(&self, fn_ref: FnRef) -> Vec<CallRequest> {
        self.session.calls_to(fn_ref)
    }

    /// See [`Session::advance_tick`].
    pub async fn advance_tick(&self) {
        self.session.advance_tick().await;
    }

    /// See [`Session::advance_ticks`].
    pub async fn advance_ticks(&self, ticks: usize) {
        self.session.advance_ticks(ticks).await;
    }

    /// See [`Session::spawn`].
    pub fn spawn<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.session.spawn(future)
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}
