//! The per-thread default session and the free functions that use it.
//!
//! Each thread lazily gets its own [`Session`]. Test harnesses run every
//! test on its own thread, so tests using these functions do not share
//! ledgers. Stay on one thread while using them: a body that migrates to
//! another worker thread sees that thread's session instead.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use super::{Session, StubContext};
use crate::error::Result;
use crate::intercept::{Intercepted, MethodTable};
use crate::ledger::CallRequest;
use crate::tick::TaskHandle;

thread_local! {
    static CURRENT: Session = Session::new();
}

pub(super) fn session() -> Session {
    CURRENT.with(Session::clone)
}

/// Wraps a free async function in the current thread's session.
///
/// See [`Session::call`].
pub fn call<F, Fut, A, T, E>(f: F) -> Intercepted<A, T, E>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    A: Debug + Send + Sync + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    session().call(f)
}

/// Wraps a context-bound async function in the current thread's session.
///
/// See [`Session::call_bound`].
pub fn call_bound<C, F, Fut, A, T, E>(context: Arc<C>, f: F) -> Intercepted<A, T, E>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    A: Debug + Send + Sync + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    session().call_bound(context, f)
}

/// Wraps a named method in the current thread's session.
///
/// # Errors
///
/// See [`Session::call_method`].
pub fn call_method<C, A, T, E>(
    context: Arc<C>,
    table: &MethodTable<C>,
    name: &str,
) -> Result<Intercepted<A, T, E>>
where
    C: Send + Sync + 'static,
    A: Debug + Send + Sync + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    session().call_method(context, table, name)
}

/// Stubs the current thread's session.
///
/// # Errors
///
/// See [`Session::stub`].
pub fn stub() -> Result<()> {
    session().stub()
}

/// Ends stubbing on the current thread's session.
pub fn unstub() {
    session().unstub();
}

/// Clears the current thread's ledger, keeping its mode and spawned tasks.
pub fn reset() {
    session().reset();
}

/// Returns `true` while the current thread's session is stubbed.
#[must_use]
pub fn is_stubbed() -> bool {
    session().is_stubbed()
}

/// Snapshot of the current thread's ledger.
#[must_use]
pub fn calls() -> Vec<CallRequest> {
    session().calls()
}

/// The call at `index` in the current thread's ledger.
#[must_use]
pub fn call_at(index: usize) -> Option<CallRequest> {
    session().call_at(index)
}

/// The call at `index` in the current thread's ledger.
///
/// # Errors
///
/// See [`Session::expect_call`].
pub fn expect_call(index: usize) -> Result<CallRequest> {
    session().expect_call(index)
}

/// Starts `future` on the current thread's session.
pub fn spawn<F, T>(future: F) -> TaskHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    session().spawn(future)
}

/// Advances the current thread's session by one tick.
pub async fn advance_tick() {
    let session = session();
    session.advance_tick().await;
}

/// Runs `body` inside a stub session on the current thread's session.
///
/// # Errors
///
/// See [`Session::with_stub`].
pub async fn with_stub<B, Fut, R>(body: B) -> Result<R>
where
    B: FnOnce(StubContext) -> Fut,
    Fut: Future<Output = R>,
{
    let session = session();
    session.with_stub(body).await
}
