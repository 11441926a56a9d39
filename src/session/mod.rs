//! Stub sessions: interception mode, the call ledger and the tick driver.
//!
//! A [`Session`] starts in pass-through mode, where intercepted functions
//! simply run. [`Session::stub`] switches it to recording mode;
//! [`Session::unstub`] switches it back. [`Session::with_stub`] does both
//! around a test body and always cleans up, whether the body returns,
//! fails, or panics.
//!
//! # Example
//!
//! ```rust
//! use callstep::{assert_settled, Session};
//!
//! async fn price(item: &'static str) -> Result<u32, String> {
//!     unreachable!("never called while stubbed: {item}")
//! }
//!
//! async fn total(
//!     price: callstep::Intercepted<&'static str, u32, String>,
//! ) -> Result<u32, String> {
//!     let tea = price.call("tea").await?;
//!     let (cake, jam) = futures::try_join!(price.call("cake"), price.call("jam"))?;
//!     Ok(tea + cake + jam)
//! }
//!
//! let session = Session::new();
//! let price = session.call(price);
//!
//! futures::executor::block_on(session.with_stub(|ctx| async move {
//!     let order = ctx.spawn(total(price));
//!     assert_eq!(ctx.call_count(), 1);
//!     ctx.expect_call(0)?.resolve(3u32)?;
//!
//!     ctx.advance_tick().await;
//!     assert_eq!(ctx.call_count(), 2);
//!     ctx.expect_call(0)?.resolve(4u32)?;
//!     ctx.expect_call(1)?.resolve(5u32)?;
//!
//!     ctx.advance_tick().await;
//!     assert_eq!(assert_settled(order).await?, Ok(12));
//!     Ok::<(), callstep::Error>(())
//! }))
//! .unwrap()
//! .unwrap();
//! ```

mod config;
mod context;
mod current;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

pub use config::{NestingPolicy, SessionConfig};
pub use context::StubContext;
pub use current::{
    advance_tick, call, call_at, call_bound, call_method, calls, expect_call, is_stubbed, reset,
    spawn, stub, unstub, with_stub,
};

use crate::assertions::yield_turn;
use crate::error::{Error, Result};
use crate::intercept::{FnRef, Intercepted, MethodTable, Target};
use crate::ledger::{CallRequest, InvocationSpec, Ledger, Settle};
use crate::tick::{TaskHandle, TickDriver};

/// Whether intercepted calls are recorded or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Intercepted functions run for real.
    #[default]
    PassThrough,
    /// Intercepted calls are recorded and wait for the test.
    Stubbed,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::PassThrough => write!(f, "pass-through"),
            Mode::Stubbed => write!(f, "stubbed"),
        }
    }
}

/// Interception mode, call ledger and tick driver, shared by every
/// interceptor built from it.
///
/// Cloning a session yields another handle to the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    mode: Mutex<Mode>,
    ledger: Mutex<Ledger>,
    driver: TickDriver,
}

impl Session {
    /// Creates a session in pass-through mode with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    /// Creates a session in pass-through mode.
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                mode: Mutex::new(Mode::PassThrough),
                ledger: Mutex::new(Ledger::new()),
                driver: TickDriver::new(),
            }),
        }
    }

    /// The calling thread's default session, used by the crate-level
    /// free functions such as [`call`](crate::call) and
    /// [`with_stub`](crate::with_stub).
    #[must_use]
    pub fn current() -> Self {
        current::session()
    }

    /// The session's configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The current interception mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        *self.inner.mode.lock()
    }

    /// Returns `true` while calls are being recorded.
    #[must_use]
    pub fn is_stubbed(&self) -> bool {
        self.mode() == Mode::Stubbed
    }

    // ========================================================================
    // Session control
    // ========================================================================

    /// Starts recording calls and clears the ledger.
    ///
    /// # Errors
    ///
    /// [`Error::SessionActive`] if already stubbed and the nesting policy
    /// is [`NestingPolicy::Reject`].
    pub fn stub(&self) -> Result<()> {
        {
            let mut mode = self.inner.mode.lock();
            if *mode == Mode::Stubbed && self.inner.config.nesting == NestingPolicy::Reject {
                warn!(session = self.label(), "stub session already active");
                return Err(Error::SessionActive);
            }
            *mode = Mode::Stubbed;
        }
        let cleared = self.clear_ledger();
        debug!(session = self.label(), cleared = cleared.len(), "stub session started");
        Ok(())
    }

    /// Stops recording, clears the ledger and abandons spawned tasks.
    ///
    /// Safe to call when not stubbed.
    pub fn unstub(&self) {
        let was = std::mem::replace(&mut *self.inner.mode.lock(), Mode::PassThrough);
        let cleared = self.drain_ledger();
        let abandoned = self.inner.driver.abandon();
        if was == Mode::Stubbed {
            debug!(session = self.label(), cleared, abandoned, "stub session ended");
        }
    }

    /// Clears the ledger, keeping the mode.
    ///
    /// Spawned tasks keep running. A request the test still holds can be
    /// settled after the reset and its task resumes on the next tick;
    /// requests nobody holds are dropped and their futures never complete.
    pub fn reset(&self) {
        let cleared = self.drain_ledger();
        debug!(
            session = self.label(),
            cleared,
            pending_tasks = self.pending_tasks(),
            "session reset"
        );
    }

    /// Runs `body` inside a stub session.
    ///
    /// The session is stubbed and its ledger cleared before `body` starts.
    /// When `body` finishes, returns an error, panics, or is dropped, the
    /// session goes back to pass-through and the ledger is cleared; the
    /// body's output or panic then propagates unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::SessionActive`] if the session could not be started, in
    /// which case `body` is not run.
    pub async fn with_stub<B, Fut, R>(&self, body: B) -> Result<R>
    where
        B: FnOnce(StubContext) -> Fut,
        Fut: Future<Output = R>,
    {
        self.stub()?;
        let _guard = StubGuard { session: self };
        Ok(body(StubContext::new(self.clone())).await)
    }

    // ========================================================================
    // Interception
    // ========================================================================

    /// Wraps a free async function.
    ///
    /// Arguments are kept in the ledger, which any thread holding the
    /// session can read, so `A` must be `Sync` as well as `Send`. Pass
    /// `Cell`/`RefCell` state as an owned snapshot or behind a `Mutex`.
    ///
    /// ```compile_fail
    /// use std::cell::Cell;
    ///
    /// async fn bump(counter: Cell<u8>) -> Result<u8, ()> {
    ///     Ok(counter.get() + 1)
    /// }
    ///
    /// let _ = callstep::Session::new().call(bump);
    /// ```
    pub fn call<F, Fut, A, T, E>(&self, f: F) -> Intercepted<A, T, E>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        A: fmt::Debug + Send + Sync + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let fn_ref = FnRef::of(&f);
        let target = Target::<(), A, T, E>::Free(Arc::new(move |args| f(args).boxed()));
        Intercepted::new(self.clone(), fn_ref, target)
    }

    /// Wraps an async function that takes `context` as its first argument.
    ///
    /// Methods with a `self: Arc<Self>` receiver fit directly:
    /// `session.call_bound(api, Api::fetch)`.
    pub fn call_bound<C, F, Fut, A, T, E>(&self, context: Arc<C>, f: F) -> Intercepted<A, T, E>
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        A: fmt::Debug + Send + Sync + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let fn_ref = FnRef::of(&f);
        let target = Target::Bound {
            context,
            invoke: Arc::new(move |ctx, args| f(ctx, args).boxed()),
        };
        Intercepted::new(self.clone(), fn_ref, target)
    }

    /// Wraps the method registered as `name` in `table`, bound to `context`.
    ///
    /// The recorded function is the registered one, exactly as if it had
    /// been passed to [`call_bound`](Self::call_bound).
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMethod`] if `name` is not registered and
    /// [`Error::TypeMismatch`] if it has a different signature.
    pub fn call_method<C, A, T, E>(
        &self,
        context: Arc<C>,
        table: &MethodTable<C>,
        name: &str,
    ) -> Result<Intercepted<A, T, E>>
    where
        C: Send + Sync + 'static,
        A: fmt::Debug + Send + Sync + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (fn_ref, invoke) = table.resolve::<A, T, E>(name)?;
        let target = Target::Bound { context, invoke };
        Ok(Intercepted::new(self.clone(), fn_ref, target))
    }

    pub(crate) fn record(&self, invocation: InvocationSpec, producer: Box<dyn Settle>) -> CallRequest {
        self.inner.ledger.lock().record(invocation, producer)
    }

    // ========================================================================
    // Ledger access
    // ========================================================================

    /// Snapshot of the ledger, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRequest> {
        self.inner.ledger.lock().snapshot()
    }

    /// The call at `index`, or `None` if out of range.
    #[must_use]
    pub fn call_at(&self, index: usize) -> Option<CallRequest> {
        self.inner.ledger.lock().get(index)
    }

    /// The call at `index`.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchCall`] if out of range.
    pub fn expect_call(&self, index: usize) -> Result<CallRequest> {
        self.inner.ledger.lock().expect(index)
    }

    /// Number of calls in the ledger.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.ledger.lock().len()
    }

    /// Calls to `fn_ref` currently in the ledger, in call order.
    #[must_use]
    pub fn calls_to(&self, fn_ref: FnRef) -> Vec<CallRequest> {
        self.inner.ledger.lock().calls_to(fn_ref)
    }

    // ========================================================================
    // Ticks
    // ========================================================================

    /// Starts `future` on the session's tick driver.
    ///
    /// The future runs right away, up to its first pending await; from then
    /// on it only makes progress in [`advance_tick`](Self::advance_tick).
    pub fn spawn<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.driver.spawn(future)
    }

    /// Number of spawned tasks that have not finished.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.inner.driver.ready_count() + self.inner.driver.waiting_count()
    }

    /// Clears the ledger and advances one tick.
    ///
    /// Every spawned task whose awaited call was settled since it last ran
    /// is polled exactly once, so the ledger afterwards holds only the
    /// calls those continuations made. The caller then yields once to its
    /// own executor. A function that needs more turns to reach its next
    /// call needs more ticks.
    pub async fn advance_tick(&self) {
        let cleared = self.clear_ledger();
        let polled = self.inner.driver.turn();
        debug!(
            session = self.label(),
            cleared = cleared.len(),
            polled,
            recorded = self.call_count(),
            "tick advanced"
        );
        drop(cleared);
        yield_turn().await;
    }

    /// Advances `ticks` ticks.
    pub async fn advance_ticks(&self, ticks: usize) {
        for _ in 0..ticks {
            self.advance_tick().await;
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn label(&self) -> &str {
        self.inner.config.label()
    }

    /// Empties the ledger. The requests are returned so they are dropped
    /// after the lock is released.
    fn clear_ledger(&self) -> Vec<CallRequest> {
        self.inner.ledger.lock().clear()
    }

    /// Clears the ledger, warning about requests left unsettled.
    fn drain_ledger(&self) -> usize {
        let cleared = self.clear_ledger();
        let unsettled = cleared.iter().filter(|req| !req.is_settled()).count();
        if unsettled > 0 && self.inner.config.warn_on_unsettled {
            warn!(session = self.label(), unsettled, "session cleared with unsettled calls");
        }
        cleared.len()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.label())
            .field("mode", &self.mode())
            .field("ledger", &*self.inner.ledger.lock())
            .field("driver", &self.inner.driver)
            .finish()
    }
}

/// Ends the stub session when dropped.
struct StubGuard<'a> {
    session: &'a Session,
}

impl Drop for StubGuard<'_> {
    fn drop(&mut self) {
        self.session.unstub();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::poll_once;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Poll;

    async fn echo(n: u32) -> std::result::Result<u32, String> {
        Ok(n)
    }

    #[test]
    fn test_new_session_passes_through() {
        let session = Session::new();
        assert_eq!(session.mode(), Mode::PassThrough);
        assert!(!session.is_stubbed());
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn test_stub_unstub_cycle_clears_ledger() {
        let session = Session::new();
        let echo = session.call(echo);

        session.stub().unwrap();
        let _a = echo.call(1);
        let _b = echo.call(2);
        assert_eq!(session.call_count(), 2);

        session.unstub();
        assert_eq!(session.mode(), Mode::PassThrough);
        assert_eq!(session.call_count(), 0);

        session.stub().unwrap();
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn test_nested_stub_rejected_by_default() {
        let session = Session::new();
        session.stub().unwrap();
        assert_eq!(session.stub(), Err(Error::SessionActive));
        assert!(session.is_stubbed());
    }

    #[test]
    fn test_nested_stub_resets_under_reset_policy() {
        let session = Session::with_config(SessionConfig::new().with_nesting(NestingPolicy::Reset));
        let echo = session.call(echo);

        session.stub().unwrap();
        let _a = echo.call(1);
        session.stub().unwrap();

        assert!(session.is_stubbed());
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn test_reset_keeps_mode() {
        let session = Session::new();
        let echo = session.call(echo);
        session.stub().unwrap();
        let _a = echo.call(1);

        session.reset();
        assert!(session.is_stubbed());
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn test_reset_keeps_tasks_for_held_requests() {
        let session = Session::new();
        let echo = session.call(echo);
        session.stub().unwrap();

        let handle = session.spawn({
            let echo = echo.clone();
            async move { echo.call(40).await.map(|n| n + 1) }
        });
        let held = session.expect_call(0).unwrap();

        session.reset();
        assert_eq!(session.call_count(), 0);
        assert_eq!(session.pending_tasks(), 1);

        held.resolve(41u32).unwrap();
        futures::executor::block_on(session.advance_tick());
        assert_eq!(handle.take(), Some(Ok(42)));
        assert_eq!(session.pending_tasks(), 0);
    }

    #[test]
    fn test_unstub_abandons_tasks() {
        let session = Session::new();
        let echo = session.call(echo);
        session.stub().unwrap();

        let handle = session.spawn({
            let echo = echo.clone();
            async move { echo.call(1).await }
        });
        let held = session.expect_call(0).unwrap();

        session.unstub();
        assert_eq!(session.pending_tasks(), 0);

        held.resolve(1u32).unwrap();
        futures::executor::block_on(session.advance_tick());
        assert!(!handle.is_complete());
    }

    #[test]
    fn test_unstub_when_inactive_is_harmless() {
        let session = Session::new();
        session.unstub();
        assert_eq!(session.mode(), Mode::PassThrough);
    }

    #[test]
    fn test_expect_call_out_of_range() {
        let session = Session::new();
        session.stub().unwrap();
        assert!(session.call_at(0).is_none());
        assert_eq!(
            session.expect_call(0).unwrap_err(),
            Error::NoSuchCall { index: 0, len: 0 }
        );
    }

    #[test]
    fn test_settled_calls_stay_until_tick() {
        let session = Session::new();
        let echo = session.call(echo);
        session.stub().unwrap();
        let _a = echo.call(1);

        session.expect_call(0).unwrap().resolve(1u32).unwrap();
        assert_eq!(session.call_count(), 1);
        assert!(session.calls()[0].is_settled());

        futures::executor::block_on(session.advance_tick());
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn test_tick_polls_woken_task_once() {
        let session = Session::new();
        let echo = session.call(echo);
        session.stub().unwrap();

        let handle = session.spawn({
            let echo = echo.clone();
            async move {
                let a = echo.call(1).await?;
                let b = echo.call(a + 1).await?;
                Ok::<u32, String>(b)
            }
        });
        assert_eq!(session.pending_tasks(), 1);
        assert_eq!(session.call_count(), 1);

        session.expect_call(0).unwrap().resolve(10u32).unwrap();
        futures::executor::block_on(session.advance_tick());

        let next = session.expect_call(0).unwrap();
        assert_eq!(next.invocation().args::<u32>(), Some(&11));
        next.resolve(20u32).unwrap();

        assert!(!handle.is_complete());
        futures::executor::block_on(session.advance_tick());
        assert_eq!(handle.take(), Some(Ok(20)));
        assert_eq!(session.pending_tasks(), 0);
    }

    #[test]
    fn test_with_stub_restores_pass_through() {
        let session = Session::new();
        let out = futures::executor::block_on(session.with_stub(|ctx| async move {
            assert!(ctx.session().is_stubbed());
            7
        }));

        assert_eq!(out, Ok(7));
        assert!(!session.is_stubbed());
    }

    #[test]
    fn test_with_stub_body_error_is_untouched() {
        let session = Session::new();
        let out: Result<std::result::Result<(), &str>> =
            futures::executor::block_on(session.with_stub(|_| async { Err("body failed") }));

        assert_eq!(out, Ok(Err("body failed")));
        assert!(!session.is_stubbed());
    }

    #[test]
    fn test_with_stub_rejected_when_active_skips_body() {
        let session = Session::new();
        session.stub().unwrap();
        let ran = AtomicUsize::new(0);

        let out = futures::executor::block_on(session.with_stub(|_| async {
            ran.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(out, Err(Error::SessionActive));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(session.is_stubbed());
    }

    #[test]
    fn test_dropping_with_stub_future_cleans_up() {
        let session = Session::new();
        let echo = session.call(echo);
        {
            let mut fut = Box::pin(session.with_stub(|_| async move {
                echo.call(1).await
            }));
            assert_eq!(poll_once(&mut fut), Poll::Pending);
            assert!(session.is_stubbed());
            assert_eq!(session.call_count(), 1);
        }
        assert!(!session.is_stubbed());
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn test_debug_output() {
        let session = Session::with_config(SessionConfig::new().with_name("debug"));
        let debug = format!("{session:?}");
        assert!(debug.contains("Session"));
        assert!(debug.contains("\"debug\""));
        assert!(debug.contains("PassThrough"));
    }
}
