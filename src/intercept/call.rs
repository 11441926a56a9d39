//! The call wrapper and the future it hands back.

use std::fmt;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::BoxFuture;
use tracing::{debug, trace};

use super::target::{FnRef, Invoke, Target};
use crate::ledger::{ErasedContext, InvocationSpec, Producer};
use crate::session::Session;

/// An async function routed through a stub session.
///
/// Built by [`Session::call`], [`Session::call_bound`] or
/// [`Session::call_method`]. While the session is in pass-through mode,
/// [`call`](Self::call) runs the real function. While it is stubbed, the
/// real function is never run: the call is recorded in the session's
/// ledger and the returned future waits for the test to settle it.
///
/// Multi-argument functions take their arguments as a tuple.
pub struct Intercepted<A, T, E> {
    session: Session,
    fn_ref: FnRef,
    context: Option<ErasedContext>,
    invoke: Invoke<A, T, E>,
}

impl<A, T, E> Intercepted<A, T, E>
where
    A: Debug + Send + Sync + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new<C>(session: Session, fn_ref: FnRef, target: Target<C, A, T, E>) -> Self
    where
        C: Send + Sync + 'static,
    {
        let context = target.erased_context();
        let invoke: Invoke<A, T, E> = match target {
            Target::Free(invoke) => invoke,
            bound @ Target::Bound { .. } => Arc::new(move |args: A| bound.invoke(args)),
        };
        Self {
            session,
            fn_ref,
            context,
            invoke,
        }
    }

    /// Invoke the wrapped function.
    ///
    /// Never fails by itself; the future's `Err` carries whatever the real
    /// function or the test's rejection produced.
    pub fn call(&self, args: A) -> CallFuture<T, E> {
        if !self.session.is_stubbed() {
            trace!(func = self.fn_ref.name(), "pass-through call");
            return CallFuture {
                state: CallState::PassThrough((self.invoke)(args)),
            };
        }

        let (tx, rx) = oneshot::channel();
        let invocation = InvocationSpec::capture(self.fn_ref, self.context.clone(), args);
        let request = self
            .session
            .record(invocation, Box::new(Producer::<T, E>::new(tx)));
        debug!(
            call = %request.id(),
            func = self.fn_ref.name(),
            args = request.invocation().args_debug(),
            "call intercepted"
        );
        CallFuture {
            state: CallState::Waiting(rx),
        }
    }
}

impl<A, T, E> Intercepted<A, T, E> {
    /// Identity of the wrapped function, as recorded in the ledger.
    #[must_use]
    pub fn fn_ref(&self) -> FnRef {
        self.fn_ref
    }

    /// Returns `true` if the wrapper was bound to a context.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.context.is_some()
    }

    /// The session this wrapper records into.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl<A, T, E> Clone for Intercepted<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            fn_ref: self.fn_ref,
            context: self.context.clone(),
            invoke: Arc::clone(&self.invoke),
        }
    }
}

impl<A, T, E> Debug for Intercepted<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intercepted")
            .field("fn", &self.fn_ref)
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}

/// Future returned by [`Intercepted::call`].
///
/// In pass-through mode this is the real function's future. Otherwise it
/// completes when the recorded request is settled. A request that is
/// dropped unsettled is abandoned and its future never completes.
#[must_use = "futures do nothing unless awaited"]
pub struct CallFuture<T, E> {
    state: CallState<T, E>,
}

enum CallState<T, E> {
    PassThrough(BoxFuture<'static, Result<T, E>>),
    Waiting(oneshot::Receiver<Result<T, E>>),
    Abandoned,
}

impl<T, E> CallFuture<T, E> {
    /// Returns `true` if this call was recorded instead of run.
    #[must_use]
    pub fn is_intercepted(&self) -> bool {
        !matches!(self.state, CallState::PassThrough(_))
    }
}

impl<T, E> Future for CallFuture<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            CallState::PassThrough(fut) => fut.as_mut().poll(cx),
            CallState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(oneshot::Canceled)) => {
                    trace!("call request dropped unsettled; abandoning");
                    this.state = CallState::Abandoned;
                    Poll::Pending
                }
                Poll::Pending => Poll::Pending,
            },
            CallState::Abandoned => Poll::Pending,
        }
    }
}

impl<T, E> Debug for CallFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            CallState::PassThrough(_) => "pass-through",
            CallState::Waiting(_) => "waiting",
            CallState::Abandoned => "abandoned",
        };
        f.debug_struct("CallFuture").field("state", &state).finish()
    }
}
