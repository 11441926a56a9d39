//! Call requests: one record per intercepted call.

use std::any::{type_name, Any};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

use futures::channel::oneshot;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::intercept::FnRef;
use crate::ledger::CallId;

/// Type-erased shared context a call was bound to.
pub(crate) type ErasedContext = Arc<dyn Any + Send + Sync>;

/// What was called, and with what.
///
/// The argument value is moved in at call time and only ever handed out by
/// shared reference afterwards.
pub struct InvocationSpec {
    fn_ref: FnRef,
    args: Box<dyn Any + Send + Sync>,
    args_debug: String,
    context: Option<ErasedContext>,
}

impl InvocationSpec {
    pub(crate) fn capture<A>(fn_ref: FnRef, context: Option<ErasedContext>, args: A) -> Self
    where
        A: Debug + Send + Sync + 'static,
    {
        Self {
            fn_ref,
            args_debug: format!("{args:?}"),
            args: Box::new(args),
            context,
        }
    }

    /// Identity of the called function.
    #[must_use]
    pub fn fn_ref(&self) -> FnRef {
        self.fn_ref
    }

    /// The captured arguments, if they are of type `A`.
    ///
    /// Multi-argument calls capture a tuple.
    #[must_use]
    pub fn args<A: 'static>(&self) -> Option<&A> {
        self.args.downcast_ref::<A>()
    }

    /// `Debug` rendering of the arguments taken at call time.
    #[must_use]
    pub fn args_debug(&self) -> &str {
        &self.args_debug
    }

    /// The bound context, if one was supplied and it is of type `C`.
    #[must_use]
    pub fn context<C: 'static>(&self) -> Option<&C> {
        self.context.as_deref().and_then(|ctx| ctx.downcast_ref::<C>())
    }

    /// Returns `true` if the call was made through a bound context.
    #[must_use]
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Returns `true` if `f` is the function that was called.
    #[must_use]
    pub fn is_call_to<F: 'static>(&self, f: &F) -> bool {
        self.fn_ref == FnRef::of(f)
    }

    /// Returns `true` if the call was bound to this exact context instance.
    #[must_use]
    pub fn is_bound_to<C: Send + Sync + 'static>(&self, context: &Arc<C>) -> bool {
        self.context.as_ref().is_some_and(|ctx| {
            Arc::as_ptr(ctx).cast::<()>() == Arc::as_ptr(context).cast::<()>()
        })
    }

    /// Structural match against an unbound `(f, args)` expectation.
    ///
    /// A call made through a bound context never matches.
    #[must_use]
    pub fn matches<F, A>(&self, f: &F, args: &A) -> bool
    where
        F: 'static,
        A: PartialEq + 'static,
    {
        self.context.is_none() && self.is_call_to(f) && self.args::<A>() == Some(args)
    }
}

impl Debug for InvocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("InvocationSpec");
        s.field("fn", &self.fn_ref).field("args", &format_args!("{}", self.args_debug));
        if self.context.is_some() {
            s.field("context", &format_args!("<bound>"));
        }
        s.finish()
    }
}

/// Producer side of a deferred result, with the concrete types erased.
pub(crate) trait Settle: Send + Sync {
    fn settle(&self, call: CallId, outcome: Outcome) -> Result<()>;
    fn is_settled(&self) -> bool;
}

/// A resolution or rejection value before it is checked against the call's types.
pub(crate) enum Outcome {
    Resolve(Box<dyn Any + Send>, &'static str),
    Reject(Box<dyn Any + Send>, &'static str),
}

/// Typed producer half of the oneshot pair behind an intercepted call.
pub(crate) struct Producer<T, E> {
    tx: Mutex<Option<oneshot::Sender<std::result::Result<T, E>>>>,
}

impl<T, E> Producer<T, E> {
    pub(crate) fn new(tx: oneshot::Sender<std::result::Result<T, E>>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

impl<T, E> Settle for Producer<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn settle(&self, call: CallId, outcome: Outcome) -> Result<()> {
        let tx = {
            let mut slot = self.tx.lock();
            if slot.is_none() {
                return Err(Error::AlreadySettled { call });
            }
            let value = match outcome {
                Outcome::Resolve(value, found) => Ok(*value
                    .downcast::<T>()
                    .map_err(|_| Error::TypeMismatch {
                        expected: type_name::<T>(),
                        found,
                    })?),
                Outcome::Reject(error, found) => Err(*error
                    .downcast::<E>()
                    .map_err(|_| Error::TypeMismatch {
                        expected: type_name::<E>(),
                        found,
                    })?),
            };
            slot.take().map(|tx| (tx, value))
        };

        if let Some((tx, value)) = tx {
            if tx.send(value).is_err() {
                trace!(%call, "settled a call whose future was dropped");
            }
        }
        Ok(())
    }

    fn is_settled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// One intercepted call, waiting for the test to settle it.
///
/// Cloning yields another handle to the same request. A request settles
/// exactly once; later attempts fail with [`Error::AlreadySettled`].
#[derive(Clone)]
pub struct CallRequest {
    inner: Arc<RequestInner>,
}

struct RequestInner {
    id: CallId,
    invocation: InvocationSpec,
    producer: Box<dyn Settle>,
}

impl CallRequest {
    pub(crate) fn new(id: CallId, invocation: InvocationSpec, producer: Box<dyn Settle>) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                id,
                invocation,
                producer,
            }),
        }
    }

    /// Session-unique identifier of this request.
    #[must_use]
    pub fn id(&self) -> CallId {
        self.inner.id
    }

    /// What was called.
    #[must_use]
    pub fn invocation(&self) -> &InvocationSpec {
        &self.inner.invocation
    }

    /// Fulfill the intercepted future with `value`.
    ///
    /// `V` must be exactly the wrapped function's success type.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadySettled`] on a second settlement and
    /// [`Error::TypeMismatch`] when `V` is not the success type.
    pub fn resolve<V: Send + 'static>(&self, value: V) -> Result<()> {
        self.settle(Outcome::Resolve(Box::new(value), type_name::<V>()))
    }

    /// Fail the intercepted future with `error`, passed through unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadySettled`] on a second settlement and
    /// [`Error::TypeMismatch`] when `V` is not the error type.
    pub fn reject<V: Send + 'static>(&self, error: V) -> Result<()> {
        self.settle(Outcome::Reject(Box::new(error), type_name::<V>()))
    }

    /// Returns `true` once the request has been resolved or rejected.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.producer.is_settled()
    }

    fn settle(&self, outcome: Outcome) -> Result<()> {
        let kind = match outcome {
            Outcome::Resolve(..) => "resolve",
            Outcome::Reject(..) => "reject",
        };
        self.inner.producer.settle(self.inner.id, outcome)?;
        debug!(call = %self.inner.id, kind, target = self.inner.invocation.fn_ref.name(), "call settled");
        Ok(())
    }
}

impl Debug for CallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRequest")
            .field("id", &self.inner.id)
            .field("invocation", &self.inner.invocation)
            .field("settled", &self.is_settled())
            .finish()
    }
}
