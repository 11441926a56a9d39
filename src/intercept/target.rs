//! Function identity and call targets.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::ledger::ErasedContext;

/// Identity of a wrapped function.
///
/// Every fn item and closure literal in Rust has its own type, so the
/// type's [`TypeId`] identifies the function. Function *pointers* share one
/// type per signature and cannot be told apart; wrap fn items or closures.
#[derive(Clone, Copy)]
pub struct FnRef {
    id: TypeId,
    name: &'static str,
}

impl FnRef {
    /// Identity of `f`.
    #[must_use]
    pub fn of<F: 'static>(_f: &F) -> Self {
        Self {
            id: TypeId::of::<F>(),
            name: type_name::<F>(),
        }
    }

    /// Type name of the function, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for FnRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FnRef {}

impl Hash for FnRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for FnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnRef({})", self.name)
    }
}

/// Free-standing async callable.
pub(crate) type Invoke<A, T, E> =
    Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Async callable taking its context as the first argument.
pub(crate) type BoundInvoke<C, A, T, E> =
    Arc<dyn Fn(Arc<C>, A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Where an intercepted call goes, fixed when the interceptor is built.
pub(crate) enum Target<C, A, T, E> {
    /// A plain function.
    Free(Invoke<A, T, E>),
    /// A function invoked against a shared context.
    Bound {
        context: Arc<C>,
        invoke: BoundInvoke<C, A, T, E>,
    },
}

impl<C, A, T, E> Target<C, A, T, E>
where
    C: Send + Sync + 'static,
{
    /// The context as recorded in the ledger; `None` for free functions.
    pub fn erased_context(&self) -> Option<ErasedContext> {
        match self {
            Self::Free(_) => None,
            Self::Bound { context, .. } => {
                let erased: ErasedContext = Arc::clone(context) as ErasedContext;
                Some(erased)
            }
        }
    }

    /// Runs the real function.
    pub fn invoke(&self, args: A) -> BoxFuture<'static, Result<T, E>> {
        match self {
            Self::Free(invoke) => invoke(args),
            Self::Bound { context, invoke } => invoke(Arc::clone(context), args),
        }
    }
}
