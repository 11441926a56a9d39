//! Name-based method lookup for bound interceptors.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;

use super::target::{BoundInvoke, FnRef};
use crate::error::{Error, Result};

/// A table of named async methods callable against a context `C`.
///
/// Lets a test bind an interceptor by method name. The name is resolved
/// once, when the interceptor is built, and the recorded [`FnRef`] is the
/// registered function's identity, so `call_method(ctx, &table, "fetch")`
/// and `call_bound(ctx, Api::fetch)` record the same function.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use callstep::MethodTable;
///
/// struct Api;
///
/// impl Api {
///     async fn fetch(self: Arc<Self>, id: u32) -> Result<u32, String> {
///         Ok(id)
///     }
/// }
///
/// let table = MethodTable::<Api>::new().with("fetch", Api::fetch);
/// assert!(table.contains("fetch"));
/// ```
pub struct MethodTable<C> {
    methods: HashMap<String, Entry>,
    _context: PhantomData<fn(Arc<C>)>,
}

struct Entry {
    signature: &'static str,
    method: Box<dyn Any + Send + Sync>,
}

pub(crate) struct Method<C, A, T, E> {
    pub fn_ref: FnRef,
    pub invoke: BoundInvoke<C, A, T, E>,
}

impl<C: Send + Sync + 'static> MethodTable<C> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            _context: PhantomData,
        }
    }

    /// Registers `f` under `name`, replacing any previous entry.
    pub fn register<F, Fut, A, T, E>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Arc<C>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        A: 'static,
        T: 'static,
        E: 'static,
    {
        let method = Method::<C, A, T, E> {
            fn_ref: FnRef::of(&f),
            invoke: Arc::new(move |ctx, args| f(ctx, args).boxed()),
        };
        self.methods.insert(
            name.into(),
            Entry {
                signature: signature::<A, T, E>(),
                method: Box::new(method),
            },
        );
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<F, Fut, A, T, E>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<C>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        A: 'static,
        T: 'static,
        E: 'static,
    {
        self.register(name, f);
        self
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub(crate) fn resolve<A, T, E>(&self, name: &str) -> Result<(FnRef, BoundInvoke<C, A, T, E>)>
    where
        A: 'static,
        T: 'static,
        E: 'static,
    {
        let entry = self
            .methods
            .get(name)
            .ok_or_else(|| Error::unknown_method(name))?;
        let method = entry
            .method
            .downcast_ref::<Method<C, A, T, E>>()
            .ok_or(Error::TypeMismatch {
                expected: entry.signature,
                found: signature::<A, T, E>(),
            })?;
        Ok((method.fn_ref, Arc::clone(&method.invoke)))
    }
}

fn signature<A, T, E>() -> &'static str {
    type_name::<fn(A) -> std::result::Result<T, E>>()
}

impl<C: Send + Sync + 'static> Default for MethodTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for MethodTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("MethodTable").field("methods", &names).finish()
    }
}
