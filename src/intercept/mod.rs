//! Call interception.
//!
//! - [`Intercepted`] - An async function routed through a stub session
//! - [`CallFuture`] - What an intercepted call returns
//! - [`FnRef`] - Identity of a wrapped function
//! - [`MethodTable`] - Named methods for binding by name
//!
//! The three ways of wrapping a function are fixed at wrap time:
//!
//! ```rust
//! use std::sync::Arc;
//! use callstep::{MethodTable, Session};
//!
//! struct Api;
//!
//! impl Api {
//!     async fn user(self: Arc<Self>, id: u32) -> Result<String, String> {
//!         Ok(format!("user-{id}"))
//!     }
//! }
//!
//! async fn ping(_: ()) -> Result<(), String> {
//!     Ok(())
//! }
//!
//! let session = Session::new();
//! let api = Arc::new(Api);
//! let table = MethodTable::new().with("user", Api::user);
//!
//! let free = session.call(ping);
//! let by_ref = session.call_bound(Arc::clone(&api), Api::user);
//! let by_name = session
//!     .call_method::<Api, u32, String, String>(api, &table, "user")
//!     .unwrap();
//!
//! assert!(!free.is_bound());
//! assert_eq!(by_ref.fn_ref(), by_name.fn_ref());
//! ```

mod call;
mod methods;
mod target;

pub use call::{CallFuture, Intercepted};
pub use methods::MethodTable;
pub use target::FnRef;
pub(crate) use target::{BoundInvoke, Invoke, Target};
