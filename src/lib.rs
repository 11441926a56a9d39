//! # callstep 🪜
//!
//! > Step through an async function's side-effecting calls, one tick at a time
//!
//! **callstep** lets a test take the place of every async dependency a
//! function calls. Route those dependencies through an interceptor, start a
//! stub session, and each call lands in a ledger instead of running. The
//! test looks at the exact arguments, resolves or rejects each call, and
//! advances the function one tick at a time. No timers, no real I/O.
//!
//! ## Quick Start
//!
//! ```rust
//! use callstep::{assert_settled, Intercepted, Session};
//!
//! async fn fetch_score(player: u32) -> Result<u32, String> {
//!     unimplemented!("real network call for player {player}")
//! }
//!
//! async fn team_score(fetch: Intercepted<u32, u32, String>) -> Result<u32, String> {
//!     let captain = fetch.call(1).await?;
//!     let (a, b) = futures::try_join!(fetch.call(2), fetch.call(3))?;
//!     Ok(captain + a + b)
//! }
//!
//! let session = Session::new();
//! let fetch = session.call(fetch_score);
//!
//! futures::executor::block_on(session.with_stub(|ctx| async move {
//!     let score = ctx.spawn(team_score(fetch));
//!
//!     assert_eq!(ctx.call_count(), 1);
//!     ctx.expect_call(0)?.resolve(5u32)?;
//!     ctx.advance_tick().await;
//!
//!     assert_eq!(ctx.call_count(), 2);
//!     ctx.expect_call(0)?.resolve(10u32)?;
//!     ctx.expect_call(1)?.resolve(15u32)?;
//!     ctx.advance_tick().await;
//!
//!     assert_eq!(assert_settled(score).await?, Ok(30));
//!     Ok::<(), callstep::Error>(())
//! }))
//! .unwrap()
//! .unwrap();
//! ```
//!
//! ## Features
//!
//! - 📒 **Call Ledger** - Every intercepted call, in call order, with its arguments
//! - 🎯 **Interceptors** - Free functions, context-bound functions, methods by name
//! - ⏭️ **Ticks** - Advance the code under test exactly one turn at a time
//! - 🧹 **Sessions** - Pass-through mode is always restored, even on panic
//! - ⏱️ **Completion Guard** - Fail fast on a future nobody drove to completion

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assertions;
pub mod error;
pub mod intercept;
pub mod ledger;
pub mod session;
pub mod tick;

/// Prelude for convenient imports
///
/// ```rust
/// use callstep::prelude::*;
/// ```
pub mod prelude {
    pub use crate::assertions::{assert_settled, poll_once};
    pub use crate::error::{Error, Result};
    pub use crate::intercept::{CallFuture, FnRef, Intercepted, MethodTable};
    pub use crate::ledger::{CallId, CallRequest, InvocationSpec};
    pub use crate::session::{Mode, NestingPolicy, Session, SessionConfig, StubContext};
    pub use crate::tick::{TaskHandle, TaskId};
}

// Re-exports
pub use assertions::assert_settled;
pub use error::{Error, Result};
pub use intercept::{CallFuture, FnRef, Intercepted, MethodTable};
pub use ledger::{CallId, CallRequest, InvocationSpec};
pub use session::{
    advance_tick, call, call_at, call_bound, call_method, calls, expect_call, is_stubbed, reset,
    spawn, stub, unstub, with_stub, Mode, NestingPolicy, Session, SessionConfig, StubContext,
};
pub use tick::{TaskHandle, TaskId};

// Re-export the test macro when macros feature is enabled
#[cfg(feature = "macros")]
pub use callstep_macros::test;
