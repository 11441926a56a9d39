//! Assertions for futures driven by a stub session.
//!
//! - [`assert_settled`] - Fail fast when a future was never driven to completion
//! - [`assert_ready!`] - Assert a future is ready on its next poll
//! - [`assert_pending!`] - Assert a future is still waiting
//! - [`poll_once`] - Poll a future once, in place
//!
//! # Example
//!
//! ```rust
//! use callstep::{assert_pending, Session};
//!
//! async fn fetch(id: u32) -> Result<u32, String> {
//!     Ok(id)
//! }
//!
//! let session = Session::new();
//! session.stub().unwrap();
//!
//! let fetch = session.call(fetch);
//! let mut pending = fetch.call(1);
//! assert_pending!(pending);
//! ```

mod future;
mod settled;

pub use future::{poll_once, yield_turn, YieldTurn};
pub use settled::{assert_settled, Settled};
