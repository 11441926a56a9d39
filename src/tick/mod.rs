//! Tick-by-tick execution of the code under test.
//!
//! Functions under test are spawned on a session with
//! [`Session::spawn`](crate::Session::spawn). They run up to their first
//! intercepted call immediately; each
//! [`advance_tick`](crate::Session::advance_tick) then gives every task
//! whose call was settled exactly one more poll.

mod driver;
mod task;

pub(crate) use driver::TickDriver;
pub use task::{TaskHandle, TaskId};
