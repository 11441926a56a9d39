//! Single-poll helpers for inspecting futures without an executor.
//!
//! - [`poll_once`] - Poll a future once in place
//! - [`assert_ready!`] - Assert a future is ready on its next poll
//! - [`assert_pending!`] - Assert a future is still waiting
//! - [`yield_turn`] - Give the executor exactly one turn

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Poll a future once, in place, with a no-op waker.
///
/// The future is borrowed, so it can be polled again later, for example
/// after resolving the call it waits on.
///
/// # Example
///
/// ```rust
/// use callstep::assertions::poll_once;
/// use std::task::Poll;
///
/// let mut ready = std::future::ready(42);
/// assert_eq!(poll_once(&mut ready), Poll::Ready(42));
/// ```
pub fn poll_once<F>(future: &mut F) -> Poll<F::Output>
where
    F: Future + Unpin + ?Sized,
{
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    Pin::new(future).poll(&mut cx)
}

/// Assert that a future is ready on its next poll and return its output.
///
/// # Panics
///
/// Panics if the future returns `Poll::Pending`.
///
/// # Example
///
/// ```rust
/// use callstep::assert_ready;
///
/// let mut fut = std::future::ready(7);
/// assert_eq!(assert_ready!(fut), 7);
/// ```
#[macro_export]
macro_rules! assert_ready {
    ($future:expr) => {{
        match $crate::assertions::poll_once(&mut $future) {
            ::std::task::Poll::Ready(value) => value,
            ::std::task::Poll::Pending => {
                panic!("assertion failed: expected future to be Ready, but it was Pending");
            }
        }
    }};
    ($future:expr, $($arg:tt)+) => {{
        match $crate::assertions::poll_once(&mut $future) {
            ::std::task::Poll::Ready(value) => value,
            ::std::task::Poll::Pending => {
                panic!(
                    "assertion failed: expected future to be Ready, but it was Pending: {}",
                    format_args!($($arg)+)
                );
            }
        }
    }};
}

/// Assert that a future is still pending.
///
/// # Panics
///
/// Panics if the future returns `Poll::Ready`.
///
/// # Example
///
/// ```rust
/// use callstep::assert_pending;
///
/// let mut never = futures::future::pending::<u8>();
/// assert_pending!(never);
/// ```
#[macro_export]
macro_rules! assert_pending {
    ($future:expr) => {{
        if let ::std::task::Poll::Ready(value) = $crate::assertions::poll_once(&mut $future) {
            panic!(
                "assertion failed: expected future to be Pending, but it was Ready({:?})",
                value
            );
        }
    }};
    ($future:expr, $($arg:tt)+) => {{
        if let ::std::task::Poll::Ready(value) = $crate::assertions::poll_once(&mut $future) {
            panic!(
                "assertion failed: expected future to be Pending, but it was Ready({:?}): {}",
                value,
                format_args!($($arg)+)
            );
        }
    }};
}

/// Returns a future that is pending exactly once, waking itself.
///
/// Awaiting it hands control back to whatever executor runs the caller
/// for one turn.
pub fn yield_turn() -> YieldTurn {
    YieldTurn { yielded: false }
}

/// Future returned by [`yield_turn`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldTurn {
    yielded: bool,
}

impl Future for YieldTurn {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
