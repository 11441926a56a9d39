//! Completion guard: fail fast instead of hanging on an unsettled future.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tracing::debug;

use crate::error::{Error, Result};

/// Race `future` against a rejection scheduled one turn later.
///
/// The returned future yields `Ok(output)` if `future` completes on its
/// first poll or on the poll right after it, and `Err(Error::NotSettled)`
/// otherwise. No timer is involved.
///
/// # Example
///
/// ```rust
/// use callstep::{assert_settled, Error};
///
/// futures::executor::block_on(async {
///     assert_eq!(assert_settled(async { 5 }).await, Ok(5));
///     assert_eq!(
///         assert_settled(futures::future::pending::<u8>()).await,
///         Err(Error::NotSettled)
///     );
/// });
/// ```
pub fn assert_settled<F: Future>(future: F) -> Settled<F> {
    Settled {
        inner: future,
        raced: false,
    }
}

pin_project! {
    /// Future returned by [`assert_settled`].
    #[must_use = "futures do nothing unless awaited"]
    pub struct Settled<F> {
        #[pin]
        inner: F,
        raced: bool,
    }
}

impl<F: Future> Future for Settled<F> {
    type Output = Result<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(output) = this.inner.poll(cx) {
            return Poll::Ready(Ok(output));
        }
        if *this.raced {
            debug!("guarded future still pending after one turn");
            return Poll::Ready(Err(Error::NotSettled));
        }
        *this.raced = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
