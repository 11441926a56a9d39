//! The call ledger: an ordered, tick-scoped record of intercepted calls.
//!
//! - [`CallRequest`] - one intercepted call plus its settle handle
//! - [`InvocationSpec`] - the function, arguments and optional context
//! - [`CallId`] - session-unique request identifier
//!
//! Entries stay in the ledger after they are settled; only a tick boundary
//! or a session reset removes them.

mod request;

use std::fmt;

pub use request::{CallRequest, InvocationSpec};
pub(crate) use request::{ErasedContext, Producer, Settle};

use crate::error::{Error, Result};
use crate::intercept::FnRef;

/// Unique identifier for a recorded call within one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId(u64);

impl CallId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Call({})", self.0)
    }
}

/// Insertion-ordered call record.
#[derive(Default)]
pub(crate) struct Ledger {
    entries: Vec<CallRequest>,
    next_id: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request and returns a handle to it.
    pub fn record(&mut self, invocation: InvocationSpec, producer: Box<dyn Settle>) -> CallRequest {
        let id = CallId::new(self.next_id);
        self.next_id += 1;
        let request = CallRequest::new(id, invocation, producer);
        self.entries.push(request.clone());
        request
    }

    pub fn snapshot(&self) -> Vec<CallRequest> {
        self.entries.clone()
    }

    pub fn get(&self, index: usize) -> Option<CallRequest> {
        self.entries.get(index).cloned()
    }

    pub fn expect(&self, index: usize) -> Result<CallRequest> {
        self.get(index).ok_or(Error::NoSuchCall {
            index,
            len: self.entries.len(),
        })
    }

    pub fn calls_to(&self, fn_ref: FnRef) -> Vec<CallRequest> {
        self.entries
            .iter()
            .filter(|req| req.invocation().fn_ref() == fn_ref)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Empties the ledger, handing back what was in it.
    ///
    /// Call ids keep counting across clears.
    pub fn clear(&mut self) -> Vec<CallRequest> {
        std::mem::take(&mut self.entries)
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
