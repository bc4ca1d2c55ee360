//! Pending request registry for one connection.
//!
//! Every request written to the socket that expects an answer lives here until
//! its response arrives, its deadline passes, or the connection goes away.
//! Entries are tagged with the kind of request they track so that responses
//! are interpreted by what was asked, not by the (overlapping) type codes.

use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::time::{delay_queue, DelayQueue};

use crate::error::{ProtocolError, Result};

/// What a pending request is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Auth,
    Command,
}

/// Completion handle of a pending request
#[derive(Debug)]
pub enum Responder {
    Auth(oneshot::Sender<Result<()>>),
    Command(oneshot::Sender<Result<String>>),
}

impl Responder {
    pub fn kind(&self) -> RequestKind {
        match self {
            Responder::Auth(_) => RequestKind::Auth,
            Responder::Command(_) => RequestKind::Command,
        }
    }
}

/// A request awaiting its response
#[derive(Debug)]
pub struct PendingRequest {
    pub request_id: i32,
    pub created_at: Instant,
    responder: Responder,
    timeout_key: delay_queue::Key,
}

impl PendingRequest {
    pub fn kind(&self) -> RequestKind {
        self.responder.kind()
    }

    /// Resolve successfully; the payload is dropped for auth requests
    pub fn succeed(self, payload: String) {
        // A dropped receiver means the caller stopped waiting; nothing to do.
        match self.responder {
            Responder::Auth(tx) => {
                let _ = tx.send(Ok(()));
            }
            Responder::Command(tx) => {
                let _ = tx.send(Ok(payload));
            }
        }
    }

    /// Resolve with an error
    pub fn fail(self, err: ProtocolError) {
        match self.responder {
            Responder::Auth(tx) => {
                let _ = tx.send(Err(err));
            }
            Responder::Command(tx) => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

/// Requests in flight on one connection, keyed by request id.
///
/// Also owns the request id counter: ids start at 1, stay positive, and skip
/// any id that is still outstanding after wrap-around.
#[derive(Debug)]
pub struct PendingRequests {
    entries: HashMap<i32, PendingRequest>,
    deadlines: DelayQueue<i32>,
    next_id: i32,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            deadlines: DelayQueue::new(),
            next_id: 1,
        }
    }

    /// Allocate the next request id
    pub fn next_request_id(&mut self) -> i32 {
        loop {
            let id = self.next_id;
            self.next_id = if self.next_id == i32::MAX {
                1
            } else {
                self.next_id + 1
            };
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    /// Track a request written under `request_id`, expiring after `timeout`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&mut self, request_id: i32, responder: Responder, timeout: Duration) {
        let timeout_key = self.deadlines.insert(request_id, timeout);
        let previous = self.entries.insert(
            request_id,
            PendingRequest {
                request_id,
                created_at: Instant::now(),
                responder,
                timeout_key,
            },
        );
        if let Some(stale) = previous {
            self.deadlines.try_remove(&stale.timeout_key);
            stale.fail(ProtocolError::ConnectionClosed);
        }
    }

    pub fn kind_of(&self, request_id: i32) -> Option<RequestKind> {
        self.entries.get(&request_id).map(PendingRequest::kind)
    }

    /// Remove a request and cancel its deadline
    pub fn take(&mut self, request_id: i32) -> Option<PendingRequest> {
        let request = self.entries.remove(&request_id)?;
        self.deadlines.try_remove(&request.timeout_key);
        Some(request)
    }

    /// Remove a request only if it is of the expected kind
    pub fn take_kind(&mut self, request_id: i32, kind: RequestKind) -> Option<PendingRequest> {
        if self.kind_of(request_id) == Some(kind) {
            self.take(request_id)
        } else {
            None
        }
    }

    /// Remove the outstanding auth request, whatever its id
    pub fn take_auth(&mut self) -> Option<PendingRequest> {
        let id = self
            .entries
            .values()
            .find(|req| req.kind() == RequestKind::Auth)
            .map(|req| req.request_id)?;
        self.take(id)
    }

    /// Wait for the next request whose deadline passed, removing it.
    ///
    /// Returns `None` immediately when nothing is pending.
    pub async fn expired(&mut self) -> Option<PendingRequest> {
        loop {
            let expired = poll_fn(|cx| self.deadlines.poll_expired(cx)).await?;
            // The key is gone once expired, so the entry must not touch the queue again.
            if let Some(request) = self.entries.remove(expired.get_ref()) {
                return Some(request);
            }
        }
    }

    /// Fail every outstanding request, choosing the error per request kind.
    ///
    /// Returns how many requests were failed.
    pub fn fail_all<F>(&mut self, mut error_for: F) -> usize
    where
        F: FnMut(RequestKind) -> ProtocolError,
    {
        self.deadlines.clear();
        let drained: Vec<PendingRequest> = self.entries.drain().map(|(_, req)| req).collect();
        let count = drained.len();
        for request in drained {
            let err = error_for(request.kind());
            request.fail(err);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
