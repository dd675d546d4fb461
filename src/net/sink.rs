//! The transport boundary a host attaches to a [`Response`](crate::http::response::Response).
//!
//! A sink is supplied once per request, after the response object already
//! exists. Until then every write is captured by the response and replayed
//! against the sink once it is attached and a start has been requested.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use crate::error::ResponseError;
use crate::http::headers::HeaderBag;

/// One-shot completion callback for an asynchronous sink write.
///
/// Clones share the same callback; whichever clone completes first runs it and
/// the rest become no-ops.
#[derive(Clone)]
pub struct Completion(Arc<Mutex<Option<Callback>>>);

type Callback = Box<dyn FnOnce() + Send + 'static>;

impl Completion {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Arc::new(Mutex::new(Some(Box::new(f)))))
    }

    pub fn complete(self) {
        let callback = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completion")
    }
}

/// Low-level byte sink owned by exactly one response.
pub trait Sink: Send + Sync {
    /// Header commit: called exactly once, before any body chunk.
    fn commit(&self, status: &str, headers: &HeaderBag) -> std::io::Result<()>;

    /// Writes one chunk. An empty chunk is a flush request.
    ///
    /// Returns `true` when `on_complete` will be called later, `false` when the
    /// write already completed and the sink does not need to call it.
    fn write(&self, chunk: Bytes, on_complete: Option<Completion>) -> std::io::Result<bool>;

    /// Terminates the response. Called at most once.
    fn end(&self, error: Option<ResponseError>);
}

/// Request-lifetime cancellation signal shared between the host and the response.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
