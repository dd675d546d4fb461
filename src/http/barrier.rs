//! Ordered continuation queue gating everything that must wait for the header
//! commit.
//!
//! Before the barrier fires, submitted continuations are queued. Firing is a
//! one-time transition: the firing thread marks the barrier as draining under
//! the lock, then repeatedly takes the queue and runs it outside the lock
//! until nothing is left. Continuations submitted while a drain is in progress
//! join the queue and are run by the draining thread, which keeps submission
//! order intact. Once the drain finishes, submissions are handed straight back
//! to the caller to run inline.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::ResponseError;
use crate::http::response::Response;

/// Deferred unit of work recorded before the sink exists.
pub(crate) type Continuation =
    Box<dyn FnOnce(&Response) -> Result<(), ResponseError> + Send + 'static>;

#[derive(Default)]
struct BarrierState {
    queue: VecDeque<Continuation>,
    fired: bool,
    draining: bool,
}

#[derive(Default)]
pub(crate) struct StartBarrier {
    state: Mutex<BarrierState>,
}

impl fmt::Debug for StartBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("StartBarrier")
            .field("queued", &state.queue.len())
            .field("fired", &state.fired)
            .field("draining", &state.draining)
            .finish()
    }
}

impl StartBarrier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once the drain has completed and new work may bypass the queue.
    pub(crate) fn is_open(&self) -> bool {
        let state = self.lock();
        state.fired && !state.draining
    }

    pub(crate) fn has_fired(&self) -> bool {
        self.lock().fired
    }

    /// Queues `continuation`, or gives it back when the barrier is open so the
    /// caller runs it outside the lock.
    pub(crate) fn submit(&self, continuation: Continuation) -> Option<Continuation> {
        let mut state = self.lock();
        if state.fired && !state.draining {
            return Some(continuation);
        }
        state.queue.push_back(continuation);
        None
    }

    /// Marks the barrier as fired. Returns false when another caller already
    /// won; the winner must follow up with [`drain`](Self::drain).
    pub(crate) fn try_fire(&self) -> bool {
        let mut state = self.lock();
        if state.fired {
            return false;
        }
        state.fired = true;
        state.draining = true;
        true
    }

    /// Runs queued continuations in order until the queue stays empty. Only the
    /// thread that won [`try_fire`](Self::try_fire) calls this.
    pub(crate) fn drain<F>(&self, mut run: F) -> usize
    where
        F: FnMut(Continuation),
    {
        let mut ran = 0;
        loop {
            let batch = {
                let mut state = self.lock();
                if state.queue.is_empty() {
                    state.draining = false;
                    return ran;
                }
                std::mem::take(&mut state.queue)
            };
            for continuation in batch {
                run(continuation);
                ran += 1;
            }
        }
    }
}
