//! Dispatch governor
//!
//! Bounds the number of dispatches in flight and holds back-pressured
//! messages in a FIFO. The in-flight counter and the FIFO sit behind one mutex
//! so admission and release never interleave into an inconsistent state.
//!
//! Every admitted entry goes through the FIFO and is started by a drain loop
//! on the thread that admitted or released it. A thread runs at most one
//! drain loop per governor: an emit or release issued from a listener or
//! callback on that loop's stack only queues its work, and the loop picks it
//! up once the current start returns. A long run of listeners that complete
//! synchronously is therefore drained by iteration rather than recursion.
//! Other threads are never held up by a running loop; they start whatever
//! the free slots allow on their own stack.

use crate::core::sync::recover_mutex;
use crate::emitter::config::EmitterConfig;
use crate::emitter::error::{EmitterError, EmitterResult};
use crate::emitter::message::Message;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_GOVERNOR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // governors with a drain loop on this thread's stack
    static DRAINING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks a governor as draining on the current thread until dropped
struct DrainMarker {
    governor: u64,
}

impl DrainMarker {
    fn enter(governor: u64) -> Option<Self> {
        DRAINING.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&governor) {
                return None;
            }
            active.push(governor);
            Some(Self { governor })
        })
    }
}

impl Drop for DrainMarker {
    fn drop(&mut self) {
        // also runs while a panicking listener unwinds the loop
        let _ = DRAINING.try_with(|active| {
            active.borrow_mut().retain(|governor| *governor != self.governor);
        });
    }
}

/// Callback invoked once a message has been fully dispatched, or rejected
pub type EmitCallback = Box<dyn FnOnce(EmitterResult<()>) + Send>;

/// A message waiting for, or holding, a dispatch slot
pub(crate) struct PendingEntry {
    pub message: Arc<Message>,
    pub callback: Option<EmitCallback>,
}

impl PendingEntry {
    pub fn new(message: Arc<Message>, callback: Option<EmitCallback>) -> Self {
        Self { message, callback }
    }

    /// Hand `result` to the callback, if there is one
    pub fn resolve(self, result: EmitterResult<()>) {
        if let Some(callback) = self.callback {
            callback(result);
        }
    }
}

/// An entry turned away by the governor, returned so its callback can be told
pub(crate) struct Rejected {
    pub error: EmitterError,
    pub entry: PendingEntry,
}

#[derive(Default)]
struct GovernorState {
    current: usize,
    pending: VecDeque<PendingEntry>,
    leak_reported: bool,
}

pub(crate) struct Governor {
    id: u64,
    concurrency: usize,
    max_queue_length: Option<usize>,
    leak_warning_threshold: usize,
    state: Mutex<GovernorState>,
}

impl Governor {
    pub fn new(config: &EmitterConfig) -> Self {
        Self {
            id: NEXT_GOVERNOR_ID.fetch_add(1, Ordering::Relaxed),
            concurrency: config.concurrency,
            max_queue_length: config.max_queue_length,
            leak_warning_threshold: config.leak_warning_threshold,
            state: Mutex::new(GovernorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GovernorState> {
        recover_mutex(self.state.lock(), "dispatch governor")
    }

    fn has_capacity(&self, current: usize) -> bool {
        self.concurrency == 0 || current < self.concurrency
    }

    /// Admit an entry, starting it now if a slot is free
    ///
    /// `start` is called with every entry that gets a slot during this call,
    /// which may include entries queued earlier.
    pub fn submit<F>(&self, entry: PendingEntry, start: F) -> Result<(), Rejected>
    where
        F: FnMut(PendingEntry),
    {
        let mut state = self.lock();

        if !self.has_capacity(state.current) {
            if let Some(max_length) = self.max_queue_length {
                if state.pending.len() >= max_length {
                    return Err(Rejected {
                        error: EmitterError::QueueFull { max_length },
                        entry,
                    });
                }
            }
        }

        log::trace!(
            "Admitting '{}' ({} in flight, {} pending)",
            entry.message.topic,
            state.current,
            state.pending.len()
        );
        state.pending.push_back(entry);

        if !self.has_capacity(state.current) {
            self.check_leak(&mut state);
        }

        self.drain(state, start);
        Ok(())
    }

    /// Free the slot held by a finished dispatch and start queued entries
    pub fn release<F>(&self, start: F)
    where
        F: FnMut(PendingEntry),
    {
        let mut state = self.lock();
        // a slot is only ever released by the dispatch that took it
        state.current = state.current.saturating_sub(1);
        self.drain(state, start);
    }

    fn drain<'a, F>(&'a self, mut state: MutexGuard<'a, GovernorState>, mut start: F)
    where
        F: FnMut(PendingEntry),
    {
        let Some(_marker) = DrainMarker::enter(self.id) else {
            return;
        };

        while self.has_capacity(state.current) {
            let Some(entry) = state.pending.pop_front() else {
                break;
            };
            state.current += 1;
            drop(state);
            start(entry);
            state = self.lock();
        }

        if state.pending.is_empty() {
            state.leak_reported = false;
        }
    }

    fn check_leak(&self, state: &mut GovernorState) {
        if self.leak_warning_threshold == 0
            || state.leak_reported
            || state.pending.len() < self.leak_warning_threshold
        {
            return;
        }

        state.leak_reported = true;
        log::warn!(
            "MqBus leak detected: {} messages pending while all {} dispatch slots are held; \
             a listener may never be signalling completion",
            state.pending.len(),
            self.concurrency
        );
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn current(&self) -> usize {
        self.lock().current
    }

    pub fn length(&self) -> usize {
        self.lock().pending.len()
    }

    #[cfg(test)]
    fn leak_reported(&self) -> bool {
        self.lock().leak_reported
    }
}
