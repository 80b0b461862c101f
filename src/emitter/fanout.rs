//! Fan-out completion tracking
//!
//! One [`Dispatch`] exists per admitted message. It is finished exactly once,
//! after every matched listener has signalled its [`Completion`]: the emit
//! callback runs first, then the dispatch slot is released.
//!
//! A single matched listener receives a completion that owns the dispatch
//! outright. Two or more share a countdown that lives only as long as this
//! one dispatch.

use crate::core::sync::recover_mutex;
use crate::emitter::bus::EmitterInner;
use crate::emitter::governor::PendingEntry;
use crate::emitter::listener::Listener;
use crate::emitter::message::Message;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) struct Dispatch {
    entry: PendingEntry,
    emitter: Arc<EmitterInner>,
}

impl Dispatch {
    pub fn new(entry: PendingEntry, emitter: Arc<EmitterInner>) -> Self {
        Self { entry, emitter }
    }

    fn finish(self) {
        let Dispatch { entry, emitter } = self;
        log::trace!("Dispatch of '{}' complete", entry.message.topic);
        entry.resolve(Ok(()));
        emitter.release();
    }
}

struct FanOut {
    remaining: AtomicUsize,
    dispatch: Mutex<Option<Dispatch>>,
}

impl FanOut {
    fn signal(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let dispatch = recover_mutex(self.dispatch.lock(), "fan-out completion").take();
        if let Some(dispatch) = dispatch {
            dispatch.finish();
        }
    }
}

enum Slot {
    Single(Dispatch),
    Shared(Arc<FanOut>),
}

/// Completion signal handed to a listener for one dispatched message
///
/// Call [`Completion::complete`] when the listener is done with the message.
/// Until every listener matched for a message has done so, the message keeps
/// its dispatch slot and its emit callback does not run. Dropping a
/// completion without signalling it leaves the slot held for good.
#[must_use = "the dispatch slot stays held until the completion is signalled"]
pub struct Completion {
    message: Arc<Message>,
    slot: Option<Slot>,
}

impl Completion {
    fn new(message: Arc<Message>, slot: Slot) -> Self {
        Self {
            message,
            slot: Some(slot),
        }
    }

    /// Topic of the message this completion belongs to
    pub fn topic(&self) -> &str {
        &self.message.topic
    }

    /// Signal that this listener has finished with the message
    pub fn complete(mut self) {
        match self.slot.take() {
            Some(Slot::Single(dispatch)) => dispatch.finish(),
            Some(Slot::Shared(fanout)) => fanout.signal(),
            None => {}
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.slot.is_some() {
            log::warn!(
                "Completion for '{}' dropped without being signalled; its dispatch slot will not be released",
                self.message.topic
            );
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("topic", &self.message.topic)
            .field("pending", &self.slot.is_some())
            .finish()
    }
}

/// Invoke every matched listener for one dispatch
pub(crate) fn run(dispatch: Dispatch, listeners: Vec<Listener>) {
    let message = Arc::clone(&dispatch.entry.message);

    match listeners.as_slice() {
        [] => dispatch.finish(),
        [listener] => {
            let done = Completion::new(Arc::clone(&message), Slot::Single(dispatch));
            listener.invoke(message, done);
        }
        many => {
            let fanout = Arc::new(FanOut {
                remaining: AtomicUsize::new(many.len()),
                dispatch: Mutex::new(Some(dispatch)),
            });
            for listener in many {
                let done = Completion::new(Arc::clone(&message), Slot::Shared(Arc::clone(&fanout)));
                listener.invoke(Arc::clone(&message), done);
            }
        }
    }
}
