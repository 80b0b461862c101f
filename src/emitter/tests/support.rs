//! Shared listener fixtures for the emitter test suites

use crate::emitter::{Completion, Listener, Message};
use std::sync::{Arc, Mutex};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Listener that records each topic it sees and completes immediately
pub fn recorder(log: &Log) -> Listener {
    let sink = Arc::clone(log);
    Listener::new(move |message: Arc<Message>, done: Completion| {
        sink.lock().unwrap().push(message.topic.clone());
        done.complete();
    })
}

/// Listener that holds on to every completion it is given
pub fn parking() -> (Listener, Arc<Mutex<Vec<Completion>>>) {
    let parked = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&parked);
    let listener = Listener::new(move |_message: Arc<Message>, done: Completion| {
        sink.lock().unwrap().push(done);
    });
    (listener, parked)
}

/// Complete the oldest parked completion
pub fn complete_next(parked: &Arc<Mutex<Vec<Completion>>>) {
    let done = parked.lock().unwrap().remove(0);
    done.complete();
}
