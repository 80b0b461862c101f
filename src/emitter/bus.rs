//! The emitter handle
//!
//! [`Emitter`] ties the subscription registry, the dispatch governor and the
//! lifecycle flag together. It is a cheap, cloneable handle: clones share one
//! set of subscriptions, one queue and one closed flag.

use crate::emitter::config::{EmitterBuilder, EmitterConfig};
use crate::emitter::error::{EmitterError, EmitterResult};
use crate::emitter::fanout::{self, Dispatch};
use crate::emitter::governor::{EmitCallback, Governor, PendingEntry, Rejected};
use crate::emitter::listener::Listener;
use crate::emitter::message::Message;
use crate::emitter::registry::SubscriptionRegistry;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

pub(crate) struct EmitterInner {
    config: EmitterConfig,
    registry: SubscriptionRegistry,
    governor: Governor,
    closed: AtomicBool,
}

impl EmitterInner {
    fn start(self: &Arc<Self>, entry: PendingEntry) {
        let listeners = self.registry.matches(&entry.message.topic);
        log::trace!(
            "Dispatching '{}' to {} listener(s)",
            entry.message.topic,
            listeners.len()
        );
        fanout::run(Dispatch::new(entry, Arc::clone(self)), listeners);
    }

    /// Give back the slot of a finished dispatch
    pub(crate) fn release(self: &Arc<Self>) {
        self.governor.release(|entry| self.start(entry));
    }
}

/// Topic-based in-process message bus
///
/// ```rust
/// use mqbus::emitter::{Completion, Emitter, Listener, Message};
/// use std::sync::Arc;
///
/// let emitter = Emitter::new();
/// let listener = Listener::new(|message: Arc<Message>, done: Completion| {
///     println!("got {}", message.topic);
///     done.complete();
/// });
///
/// emitter.on("hello/+", &listener).unwrap();
/// emitter.emit(Message::new("hello/world")).unwrap();
/// ```
#[derive(Clone)]
pub struct Emitter {
    inner: Arc<EmitterInner>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::from_config(EmitterConfig::default())
    }
}

impl Emitter {
    /// Emitter with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EmitterConfig) -> EmitterResult<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    pub fn builder() -> EmitterBuilder {
        EmitterBuilder::new()
    }

    fn from_config(config: EmitterConfig) -> Self {
        if config.is_bounded() {
            log::debug!("Creating emitter with concurrency {}", config.concurrency);
        } else {
            log::debug!("Creating emitter with unbounded concurrency");
        }

        Self {
            inner: Arc::new(EmitterInner {
                registry: SubscriptionRegistry::new(&config),
                governor: Governor::new(&config),
                closed: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Subscribe `listener` to every topic matching `pattern`
    pub fn on(&self, pattern: &str, listener: &Listener) -> EmitterResult<()> {
        self.inner.registry.add(pattern, listener)
    }

    /// Subscribe, then call `done` on a later scheduling turn
    pub fn on_then<F>(&self, pattern: &str, listener: &Listener, done: F) -> EmitterResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.on(pattern, listener)?;
        schedule(done);
        Ok(())
    }

    /// Remove one subscription; unknown subscriptions are ignored
    pub fn remove_listener(&self, pattern: &str, listener: &Listener) -> EmitterResult<()> {
        self.inner.registry.remove(pattern, listener)
    }

    pub fn remove_listener_then<F>(
        &self,
        pattern: &str,
        listener: &Listener,
        done: F,
    ) -> EmitterResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.remove_listener(pattern, listener)?;
        schedule(done);
        Ok(())
    }

    /// Remove every listener subscribed to exactly `pattern`
    pub fn remove_all_listeners(&self, pattern: &str) -> EmitterResult<()> {
        self.inner.registry.remove_all(pattern)
    }

    pub fn remove_all_listeners_then<F>(&self, pattern: &str, done: F) -> EmitterResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.remove_all_listeners(pattern)?;
        schedule(done);
        Ok(())
    }

    fn admit(&self, message: Message, callback: Option<EmitCallback>) -> Result<(), Rejected> {
        let entry = PendingEntry::new(Arc::new(message), callback);

        if self.is_closed() {
            return Err(Rejected {
                error: EmitterError::Closed,
                entry,
            });
        }

        self.inner
            .governor
            .submit(entry, |entry| self.inner.start(entry))
    }

    /// Dispatch a message, or queue it while every slot is busy
    ///
    /// Returns once the message is admitted; listeners may still be running.
    pub fn emit(&self, message: Message) -> EmitterResult<()> {
        self.admit(message, None).map_err(|rejected| rejected.error)
    }

    /// Dispatch a message and report its outcome to `callback`
    ///
    /// The callback receives `Ok(())` once every matched listener has
    /// completed. Rejections (closed emitter, full queue) are reported to the
    /// callback before this returns.
    pub fn emit_then<F>(&self, message: Message, callback: F)
    where
        F: FnOnce(EmitterResult<()>) + Send + 'static,
    {
        if let Err(Rejected { error, entry }) = self.admit(message, Some(Box::new(callback))) {
            log::debug!("Rejected '{}': {}", entry.message.topic, error);
            entry.resolve(Err(error));
        }
    }

    /// Dispatch a message and wait for every matched listener to complete
    pub async fn publish(&self, message: Message) -> EmitterResult<()> {
        let topic = message.topic.clone();
        let (tx, rx) = oneshot::channel();

        self.emit_then(message, move |result| {
            let _ = tx.send(result);
        });

        rx.await
            .unwrap_or_else(|_| Err(EmitterError::Abandoned { topic }))
    }

    fn mark_closed(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            log::debug!("Emitter already closed");
            return;
        }
        log::info!(
            "Emitter closed ({} in flight, {} pending)",
            self.current(),
            self.length()
        );
    }

    /// Stop accepting messages
    ///
    /// In-flight and queued dispatches run to completion. Closing twice is
    /// harmless.
    pub async fn close(&self) {
        self.mark_closed();
        tokio::task::yield_now().await;
    }

    /// Stop accepting messages, then call `done` on a later scheduling turn
    pub fn close_then<F>(&self, done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.mark_closed();
        schedule(done);
    }

    /// Number of dispatches in flight
    pub fn current(&self) -> usize {
        self.inner.governor.current()
    }

    /// Number of messages waiting for a dispatch slot
    pub fn length(&self) -> usize {
        self.inner.governor.length()
    }

    pub fn concurrency(&self) -> usize {
        self.inner.governor.concurrency()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of (pattern, listener) subscriptions
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Effective configuration, defaults included
    pub fn config(&self) -> &EmitterConfig {
        &self.inner.config
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("concurrency", &self.concurrency())
            .field("current", &self.current())
            .field("length", &self.length())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Run `callback` on a later turn of the ambient runtime
///
/// Without a Tokio runtime a short-lived thread is used instead.
fn schedule<F>(callback: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { callback() });
        }
        Err(_) => {
            std::thread::spawn(callback);
        }
    }
}
