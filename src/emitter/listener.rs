//! Listener handles and handler traits
//!
//! Every subscription callback goes through one contract, [`Handler`]: it is
//! given the shared message and a [`Completion`] it must signal once its work
//! is done. Asynchronous work is expressed either by moving the completion
//! into a spawned task or by registering an [`AsyncHandler`], which does that
//! for you.
//!
//! A [`Listener`] is a cheap, cloneable handle around a handler. Subscriptions
//! are identified by (pattern, listener), so keep a clone of the listener if
//! you intend to remove it later.

use crate::emitter::fanout::Completion;
use crate::emitter::message::Message;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Callback-style message handler
///
/// Implemented for every `Fn(Arc<Message>, Completion)` closure.
pub trait Handler: Send + Sync {
    fn handle(&self, message: Arc<Message>, done: Completion);
}

impl<F> Handler for F
where
    F: Fn(Arc<Message>, Completion) + Send + Sync,
{
    fn handle(&self, message: Arc<Message>, done: Completion) {
        self(message, done)
    }
}

/// Async message handler, completed when `handle` returns
///
/// Requires a Tokio runtime at dispatch time.
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use mqbus::emitter::{AsyncHandler, Emitter, Listener, Message};
/// use std::sync::Arc;
///
/// struct Audit;
///
/// #[async_trait]
/// impl AsyncHandler for Audit {
///     async fn handle(&self, message: Arc<Message>) {
///         println!("audit: {}", message.topic);
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let emitter = Emitter::new();
/// emitter.on("orders/#", &Listener::from_async(Audit))?;
/// emitter.publish(Message::new("orders/42/created")).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait AsyncHandler: Send + Sync {
    async fn handle(&self, message: Arc<Message>);
}

struct AsyncAdapter<H>(Arc<H>);

impl<H> Handler for AsyncAdapter<H>
where
    H: AsyncHandler + 'static,
{
    fn handle(&self, message: Arc<Message>, done: Completion) {
        let handler = Arc::clone(&self.0);
        tokio::spawn(async move {
            handler.handle(message).await;
            done.complete();
        });
    }
}

/// Process-unique listener identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Shared handle to a registered handler
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    handler: Arc<dyn Handler>,
}

impl Listener {
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler + 'static,
    {
        Self {
            id: ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed)),
            handler: Arc::new(handler),
        }
    }

    pub fn from_async<H>(handler: H) -> Self
    where
        H: AsyncHandler + 'static,
    {
        Self::new(AsyncAdapter(Arc::new(handler)))
    }

    /// Wrap a closure returning a future; completion fires when the future resolves
    pub fn from_future_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(move |message: Arc<Message>, done: Completion| {
            let work = f(message);
            tokio::spawn(async move {
                work.await;
                done.complete();
            });
        })
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn invoke(&self, message: Arc<Message>, done: Completion) {
        self.handler.handle(message, done);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_message: Arc<Message>, done: Completion) {
        done.complete();
    }

    #[test]
    fn test_listener_identity() {
        let first = Listener::new(noop);
        let second = Listener::new(noop);

        assert_ne!(first.id(), second.id());
        assert_eq!(first, first.clone());
        assert_ne!(first, second);
    }

    #[test]
    fn test_listener_id_display() {
        let listener = Listener::new(noop);
        assert!(listener.id().to_string().starts_with("listener-"));
        assert!(format!("{:?}", listener).contains("Listener"));
    }
}
