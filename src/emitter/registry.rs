//! Subscription registry
//!
//! Owns the topic matcher behind a read/write lock. Lookups hand back a
//! snapshot of listener handles, so a listener may subscribe or unsubscribe
//! (itself included) while it is being dispatched to.

use crate::core::sync::{handle_rwlock_write, recover_read};
use crate::emitter::config::EmitterConfig;
use crate::emitter::error::{EmitterError, EmitterResult};
use crate::emitter::listener::Listener;
use crate::emitter::matcher::TopicMatcher;
use std::sync::RwLock;

#[derive(Debug)]
pub struct SubscriptionRegistry {
    matcher: RwLock<TopicMatcher>,
}

impl SubscriptionRegistry {
    pub fn new(config: &EmitterConfig) -> Self {
        Self {
            matcher: RwLock::new(TopicMatcher::new(config)),
        }
    }

    pub fn add(&self, pattern: &str, listener: &Listener) -> EmitterResult<()> {
        let added = handle_rwlock_write(self.matcher.write(), EmitterError::internal)?
            .add(pattern, listener)?;

        if added {
            log::debug!("Subscribed {} to '{}'", listener.id(), pattern);
        } else {
            log::debug!("{} already subscribed to '{}'", listener.id(), pattern);
        }
        Ok(())
    }

    pub fn remove(&self, pattern: &str, listener: &Listener) -> EmitterResult<()> {
        let removed = handle_rwlock_write(self.matcher.write(), EmitterError::internal)?
            .remove(pattern, Some(listener))?;

        if removed > 0 {
            log::debug!("Unsubscribed {} from '{}'", listener.id(), pattern);
        }
        Ok(())
    }

    pub fn remove_all(&self, pattern: &str) -> EmitterResult<()> {
        let removed = handle_rwlock_write(self.matcher.write(), EmitterError::internal)?
            .remove(pattern, None)?;

        log::debug!("Removed {} listener(s) from '{}'", removed, pattern);
        Ok(())
    }

    pub fn matches(&self, topic: &str) -> Vec<Listener> {
        recover_read(self.matcher.read(), "subscription lookup").matches(topic)
    }

    pub fn len(&self) -> usize {
        recover_read(self.matcher.read(), "subscription count").len()
    }

    pub fn is_empty(&self) -> bool {
        recover_read(self.matcher.read(), "subscription count").is_empty()
    }
}
