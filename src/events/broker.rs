// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generic in-memory publish/subscribe broker
//!
//! Handlers are registered per event type. `publish` copies the handler list
//! under a read lock, releases it, and spawns every handler as its own tokio
//! task, so a slow handler never holds up the publisher or other handlers.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name of a class of events
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    pub const STREAM: EventType = EventType(Cow::Borrowed("stream"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle returned by [`Broker::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Generic publish/subscribe broker
pub struct Broker<T> {
    subscribers: RwLock<HashMap<EventType, Vec<(SubscriptionId, Handler<T>)>>>,
    next_id: AtomicU64,
}

impl<T> Broker<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `event_type`.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write()
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, event_type: &EventType, id: SubscriptionId) -> bool {
        let mut subscribers = self.write();
        let Some(handlers) = subscribers.get_mut(event_type) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            subscribers.remove(event_type);
        }
        removed
    }

    /// Deliver `payload` to every handler of `event_type` without waiting for
    /// them. Must be called from within a tokio runtime.
    pub fn publish(&self, event_type: &EventType, payload: T) {
        let handlers: Vec<Handler<T>> = match self.read().get(event_type) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return,
        };

        for handler in handlers {
            let payload = payload.clone();
            tokio::spawn(async move {
                handler(payload);
            });
        }
    }

    /// Number of handlers registered for `event_type`.
    pub fn subscriber_count(&self, event_type: &EventType) -> usize {
        self.read().get(event_type).map_or(0, Vec::len)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<EventType, Vec<(SubscriptionId, Handler<T>)>>> {
        match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Broker subscriber lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<EventType, Vec<(SubscriptionId, Handler<T>)>>> {
        match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Broker subscriber lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl<T> Default for Broker<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Broker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = match self.subscribers.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        f.debug_struct("Broker")
            .field("event_types", &types)
            .finish()
    }
}
