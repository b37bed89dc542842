// crates/fabric/src/fabric.rs
//! MessageFabric - typed fan-out of events to independent handlers

use futures::future::BoxFuture;
use futures::FutureExt;
use hive_common::{Event, EventType};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A subscriber callback. Receives a shared, immutable event.
pub type Handler = Arc<dyn Fn(Arc<Event>) -> HandlerFuture + Send + Sync>;

/// Returned by `subscribe`; pass it to `unsubscribe` to stop delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Counters since the fabric was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FabricStats {
    pub published: u64,
    pub scheduled: u64,
    pub faults: u64,
}

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

struct Inner {
    subscribers: RwLock<HashMap<EventType, Vec<Subscription>>>,
    history: Option<Mutex<VecDeque<Event>>>,
    history_limit: usize,
    next_id: AtomicU64,
    published: AtomicU64,
    scheduled: AtomicU64,
    faults: AtomicU64,
}

/// In-process publish/subscribe keyed by event type.
///
/// `publish` returns as soon as every handler has been scheduled; handlers run
/// concurrently on the tokio runtime and a handler that errors or panics is
/// logged without affecting the publisher or its siblings. There is no
/// ordering guarantee between handlers, nor between events.
///
/// Cloning yields another handle to the same fabric.
#[derive(Clone)]
pub struct MessageFabric {
    inner: Arc<Inner>,
}

impl Default for MessageFabric {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageFabric {
    /// Create a fabric without history.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a fabric that keeps the last `limit` published events.
    pub fn with_history(limit: usize) -> Self {
        Self::build(Some(limit))
    }

    fn build(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                history: limit.map(|l| Mutex::new(VecDeque::with_capacity(l.min(1024)))),
                history_limit: limit.unwrap_or(0),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                scheduled: AtomicU64::new(0),
                faults: AtomicU64::new(0),
            }),
        }
    }

    /// Register `handler` for every future event of `event_type`.
    pub fn subscribe<F, Fut>(&self, event_type: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event: Arc<Event>| handler(event).boxed());
        self.subscribe_handler(event_type, handler)
    }

    pub fn subscribe_handler(&self, event_type: EventType, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .write()
            .entry(event_type)
            .or_default()
            .push(Subscription { id, handler });
        debug!(%event_type, subscription = id.0, "handler subscribed");
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        for handlers in subscribers.values_mut() {
            if let Some(pos) = handlers.iter().position(|s| s.id == id) {
                handlers.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.inner
            .subscribers
            .read()
            .get(&event_type)
            .map_or(0, Vec::len)
    }

    /// Record `event` and schedule one task per current subscriber of its type.
    ///
    /// Never blocks on handler execution. Returns how many handlers were
    /// scheduled, which is zero when called outside a tokio runtime.
    pub fn publish(&self, event: Event) -> usize {
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let Ok(runtime) = Handle::try_current() else {
            warn!(event_type = %event.event_type, "publish outside a runtime; event dropped");
            return 0;
        };

        if let Some(history) = &self.inner.history {
            let mut h = history.lock();
            if h.len() >= self.inner.history_limit {
                h.pop_front();
            }
            if self.inner.history_limit > 0 {
                h.push_back(event.clone());
            }
        }

        // Snapshot under the read lock, run outside it.
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .read()
            .get(&event.event_type)
            .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            return 0;
        }

        let event = Arc::new(event);
        for handler in &handlers {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            let inner = Arc::clone(&self.inner);
            runtime.spawn(async move {
                let event_type = event.event_type;
                let event_id = event.id;
                match AssertUnwindSafe(handler(event)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        inner.faults.fetch_add(1, Ordering::Relaxed);
                        error!(%event_type, %event_id, error = %e, "event handler failed");
                    }
                    Err(panic) => {
                        inner.faults.fetch_add(1, Ordering::Relaxed);
                        error!(
                            %event_type,
                            %event_id,
                            panic = %panic_message(&*panic),
                            "event handler panicked"
                        );
                    }
                }
            });
        }

        let scheduled = handlers.len();
        self.inner
            .scheduled
            .fetch_add(scheduled as u64, Ordering::Relaxed);
        scheduled
    }

    /// Snapshot of retained events, oldest first. Empty when history is off.
    pub fn history(&self) -> Vec<Event> {
        self.inner
            .history
            .as_ref()
            .map(|h| h.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> FabricStats {
        FabricStats {
            published: self.inner.published.load(Ordering::Relaxed),
            scheduled: self.inner.scheduled.load(Ordering::Relaxed),
            faults: self.inner.faults.load(Ordering::Relaxed),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
