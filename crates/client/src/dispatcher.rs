//! Event dispatch
//!
//! Ordered per-event handler lists. Dispatch runs handlers sequentially
//! in registration order; a failing handler is logged and the rest
//! still run. Each client instance owns its own dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

/// Async handler invoked with the event payload.
pub type EventHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Async callback invoked on connect/disconnect.
pub type LifecycleCallback = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as an [`EventHandler`].
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// Wrap an async closure as a [`LifecycleCallback`].
pub fn callback<F, Fut>(f: F) -> LifecycleCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

#[derive(Default)]
pub(crate) struct EventDispatcher {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl EventDispatcher {
    /// Append a handler to the event's list. Duplicates are allowed.
    pub fn register(&self, event: &str, handler: EventHandler) {
        self.handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove the first matching registration of this handler, if any.
    pub fn unregister(&self, event: &str, handler: &EventHandler) {
        let mut handlers = self.handlers.lock();
        if let Some(list) = handlers.get_mut(event)
            && let Some(pos) = list.iter().position(|h| Arc::ptr_eq(h, handler))
        {
            list.remove(pos);
        }
    }

    /// Invoke every handler registered for the event, in order.
    pub async fn dispatch(&self, event: &str, payload: &Value) {
        let snapshot: Vec<EventHandler> = self
            .handlers
            .lock()
            .get(event)
            .map(|list| list.to_vec())
            .unwrap_or_default();

        for handler in snapshot {
            if let Err(e) = handler(payload.clone()).await {
                log::error!("error in event handler for {event}: {e:#}");
            }
        }
    }
}
