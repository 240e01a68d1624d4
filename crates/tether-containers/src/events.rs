//! Bridges engine change listeners into a `Publisher`
//!
//! Each container registers one engine listener per observable hook and
//! forwards values into a shared publisher, so callers subscribe with RAII
//! guards instead of talking to the engine directly.

use crate::error::Result;
use std::sync::{Arc, Mutex, PoisonError};
use tether_core::{HookId, SharedEngine, Value};
use tether_notify::{Publisher, Subscription};

/// A publisher fed by a hook's change events
pub(crate) type Events = Arc<Mutex<Publisher<Value>>>;

/// Register an engine listener on `hook` that feeds a fresh publisher
pub(crate) fn attach_publisher(engine: &SharedEngine, hook: HookId) -> Result<Events> {
    let events: Events = Arc::new(Mutex::new(Publisher::new()));
    let sink = events.clone();
    engine.subscribe(hook, move |value: &Value| {
        let mut publisher = sink.lock().unwrap_or_else(PoisonError::into_inner);
        publisher.publish(value);
    })?;
    Ok(events)
}

/// Subscribe a callback to a container's event stream
pub(crate) fn subscribe(
    events: &Events,
    callback: impl Fn(&Value) + Send + Sync + 'static,
) -> Subscription<Value> {
    let mut publisher = events.lock().unwrap_or_else(PoisonError::into_inner);
    publisher.subscribe(callback)
}
