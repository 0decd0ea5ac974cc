//! Process-wide fan-out of [`Event`]s to named callbacks.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;

use anyhow::Result;
use tokio::sync::mpsc;

use netauth_context::Context;

use super::Event;

/// Logic invoked for every [`Event`] fired on an [`EventBus`].
///
/// Callbacks can be invoked more than once for the same change and must be
/// idempotent for each `(EventType, PK)` pair.
#[async_trait::async_trait]
pub trait EventCallback: Send + Sync {
    /// Process an event.
    async fn handle(&self, context: &Context, event: &Event) -> Result<()>;
}

/// Deliver [`Event`]s to all registered callbacks.
///
/// Callbacks are registered by unique name, usually once during process initialisation.
#[derive(Clone, Default)]
pub struct EventBus {
    callbacks: Arc<RwLock<BTreeMap<String, Arc<dyn EventCallback>>>>,
}

impl EventBus {
    /// Remove a callback from the bus.
    ///
    /// Removing a callback that was never registered is not an error.
    pub fn deregister(&self, name: &str) {
        self.callbacks
            .write()
            .expect("EventBus callbacks lock poisoned")
            .remove(name);
    }

    /// Deliver an event to every registered callback.
    ///
    /// Delivery is sequential and completes when all callbacks have returned.
    /// Callback failures are logged and do not prevent delivery to other callbacks.
    pub async fn fire(&self, context: &Context, event: Event) {
        if event.is_empty() {
            return;
        }

        // Release the lock before invoking callbacks so they can use the bus themselves.
        let callbacks: Vec<(String, Arc<dyn EventCallback>)> = self
            .callbacks
            .read()
            .expect("EventBus callbacks lock poisoned")
            .iter()
            .map(|(name, callback)| (name.clone(), Arc::clone(callback)))
            .collect();

        for (name, callback) in callbacks {
            if let Err(error) = callback.handle(context, &event).await {
                slog::warn!(
                    context.logger, "Event callback failed";
                    "callback" => name,
                    "event" => %event.kind,
                    "pk" => &event.pk,
                    "error" => format!("{:?}", error),
                );
            }
        }
    }

    /// Check if a callback with the given name is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.callbacks
            .read()
            .expect("EventBus callbacks lock poisoned")
            .contains_key(name)
    }

    /// Register a named callback to receive all future events.
    ///
    /// Registering a name already in use is a no-op and returns `false`.
    pub fn register<C, S>(&self, name: S, callback: C) -> bool
    where
        C: EventCallback + 'static,
        S: Into<String>,
    {
        let name = name.into();
        let mut callbacks = self
            .callbacks
            .write()
            .expect("EventBus callbacks lock poisoned");
        if callbacks.contains_key(&name) {
            return false;
        }
        callbacks.insert(name, Arc::new(callback));
        true
    }
}

/// Decouple a slow [`EventCallback`] from event producers with a bounded queue.
///
/// Events are queued for a background task that invokes the wrapped callback.
/// When the queue is full producers wait for space, applying backpressure
/// instead of growing memory without bounds.
pub struct Buffered {
    sender: mpsc::Sender<Event>,
}

impl Buffered {
    /// Wrap a callback and start the background task delivering events to it.
    ///
    /// The background task runs until the [`Buffered`] callback is dropped.
    pub fn spawn<C>(context: &Context, capacity: usize, inner: C) -> Buffered
    where
        C: EventCallback + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<Event>(capacity.max(1));
        let context = context.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if let Err(error) = inner.handle(&context, &event).await {
                    slog::warn!(
                        context.logger, "Buffered event callback failed";
                        "event" => %event.kind,
                        "pk" => &event.pk,
                        "error" => format!("{:?}", error),
                    );
                }
            }
        });
        Buffered { sender }
    }
}

#[async_trait::async_trait]
impl EventCallback for Buffered {
    async fn handle(&self, _: &Context, event: &Event) -> Result<()> {
        self.sender.send(event.clone()).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::EventsFixture;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture {
    use std::sync::Arc;
    use std::sync::Mutex;

    use anyhow::Result;

    use netauth_context::Context;

    use super::Event;
    use super::EventCallback;

    /// Introspection tools for events fired during unit tests.
    #[derive(Clone, Default)]
    pub struct EventsFixture {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl EventsFixture {
        /// Return and forget all events received so far.
        pub fn drain(&self) -> Vec<Event> {
            let mut events = self.events.lock().expect("EventsFixture lock poisoned");
            std::mem::take(&mut *events)
        }
    }

    #[async_trait::async_trait]
    impl EventCallback for EventsFixture {
        async fn handle(&self, _: &Context, event: &Event) -> Result<()> {
            self.events
                .lock()
                .expect("EventsFixture lock poisoned")
                .push(event.clone());
            Ok(())
        }
    }
}
