//! Message Bus for provider events
//!
//! The MessageBus lets front-ends observe the provider without polling. It
//! uses bounded channels so a slow subscriber cannot grow memory without
//! limit, and supports both specific event subscriptions and a global
//! "All" subscription.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

/// Channel buffer size for bounded channels
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Event types that can be published on the message bus
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventType {
    /// Provider finished startup
    ProviderStarted,
    /// Provider is shutting down
    ProviderStopped,
    /// A module's stored state changed
    ModuleStateChanged,
    /// A module was installed or updated
    ModuleInstalled,
    /// An install attempt failed
    InstallFailed,
    /// The preferences view of a module was opened
    OptionsDisplayed,
    /// The global EME switch was toggled
    EmeToggled,
    /// Subscribe to all event types
    All,
}

/// Events that can be published on the message bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Provider started with the number of listed modules
    ProviderStarted { listed: usize },
    /// Provider stopping
    ProviderStopped,
    /// Module state changed
    ModuleStateChanged { id: String },
    /// Module installed at a version
    ModuleInstalled { id: String, version: String },
    /// Install failed with an error message
    InstallFailed { id: String, error: String },
    /// Preferences opened for a module
    OptionsDisplayed { id: String },
    /// Global switch toggled
    EmeToggled { enabled: bool },
}

impl Event {
    /// Get the event type for this event
    pub fn event_type(&self) -> EventType {
        match self {
            Event::ProviderStarted { .. } => EventType::ProviderStarted,
            Event::ProviderStopped => EventType::ProviderStopped,
            Event::ModuleStateChanged { .. } => EventType::ModuleStateChanged,
            Event::ModuleInstalled { .. } => EventType::ModuleInstalled,
            Event::InstallFailed { .. } => EventType::InstallFailed,
            Event::OptionsDisplayed { .. } => EventType::OptionsDisplayed,
            Event::EmeToggled { .. } => EventType::EmeToggled,
        }
    }
}

/// Message bus for pub/sub communication between components
///
/// The MessageBus allows components to subscribe to specific event types
/// or all events, and publish events to all subscribers. It uses bounded
/// channels to prevent unbounded memory growth.
pub struct MessageBus {
    /// Map of event types to lists of subscribers
    /// Each subscriber gets a bounded channel with CHANNEL_BUFFER_SIZE capacity
    channels: Arc<Mutex<HashMap<EventType, Vec<mpsc::Sender<Event>>>>>,
}

impl MessageBus {
    /// Create a new MessageBus
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Subscribe to a specific event type
    ///
    /// Returns a receiver that will receive events of the specified type.
    /// The channel is bounded with CHANNEL_BUFFER_SIZE capacity to prevent
    /// unbounded memory growth.
    ///
    /// # Arguments
    /// * `event_type` - The type of events to subscribe to, or EventType::All for all events
    ///
    /// # Returns
    /// A receiver that will receive events of the specified type
    pub async fn subscribe(&self, event_type: EventType) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut channels = self.channels.lock().await;
        channels.entry(event_type).or_default().push(tx);
        rx
    }

    /// Publish an event to all subscribers
    ///
    /// The event is sent to all subscribers of the specific event type,
    /// as well as all subscribers of EventType::All. Publishing never
    /// waits: events for a full subscriber channel are dropped, and
    /// subscribers whose receiver was dropped are removed.
    ///
    /// # Arguments
    /// * `event` - The event to publish
    pub async fn publish(&self, event: Event) {
        let mut channels = self.channels.lock().await;
        let event_type = event.event_type();

        for key in [event_type, EventType::All] {
            if let Some(subscribers) = channels.get_mut(&key) {
                subscribers.retain(|tx| match tx.try_send(event.clone()) {
                    Ok(()) | Err(TrySendError::Full(_)) => true,
                    Err(TrySendError::Closed(_)) => false,
                });
            }
        }
    }

    /// Number of live senders registered for `event_type`
    pub async fn subscriber_count(&self, event_type: EventType) -> usize {
        self.channels
            .lock()
            .await
            .get(&event_type)
            .map_or(0, Vec::len)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
