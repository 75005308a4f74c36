//! State-change pub/sub for the versatile thermostat
//!
//! This crate provides the EventBus the regulation engine subscribes to.
//! It delivers state-change notifications per entity (the
//! register-for-state-changes surface) and carries typed significant
//! events fired by the engine for downstream history.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};
use vtherm_core::events::StateChangedData;
use vtherm_core::{Context, EntityId, Event, EventData, EventType};

/// Default channel capacity for subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus delivering state changes and significant events
///
/// Supports:
/// - Subscribing to state changes of one entity
/// - Subscribing to all state changes
/// - Firing typed significant events for type-safe consumption
pub struct EventBus {
    /// State-change senders keyed by the entity that changed
    state_listeners: DashMap<EntityId, broadcast::Sender<Event<StateChangedData>>>,
    /// Sender feeding subscribers of every state change
    all_states_sender: broadcast::Sender<Event<StateChangedData>>,
    /// Generic typed event senders keyed by event type
    typed_listeners: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (all_states_sender, _) = broadcast::channel(capacity);
        Self {
            state_listeners: DashMap::new(),
            all_states_sender,
            typed_listeners: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to state changes of a single entity
    ///
    /// Returns a receiver that delivers every state-change notification
    /// fired for the given entity, in arrival order.
    pub fn subscribe(&self, entity_id: &EntityId) -> broadcast::Receiver<Event<StateChangedData>> {
        trace!(entity_id = %entity_id, "Subscribing to state changes");

        self.state_listeners
            .entry(entity_id.clone())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to state changes of every entity
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event<StateChangedData>> {
        self.all_states_sender.subscribe()
    }

    /// Fire a state-change notification
    ///
    /// The notification is delivered to the changed entity's subscribers
    /// and to all-states subscribers. Send errors are ignored, they only
    /// mean there is no active receiver.
    pub fn fire_state_changed(
        &self,
        data: StateChangedData,
        context: Context,
        time_fired: DateTime<Utc>,
    ) {
        debug!(entity_id = %data.entity_id, "Firing state_changed");

        let event = Event::typed(data, context, time_fired);

        if let Some(sender) = self.state_listeners.get(&event.data.entity_id) {
            let _ = sender.send(event.clone());
        }
        let _ = self.all_states_sender.send(event);
    }

    /// Fire a typed significant event
    pub fn fire_typed<T: EventData + serde::Serialize>(
        &self,
        data: T,
        context: Context,
        time_fired: DateTime<Utc>,
    ) {
        let event_type = EventType::from(T::event_type());
        debug!(event_type = %event_type, "Firing event");

        let json_data = serde_json::to_value(&data).unwrap_or_default();
        if let Some(sender) = self.typed_listeners.get(&event_type) {
            let _ = sender.send(Event::new(event_type.clone(), json_data, context, time_fired));
        }
    }

    /// Subscribe to a typed significant event
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        let rx = self
            .typed_listeners
            .entry(EventType::from(T::event_type()))
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe();
        TypedEventReceiver::new(rx)
    }

    /// Number of entities with at least one state-change subscription
    pub fn listener_count(&self) -> usize {
        self.state_listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event<serde_json::Value>>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next typed event, skipping payloads that fail to parse
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(Event {
                    event_type: event.event_type,
                    data,
                    time_fired: event.time_fired,
                    context: event.context,
                });
            }
        }
    }

    /// Receive without waiting, if an event is already queued
    pub fn try_recv(&mut self) -> Result<Event<T>, broadcast::error::TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(Event {
                    event_type: event.event_type,
                    data,
                    time_fired: event.time_fired,
                    context: event.context,
                });
            }
        }
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
