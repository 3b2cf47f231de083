//! Typed lifecycle events and in-process subscription bus.
//!
//! # Responsibility
//! - Define the closed set of lifecycle events the DAV app reacts to.
//! - Deliver each event to handlers subscribed to its topic.
//!
//! # Invariants
//! - Handlers run synchronously, in subscription order.
//! - Subscription ids are unique for the life of the bus.
//! - Every bus carries its own id, so owners can tell buses apart.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod hooks;

/// Lifecycle event with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A user logged in for the first time.
    FirstLogin { user_id: String },
    /// A contact card was written to an address book.
    CardCreated {
        address_book_id: i64,
        card_uri: String,
        card_data: String,
    },
    /// An existing contact card was replaced.
    CardUpdated {
        address_book_id: i64,
        card_uri: String,
        card_data: String,
    },
    /// A contact card was removed.
    CardDeleted {
        address_book_id: i64,
        card_uri: String,
    },
}

impl LifecycleEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::FirstLogin { .. } => EventTopic::FirstLogin,
            Self::CardCreated { .. } => EventTopic::CardCreated,
            Self::CardUpdated { .. } => EventTopic::CardUpdated,
            Self::CardDeleted { .. } => EventTopic::CardDeleted,
        }
    }
}

/// Subscription key, one per `LifecycleEvent` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTopic {
    FirstLogin,
    CardCreated,
    CardUpdated,
    CardDeleted,
}

impl EventTopic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstLogin => "first_login",
            Self::CardCreated => "card_created",
            Self::CardUpdated => "card_updated",
            Self::CardDeleted => "card_deleted",
        }
    }
}

impl Display for EventTopic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle returned by `EventBus::subscribe`.
pub type SubscriptionId = Uuid;

type Handler = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    topic: EventTopic,
    handler: Handler,
}

/// Synchronous in-process event bus.
pub struct EventBus {
    id: Uuid,
    subscriptions: Vec<Subscription>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriptions: Vec::new(),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of this bus, distinct from every other bus in the process.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Registers `handler` for every event of `topic`.
    pub fn subscribe<F>(&mut self, topic: EventTopic, handler: F) -> SubscriptionId
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.subscriptions.push(Subscription {
            id,
            topic,
            handler: Box::new(handler),
        });
        id
    }

    /// Removes one subscription. Returns `false` when `id` is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        self.subscriptions.len() != before
    }

    /// Delivers `event` to matching handlers; returns how many ran.
    pub fn dispatch(&self, event: &LifecycleEvent) -> usize {
        let topic = event.topic();
        let mut delivered = 0;
        for subscription in self
            .subscriptions
            .iter()
            .filter(|subscription| subscription.topic == topic)
        {
            (subscription.handler)(event);
            delivered += 1;
        }
        delivered
    }

    pub fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.subscriptions
            .iter()
            .filter(|subscription| subscription.topic == topic)
            .count()
    }
}
