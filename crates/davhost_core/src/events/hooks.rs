//! Hook collaborators driven by lifecycle events.
//!
//! # Responsibility
//! - Define the user-lifecycle and birthday-calendar hook contracts.
//! - Wire them onto an `EventBus`.
//!
//! # Invariants
//! - Hook failures are logged and never escape into the dispatcher.
//! - Created and updated cards are both routed to `on_card_changed`.

use crate::events::{EventBus, EventTopic, LifecycleEvent, SubscriptionId};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Failure reported by a hook collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError {
    pub hook: &'static str,
    pub message: String,
}

impl HookError {
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
        }
    }
}

impl Display for HookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "hook `{}` failed: {}", self.hook, self.message)
    }
}

impl Error for HookError {}

/// User lifecycle hooks (home calendars, default address books, ...).
pub trait HookManager: Send + Sync {
    /// One-time wiring performed before any event subscription.
    fn setup(&self) -> Result<(), HookError>;
    fn first_login(&self, user_id: &str) -> Result<(), HookError>;
}

/// Keeps the birthday calendar in sync with contact cards.
pub trait BirthdayService: Send + Sync {
    fn on_card_changed(
        &self,
        address_book_id: i64,
        card_uri: &str,
        card_data: &str,
    ) -> Result<(), HookError>;
    fn on_card_deleted(&self, address_book_id: i64, card_uri: &str) -> Result<(), HookError>;
}

/// Subscriptions created by `subscribe_hooks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSubscriptions {
    pub first_login: SubscriptionId,
    pub card_created: SubscriptionId,
    pub card_updated: SubscriptionId,
    pub card_deleted: SubscriptionId,
}

/// Subscribes the hook collaborators to their lifecycle topics.
pub fn subscribe_hooks(
    bus: &mut EventBus,
    hooks: Arc<dyn HookManager>,
    birthdays: Arc<dyn BirthdayService>,
) -> HookSubscriptions {
    let first_login = bus.subscribe(EventTopic::FirstLogin, move |event| {
        if let LifecycleEvent::FirstLogin { user_id } = event {
            log_hook_failure(event.topic(), hooks.first_login(user_id));
        }
    });

    let created = Arc::clone(&birthdays);
    let card_created = bus.subscribe(EventTopic::CardCreated, move |event| {
        route_card_change(created.as_ref(), event)
    });
    let updated = Arc::clone(&birthdays);
    let card_updated = bus.subscribe(EventTopic::CardUpdated, move |event| {
        route_card_change(updated.as_ref(), event)
    });

    let card_deleted = bus.subscribe(EventTopic::CardDeleted, move |event| {
        if let LifecycleEvent::CardDeleted {
            address_book_id,
            card_uri,
        } = event
        {
            log_hook_failure(
                event.topic(),
                birthdays.on_card_deleted(*address_book_id, card_uri),
            );
        }
    });

    HookSubscriptions {
        first_login,
        card_created,
        card_updated,
        card_deleted,
    }
}

fn route_card_change(birthdays: &dyn BirthdayService, event: &LifecycleEvent) {
    if let LifecycleEvent::CardCreated {
        address_book_id,
        card_uri,
        card_data,
    }
    | LifecycleEvent::CardUpdated {
        address_book_id,
        card_uri,
        card_data,
    } = event
    {
        log_hook_failure(
            event.topic(),
            birthdays.on_card_changed(*address_book_id, card_uri, card_data),
        );
    }
}

fn log_hook_failure(topic: EventTopic, result: Result<(), HookError>) {
    if let Err(err) = result {
        warn!(
            "event=hook_dispatch module=events status=error topic={} hook={} error={}",
            topic, err.hook, err.message
        );
    }
}
