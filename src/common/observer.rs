//! Synchronous event bus for model lifecycle notifications.
//!
//! Subscribers are called in subscription order with the event and a mutable
//! reference to the bus owner, so a handler may call back into the factory
//! (for example unlink another element when one is deleted). Events raised
//! during a delivery are queued and delivered after the current one finishes,
//! which keeps each mutation complete before anyone observes it. An owner can
//! also hold delivery for the duration of a compound operation.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::{Rc, Weak};

use log::{trace, warn};

use crate::common::error::ModelError;
use crate::common::uuid::{ModelUuid, ViewUuid};
use crate::metamodel::{Attribute, ElementKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ElementCreate,
    ElementDelete,
    AttributeChange,
    SubjectChange,
    ModelFactory,
    FlushFactory,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    ElementCreate {
        element: ModelUuid,
        kind: ElementKind,
    },
    /// Emitted after the element left the factory
    ElementDelete {
        element: ModelUuid,
        kind: ElementKind,
    },
    AttributeChange {
        element: ModelUuid,
        attribute: Attribute,
    },
    /// A diagram item now presents a different model element
    SubjectChange {
        item: ViewUuid,
        old: Option<ModelUuid>,
        new: Option<ModelUuid>,
    },
    /// The model was bulk-loaded from outside
    ModelFactory,
    /// All elements were dropped at once
    FlushFactory,
}

impl ModelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ModelEvent::ElementCreate { .. } => EventKind::ElementCreate,
            ModelEvent::ElementDelete { .. } => EventKind::ElementDelete,
            ModelEvent::AttributeChange { .. } => EventKind::AttributeChange,
            ModelEvent::SubjectChange { .. } => EventKind::SubjectChange,
            ModelEvent::ModelFactory => EventKind::ModelFactory,
            ModelEvent::FlushFactory => EventKind::FlushFactory,
        }
    }
}

/// Filter accepting events of the listed kinds
pub fn kinds(accepted: &'static [EventKind]) -> impl Fn(&ModelEvent) -> bool + 'static {
    move |e| accepted.contains(&e.kind())
}

/// Filter accepting every event
pub fn any_event(_: &ModelEvent) -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type CancelledSet = RefCell<HashSet<SubscriptionId>>;

/// Handle of a live subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately, call detach() to keep it"]
pub struct Subscription {
    id: SubscriptionId,
    cancelled: Weak<CancelledSet>,
    detached: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Keep the subscription for as long as the bus lives
    pub fn detach(mut self) -> SubscriptionId {
        self.detached = true;
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(cancelled) = self.cancelled.upgrade() {
            cancelled.borrow_mut().insert(self.id);
        }
    }
}

type Filter = Box<dyn Fn(&ModelEvent) -> bool>;
type Callback<C> = Box<dyn FnMut(&ModelEvent, &mut C) -> Result<(), ModelError>>;

struct Subscriber<C> {
    id: SubscriptionId,
    filter: Filter,
    callback: Callback<C>,
}

pub struct EventBus<C> {
    subscribers: Vec<Subscriber<C>>,
    cancelled: Rc<CancelledSet>,
    pending: VecDeque<ModelEvent>,
    dispatching: bool,
    held: usize,
    next_id: u64,
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            cancelled: Rc::new(RefCell::new(HashSet::new())),
            pending: VecDeque::new(),
            dispatching: false,
            held: 0,
            next_id: 0,
        }
    }
}

impl<C> EventBus<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F, H>(&mut self, filter: F, callback: H) -> Subscription
    where
        F: Fn(&ModelEvent) -> bool + 'static,
        H: FnMut(&ModelEvent, &mut C) -> Result<(), ModelError> + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            filter: Box::new(filter),
            callback: Box::new(callback),
        });
        Subscription {
            id,
            cancelled: Rc::downgrade(&self.cancelled),
            detached: false,
        }
    }

    /// Remove a detached subscription
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.cancelled.borrow_mut().insert(id);
        if !self.dispatching {
            self.purge();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let cancelled = self.cancelled.borrow();
        self.subscribers
            .iter()
            .filter(|s| !cancelled.contains(&s.id))
            .count()
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// Events published but not delivered yet
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn is_cancelled(&self, id: SubscriptionId) -> bool {
        self.cancelled.borrow().contains(&id)
    }

    fn purge(&mut self) {
        let mut cancelled = self.cancelled.borrow_mut();
        if cancelled.is_empty() {
            return;
        }
        self.subscribers.retain(|s| !cancelled.contains(&s.id));
        cancelled.clear();
    }
}

/// Implemented by whatever owns an [`EventBus`]; the owner is handed to every
/// callback while the event is delivered.
pub trait Observable: Sized {
    fn event_bus(&mut self) -> &mut EventBus<Self>;

    fn notify_observers(&mut self, event: ModelEvent) {
        trace!(event:?; "publishing event");
        self.event_bus().pending.push_back(event);
        self.deliver_pending();
    }

    /// Queue events instead of delivering them until the matching release
    fn hold_events(&mut self) {
        self.event_bus().held += 1;
    }

    fn release_events(&mut self) {
        let bus = self.event_bus();
        bus.held = bus.held.saturating_sub(1);
        self.deliver_pending();
    }

    fn deliver_pending(&mut self) {
        if self.event_bus().dispatching || self.event_bus().held > 0 {
            return;
        }

        self.event_bus().dispatching = true;
        while let Some(event) = self.event_bus().pending.pop_front() {
            let mut subscribers = std::mem::take(&mut self.event_bus().subscribers);
            for s in subscribers.iter_mut() {
                if self.event_bus().is_cancelled(s.id) || !(s.filter)(&event) {
                    continue;
                }
                if let Err(e) = (s.callback)(&event, self) {
                    warn!(subscriber:? = s.id, event:? = event; "event subscriber failed: {}", e);
                }
            }
            let bus = self.event_bus();
            // Subscriptions made during delivery landed in the emptied vector
            subscribers.append(&mut bus.subscribers);
            bus.subscribers = subscribers;
            bus.purge();
        }
        self.event_bus().dispatching = false;
    }
}
