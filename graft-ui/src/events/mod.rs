mod binder;
mod queue;

pub use binder::{Disposer, bind, qualified_name};
pub use queue::RemovalQueue;

use crate::attrs::Name;
use crate::graph::CellId;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Payload delivered to event handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct CellEvent {
    /// Fully qualified event name, e.g. `cell:click`.
    pub name: Name,
    /// Cell the event was reported against, if any.
    pub cell: Option<CellId>,
    pub data: Value,
}

impl CellEvent {
    /// Event `name` about `cell`, without data.
    pub fn new(name: &str, cell: Option<&str>) -> Self {
        Self {
            name: name.into(),
            cell: cell.map(Into::into),
            data: Value::Null,
        }
    }

    /// Attach the event payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

pub type Handler = Rc<dyn Fn(&CellEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Subscription {
    event: Name,
    id: HandlerId,
    handler: Handler,
}

/// `on`/`off`/`trigger` bus owned by a graph model or a plugin.
///
/// Handlers may subscribe or unsubscribe while an event is being delivered;
/// delivery works on a snapshot taken when `trigger` starts.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    pub fn on(&self, event: &str, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            event: event.into(),
            id,
            handler,
        });
        id
    }

    /// Returns false when the handler was not subscribed.
    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|s| !(s.id == id && s.event == event));
        subscriptions.len() != before
    }

    /// Deliver `payload` to every handler of `event`, returning how many ran.
    pub fn trigger(&self, event: &str, payload: &CellEvent) -> usize {
        let handlers: Vec<Handler> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.event == event)
            .map(|s| s.handler.clone())
            .collect();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Build a payload named `event` and trigger it.
    pub fn emit(&self, event: &str, cell: Option<&str>, data: Value) -> usize {
        self.trigger(event, &CellEvent::new(event, cell).with_data(data))
    }

    /// Handlers registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|s| s.event == event)
            .count()
    }

    /// Handlers registered across every event.
    pub fn len(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.subscriptions.borrow_mut().clear();
    }
}
