use super::{CellEvent, EventBus, HandlerId};
use crate::attrs::{EventMap, Name};
use smallvec::SmallVec;
use std::rc::{Rc, Weak};

const CELL_NAMESPACE: &str = "cell:";

/// Name under which an event is reported and subscribed on a bus.
pub fn qualified_name(event: &str) -> Name {
    let mut name = Name::from(CELL_NAMESPACE);
    name.push_str(event);
    name
}

/// Handle that releases every handler installed by one `bind` call.
#[derive(Default)]
pub struct Disposer {
    bus: Weak<EventBus>,
    handlers: SmallVec<[(Name, HandlerId); 4]>,
}

impl Disposer {
    /// A disposer holding no subscriptions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Unsubscribe all handlers. Calling it again does nothing.
    pub fn dispose(&mut self) {
        let handlers = std::mem::take(&mut self.handlers);
        if let Some(bus) = self.bus.upgrade() {
            for (event, id) in handlers {
                bus.off(&event, id);
            }
        }
    }

    /// Whether `dispose` has not run yet.
    pub fn is_active(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Number of held subscriptions.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Subscribe `events` on `bus`.
///
/// With an `owner`, each callback only fires for payloads reported against
/// that cell. Without one the callbacks see every event of their name.
pub fn bind(owner: Option<&str>, events: &EventMap, bus: &Rc<EventBus>) -> Disposer {
    let mut handlers = SmallVec::new();
    for (name, callback) in events {
        let event = qualified_name(name);
        let callback = callback.clone();
        let owner: Option<Name> = owner.map(Into::into);
        let id = bus.on(
            &event,
            Rc::new(move |payload: &CellEvent| {
                let matches = match &owner {
                    Some(owner) => payload.cell.as_deref() == Some(owner.as_str()),
                    None => true,
                };
                if matches {
                    callback(payload);
                }
            }),
        );
        handlers.push((event, id));
    }
    Disposer {
        bus: Rc::downgrade(bus),
        handlers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::Callback;
    use serde_json::Value;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &str) -> Callback {
        let log = log.clone();
        let tag = tag.to_string();
        Rc::new(move |e: &CellEvent| {
            log.borrow_mut()
                .push(format!("{tag}:{}", e.cell.as_deref().unwrap_or("-")))
        })
    }

    #[test]
    fn test_scoped_binding_ignores_other_cells() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut a_events = EventMap::new();
        a_events.insert("click".into(), recorder(&log, "a"));
        let mut b_events = EventMap::new();
        b_events.insert("click".into(), recorder(&log, "b"));

        let _a = bind(Some("n1"), &a_events, &bus);
        let _b = bind(Some("n2"), &b_events, &bus);

        bus.emit("cell:click", Some("n2"), Value::Null);
        assert_eq!(*log.borrow(), vec!["b:n2".to_string()]);
    }

    #[test]
    fn test_unscoped_binding_sees_everything() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut events = EventMap::new();
        events.insert("click".into(), recorder(&log, "root"));

        let _root = bind(None, &events, &bus);
        bus.emit("cell:click", Some("n1"), Value::Null);
        bus.emit("cell:click", None, Value::Null);

        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut events = EventMap::new();
        events.insert("click".into(), recorder(&log, "a"));
        events.insert("mouseenter".into(), recorder(&log, "a"));

        let mut disposer = bind(Some("n1"), &events, &bus);
        assert_eq!(disposer.len(), 2);
        assert_eq!(bus.len(), 2);

        disposer.dispose();
        disposer.dispose();
        assert!(!disposer.is_active());
        assert!(bus.is_empty());

        bus.emit("cell:click", Some("n1"), Value::Null);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("click").as_str(), "cell:click");
        assert_eq!(qualified_name("change:position").as_str(), "cell:change:position");
    }

    #[test]
    fn test_dispose_after_bus_dropped() {
        let bus = Rc::new(EventBus::new());
        let mut events = EventMap::new();
        events.insert("click".into(), Rc::new(|_: &CellEvent| {}) as Callback);

        let mut disposer = bind(None, &events, &bus);
        drop(bus);
        disposer.dispose();
        assert!(disposer.is_empty());
    }
}
