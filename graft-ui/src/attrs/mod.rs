mod split;

pub use split::{Split, event_name, split};

use crate::events::CellEvent;
use serde_json::Value;
use smartstring::{LazyCompact, SmartString};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Short string used for kinds, attribute names and identity keys.
pub type Name = SmartString<LazyCompact>;

/// User callback attached through an `on<Event>` attribute.
pub type Callback = Rc<dyn Fn(&CellEvent)>;

/// Model properties, as handed to the graph engine.
pub type PropMap = serde_json::Map<String, Value>;

/// Flat attribute bag of a declarative node.
pub type AttrMap = BTreeMap<Name, Attr>;

/// Event subscriptions keyed by lower-cased event name.
pub type EventMap = BTreeMap<Name, Callback>;

/// A single declarative attribute: either a plain value or an event handler.
#[derive(Clone)]
pub enum Attr {
    Value(Value),
    Handler(Callback),
}

impl Attr {
    /// Wrap `f` as a handler attribute.
    pub fn handler(f: impl Fn(&CellEvent) + 'static) -> Self {
        Attr::Handler(Rc::new(f))
    }

    /// The plain value, if this is not a handler.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attr::Value(value) => Some(value),
            Attr::Handler(_) => None,
        }
    }
}

impl PartialEq for Attr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Attr::Value(a), Attr::Value(b)) => a == b,
            (Attr::Handler(a), Attr::Handler(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Value(value) => write!(f, "{value}"),
            Attr::Handler(_) => f.write_str("<handler>"),
        }
    }
}

impl From<Value> for Attr {
    fn from(value: Value) -> Self {
        Attr::Value(value)
    }
}
