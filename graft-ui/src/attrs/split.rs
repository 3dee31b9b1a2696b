use super::{Attr, AttrMap, EventMap, Name, PropMap};
use serde_json::Value;
use tracing::debug;

const EVENT_PREFIX: &str = "on";

/// Attribute bag partitioned into model properties and event subscriptions.
#[derive(Default)]
pub struct Split {
    pub props: PropMap,
    pub events: EventMap,
}

/// Event name for an `on*` attribute name: the remainder, lower-cased.
pub fn event_name(attr: &str) -> Option<Name> {
    let rest = attr.strip_prefix(EVENT_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_lowercase().into())
}

/// Partition `attrs` into properties and events.
///
/// Handlers under `on*` names become events. Plain values are properties
/// whatever their name, so `online` or `one` stay properties. An
/// empty-string value is the flag shorthand and becomes `true`.
pub fn split(attrs: &AttrMap) -> Split {
    let mut out = Split::default();
    for (name, attr) in attrs {
        match attr {
            Attr::Handler(callback) => match event_name(name) {
                Some(event) => {
                    out.events.insert(event, callback.clone());
                }
                None => debug!(attr = %name, "handler under a property name dropped"),
            },
            Attr::Value(Value::String(s)) if s.is_empty() => {
                out.props.insert(name.to_string(), Value::Bool(true));
            }
            Attr::Value(value) => {
                out.props.insert(name.to_string(), value.clone());
            }
        }
    }
    out
}
