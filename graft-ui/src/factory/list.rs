use super::{EntityFactory, FactoryCx, declared_parent};
use crate::attrs::{AttrMap, Name, PropMap, Split, split};
use crate::events::bind;
use crate::graph::{GraphModel, ID_KEY, LABELS_PATH, PARENT_KEY, PORTS_PATH, TOOLS_PATH, value_to_id};
use crate::identity::IdentityKey;
use crate::live::{EntryState, LiveObject, LiveState, Owner};
use serde_json::Value;
use tracing::{debug, trace};

/// List property of a cell that holds one entry per declarative node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListSlot {
    Labels,
    Ports,
    Tools,
}

impl ListSlot {
    /// Property path of the list.
    pub fn path(self) -> &'static str {
        match self {
            ListSlot::Labels => LABELS_PATH,
            ListSlot::Ports => PORTS_PATH,
            ListSlot::Tools => TOOLS_PATH,
        }
    }

    /// Entry field that carries the entry's identity.
    pub fn identity_field(self) -> &'static str {
        match self {
            ListSlot::Ports => ID_KEY,
            ListSlot::Labels | ListSlot::Tools => "key",
        }
    }

    fn read(self, graph: &dyn GraphModel, cell: &str) -> Vec<Value> {
        match self {
            ListSlot::Labels => graph.labels(cell),
            ListSlot::Ports => graph.ports(cell),
            ListSlot::Tools => graph.tools(cell),
        }
    }

    fn write(self, graph: &mut dyn GraphModel, cell: &str, items: Vec<Value>) {
        match self {
            ListSlot::Labels => graph.set_labels(cell, items),
            ListSlot::Ports => graph.set_ports(cell, items),
            ListSlot::Tools => graph.set_tools(cell, items),
        }
    }

    fn identity_of(self, item: &Value) -> Option<&str> {
        item.get(self.identity_field())?.as_str()
    }

    /// Identity of a node's entry: ports prefer their explicit id.
    fn identity(self, props: &PropMap, key: Option<&IdentityKey>) -> Name {
        let explicit = match self {
            ListSlot::Ports => props.get(ID_KEY).and_then(value_to_id),
            ListSlot::Labels | ListSlot::Tools => None,
        };
        explicit
            .or_else(|| key.cloned())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string().into())
    }

    /// Put `entry` into the owner's list, replacing any entry with the same
    /// identity. Duplicates left by earlier writes collapse into one.
    pub fn materialize(self, graph: &mut dyn GraphModel, cell: &str, identity: &str, props: &PropMap) {
        if !graph.contains(cell) {
            return;
        }
        let mut entry = props.clone();
        entry.insert(
            self.identity_field().to_string(),
            Value::String(identity.to_string()),
        );
        let entry = Value::Object(entry);

        let mut placed = false;
        let mut items = Vec::new();
        for item in self.read(graph, cell) {
            if self.identity_of(&item) != Some(identity) {
                items.push(item);
            } else if !placed {
                items.push(entry.clone());
                placed = true;
            }
        }
        if !placed {
            items.push(entry);
        }
        self.write(graph, cell, items);
    }

    /// Drop the entry `identity` from the list on `cell`.
    pub fn unmaterialize(self, graph: &mut dyn GraphModel, cell: &str, identity: &str) {
        if !graph.contains(cell) {
            return;
        }
        let mut items = self.read(graph, cell);
        let before = items.len();
        items.retain(|item| self.identity_of(item) != Some(identity));
        if items.len() != before {
            self.write(graph, cell, items);
        }
    }
}

/// Labels, ports and tools: entries in a list property of their owner.
pub struct ListFactory {
    slot: ListSlot,
}

impl ListFactory {
    pub fn new(slot: ListSlot) -> Self {
        Self { slot }
    }

    /// Write the entry and subscribe its events against the owner cell.
    fn materialize(cx: &mut FactoryCx<'_>, obj: &mut LiveObject, next: &Split) {
        let LiveState::Entry(state) = &obj.state else {
            return;
        };
        let Some(owner) = &state.owner else {
            trace!(identity = %state.identity, "entry has no owner yet");
            return;
        };
        state
            .slot
            .materialize(cx.graph, &owner.cell, &state.identity, &state.props);
        obj.subscriptions.dispose();
        obj.subscriptions = bind(Some(&owner.cell), &next.events, &cx.graph.events());
    }
}

fn entry_props(split: &Split) -> PropMap {
    let mut props = split.props.clone();
    props.remove(PARENT_KEY);
    props
}

impl EntityFactory for ListFactory {
    fn create(
        &self,
        _cx: &mut FactoryCx<'_>,
        kind: &str,
        key: Option<&IdentityKey>,
        attrs: &AttrMap,
    ) -> Option<LiveObject> {
        let props = entry_props(&split(attrs));
        let identity = self.slot.identity(&props, key);
        trace!(%kind, %identity, "list entry created");
        Some(LiveObject::new(
            kind,
            key,
            attrs.clone(),
            Default::default(),
            LiveState::Entry(EntryState {
                slot: self.slot,
                identity,
                owner: None,
                props,
            }),
        ))
    }

    fn attach_to_parent(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, container: Option<Owner>) {
        let next = split(&obj.declared);
        let owner = container.or_else(|| declared_parent(&next).and_then(|id| cx.owner_of_cell(&id)));
        if let LiveState::Entry(state) = &mut obj.state {
            if owner.is_none() {
                debug!(identity = %state.identity, "list entry has no resolvable owner");
            }
            state.owner = owner;
        }
        Self::materialize(cx, obj, &next);
    }

    fn patch(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, next: &Split) {
        let key = obj.key.clone();
        let LiveState::Entry(state) = &mut obj.state else {
            return;
        };
        state.props = entry_props(next);
        let identity = state.slot.identity(&state.props, key.as_ref());
        if identity != state.identity {
            if let Some(owner) = &state.owner {
                state.slot.unmaterialize(cx.graph, &owner.cell, &state.identity);
            }
            state.identity = identity;
        }
        if state.owner.is_none() {
            state.owner = declared_parent(next).and_then(|id| cx.owner_of_cell(&id));
        }
        Self::materialize(cx, obj, next);
    }

    fn remove(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject) {
        obj.subscriptions.dispose();
        if let LiveState::Entry(state) = &obj.state {
            if let Some(owner) = &state.owner {
                state.slot.unmaterialize(cx.graph, &owner.cell, &state.identity);
            }
        }
    }

    fn settle(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject) {
        if let LiveState::Entry(state) = &obj.state {
            if let Some(owner) = &state.owner {
                state
                    .slot
                    .materialize(cx.graph, &owner.cell, &state.identity, &state.props);
            }
        }
    }
}
