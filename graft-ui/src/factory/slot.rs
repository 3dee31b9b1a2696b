use super::{EntityFactory, FactoryCx, declared_parent};
use crate::attrs::{AttrMap, Name, PropMap, Split, split};
use crate::events::bind;
use crate::graph::{GraphModel, ID_KEY, PARENT_KEY, value_to_id};
use crate::identity::IdentityKey;
use crate::live::{LiveObject, LiveState, Owner, SlotState};
use serde_json::Value;
use tracing::{debug, trace};

const NAME_KEY: &str = "name";

/// Single named place on a cell that one declarative node fills.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamedSlot {
    SourceMarker,
    TargetMarker,
    PortGroup(Name),
}

impl NamedSlot {
    /// Property path the slot writes to.
    pub fn path(&self) -> String {
        match self {
            NamedSlot::SourceMarker => "attrs/line/sourceMarker".to_string(),
            NamedSlot::TargetMarker => "attrs/line/targetMarker".to_string(),
            NamedSlot::PortGroup(name) => format!("ports/groups/{name}"),
        }
    }

    /// Replace the slot wholesale.
    pub fn materialize(&self, graph: &mut dyn GraphModel, cell: &str, props: &PropMap) {
        if !graph.contains(cell) {
            return;
        }
        graph.set_prop_by_path(cell, &self.path(), Value::Object(props.clone()));
    }

    /// Clear the slot on `cell`.
    pub fn unmaterialize(&self, graph: &mut dyn GraphModel, cell: &str) {
        if !graph.contains(cell) {
            return;
        }
        graph.remove_prop_by_path(cell, &self.path());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    SourceMarker,
    TargetMarker,
    PortGroup,
}

/// Decorations and port groups.
pub struct SlotFactory {
    kind: SlotKind,
}

impl SlotFactory {
    /// Fills the `attrs/line/sourceMarker` slot of a connector.
    pub fn source_marker() -> Self {
        Self {
            kind: SlotKind::SourceMarker,
        }
    }

    /// Fills the `attrs/line/targetMarker` slot of a connector.
    pub fn target_marker() -> Self {
        Self {
            kind: SlotKind::TargetMarker,
        }
    }

    pub fn port_group() -> Self {
        Self {
            kind: SlotKind::PortGroup,
        }
    }

    /// Slot and slot value for a property set. Port groups are named by
    /// `name`, falling back to the explicit id.
    fn resolve(&self, split: &Split) -> Option<(NamedSlot, PropMap)> {
        let mut props = split.props.clone();
        props.remove(PARENT_KEY);
        let slot = match self.kind {
            SlotKind::SourceMarker => NamedSlot::SourceMarker,
            SlotKind::TargetMarker => NamedSlot::TargetMarker,
            SlotKind::PortGroup => {
                let name = props.remove(NAME_KEY);
                let id = props.remove(ID_KEY);
                let name = name.as_ref().and_then(value_to_id).or_else(|| id.as_ref().and_then(value_to_id))?;
                NamedSlot::PortGroup(name)
            }
        };
        Some((slot, props))
    }

    fn materialize(cx: &mut FactoryCx<'_>, obj: &mut LiveObject, next: &Split) {
        let LiveState::Slot(state) = &obj.state else {
            return;
        };
        let Some(owner) = &state.owner else {
            trace!(slot = ?state.slot, "slot has no owner yet");
            return;
        };
        state.slot.materialize(cx.graph, &owner.cell, &state.props);
        obj.subscriptions.dispose();
        obj.subscriptions = bind(Some(&owner.cell), &next.events, &cx.graph.events());
    }
}

impl EntityFactory for SlotFactory {
    fn create(
        &self,
        _cx: &mut FactoryCx<'_>,
        kind: &str,
        key: Option<&IdentityKey>,
        attrs: &AttrMap,
    ) -> Option<LiveObject> {
        let Some((slot, props)) = self.resolve(&split(attrs)) else {
            debug!(%kind, "slot without a name ignored");
            return None;
        };
        Some(LiveObject::new(
            kind,
            key,
            attrs.clone(),
            Default::default(),
            LiveState::Slot(SlotState {
                slot,
                owner: None,
                props,
            }),
        ))
    }

    fn attach_to_parent(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, container: Option<Owner>) {
        let next = split(&obj.declared);
        let owner = container.or_else(|| declared_parent(&next).and_then(|id| cx.owner_of_cell(&id)));
        if let LiveState::Slot(state) = &mut obj.state {
            state.owner = owner;
        }
        Self::materialize(cx, obj, &next);
    }

    fn patch(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, next: &Split) {
        let resolved = self.resolve(next);
        let LiveState::Slot(state) = &mut obj.state else {
            return;
        };
        let Some((slot, props)) = resolved else {
            debug!(slot = ?state.slot, "slot lost its name, keeping the previous one");
            return;
        };
        if slot != state.slot {
            if let Some(owner) = &state.owner {
                state.slot.unmaterialize(cx.graph, &owner.cell);
            }
            state.slot = slot;
        }
        state.props = props;
        if state.owner.is_none() {
            state.owner = declared_parent(next).and_then(|id| cx.owner_of_cell(&id));
        }
        Self::materialize(cx, obj, next);
    }

    fn remove(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject) {
        obj.subscriptions.dispose();
        if let LiveState::Slot(state) = &obj.state {
            if let Some(owner) = &state.owner {
                state.slot.unmaterialize(cx.graph, &owner.cell);
            }
        }
    }

    fn settle(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject) {
        if let LiveState::Slot(state) = &obj.state {
            if let Some(owner) = &state.owner {
                state.slot.materialize(cx.graph, &owner.cell, &state.props);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::Attr;
    use crate::config::GraphOptions;
    use crate::graph::{CellKind, MemoryGraph};
    use rustc_hash::FxHashMap;
    use serde_json::json;

    fn attrs(value: Value) -> AttrMap {
        value
            .as_object()
            .into_iter()
            .flatten()
            .map(|(k, v)| (Name::from(k.as_str()), Attr::Value(v.clone())))
            .collect()
    }

    fn graph_with_edge() -> MemoryGraph {
        let mut graph = MemoryGraph::new(&GraphOptions::default());
        graph.add_cell(
            CellKind::Edge,
            json!({"id": "e1"}).as_object().cloned().unwrap_or_default(),
        );
        graph
    }

    fn owner(cell: &str) -> Option<Owner> {
        Some(Owner {
            live: None,
            cell: cell.into(),
        })
    }

    #[test]
    fn test_marker_slot_lifecycle() {
        let mut graph = graph_with_edge();
        let cells = FxHashMap::default();
        let mut cx = FactoryCx::new(&mut graph, &cells);
        let factory = SlotFactory::target_marker();

        let mut obj = factory
            .create(&mut cx, "TargetDecoration", None, &attrs(json!({"name": "block", "size": 8})))
            .unwrap();
        factory.attach_to_parent(&mut cx, &mut obj, owner("e1"));
        assert_eq!(
            cx.graph.prop_by_path("e1", "attrs/line/targetMarker"),
            Some(json!({"name": "block", "size": 8}))
        );

        factory.patch(&mut cx, &mut obj, &split(&attrs(json!({"name": "classic"}))));
        assert_eq!(
            cx.graph.prop_by_path("e1", "attrs/line/targetMarker"),
            Some(json!({"name": "classic"}))
        );

        factory.remove(&mut cx, &mut obj);
        assert_eq!(cx.graph.prop_by_path("e1", "attrs/line/targetMarker"), None);
    }

    #[test]
    fn test_port_group_renames_slot() {
        let mut graph = graph_with_edge();
        let cells = FxHashMap::default();
        let mut cx = FactoryCx::new(&mut graph, &cells);
        let factory = SlotFactory::port_group();

        let mut obj = factory
            .create(&mut cx, "PortGroup", None, &attrs(json!({"name": "in", "position": "left"})))
            .unwrap();
        factory.attach_to_parent(&mut cx, &mut obj, owner("e1"));
        assert_eq!(
            cx.graph.prop_by_path("e1", "ports/groups/in"),
            Some(json!({"position": "left"}))
        );

        factory.patch(&mut cx, &mut obj, &split(&attrs(json!({"id": "out", "position": "right"}))));
        assert_eq!(cx.graph.prop_by_path("e1", "ports/groups/in"), None);
        assert_eq!(
            cx.graph.prop_by_path("e1", "ports/groups/out"),
            Some(json!({"position": "right"}))
        );
    }

    #[test]
    fn test_unnamed_port_group_is_not_created() {
        let mut graph = graph_with_edge();
        let cells = FxHashMap::default();
        let mut cx = FactoryCx::new(&mut graph, &cells);
        let created = SlotFactory::port_group().create(&mut cx, "PortGroup", None, &attrs(json!({"position": "top"})));
        assert!(created.is_none());
    }

    #[test]
    fn test_declared_parent_resolves_owner() {
        let mut graph = graph_with_edge();
        let cells = FxHashMap::default();
        let mut cx = FactoryCx::new(&mut graph, &cells);
        let factory = SlotFactory::source_marker();

        let mut obj = factory
            .create(&mut cx, "SourceDecoration", None, &attrs(json!({"name": "circle", "parent": "e1"})))
            .unwrap();
        factory.attach_to_parent(&mut cx, &mut obj, None);
        assert_eq!(
            cx.graph.prop_by_path("e1", "attrs/line/sourceMarker"),
            Some(json!({"name": "circle"}))
        );
    }
}
