use super::{EntityFactory, FactoryCx};
use crate::attrs::{AttrMap, Split, split};
use crate::events::bind;
use crate::graph::{CellKind, PARENT_KEY, is_immutable, value_to_id};
use crate::identity::IdentityKey;
use crate::live::{CellState, LiveObject, LiveState, Owner};
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Shapes and connectors: first-class engine cells.
pub struct CellFactory {
    kind: CellKind,
}

impl CellFactory {
    pub fn new(kind: CellKind) -> Self {
        Self { kind }
    }

    /// Attach to the declared parent, or to the cell this one was nested in.
    /// A parent the engine does not know yet is skipped; the next patch tries
    /// again.
    fn attach(cx: &mut FactoryCx<'_>, state: &mut CellState) {
        let Some(parent) = state
            .declared_parent
            .clone()
            .or_else(|| state.nested_in.clone())
        else {
            return;
        };
        if state.attached_parent.as_ref() == Some(&parent) {
            return;
        }
        if cx.graph.contains(&parent) && cx.graph.add_child(&parent, &state.id) {
            trace!(cell = %state.id, %parent, "attached to parent");
            state.attached_parent = Some(parent);
        } else {
            debug!(cell = %state.id, %parent, "parent not resolvable, attachment deferred");
        }
    }
}

impl EntityFactory for CellFactory {
    fn create(
        &self,
        cx: &mut FactoryCx<'_>,
        kind: &str,
        key: Option<&IdentityKey>,
        attrs: &AttrMap,
    ) -> Option<LiveObject> {
        let Split { mut props, events } = split(attrs);
        let declared_parent = props.remove(PARENT_KEY).as_ref().and_then(value_to_id);
        let written: BTreeSet<String> = props.keys().filter(|k| !is_immutable(k)).cloned().collect();

        let id = cx.graph.add_cell(self.kind, props);
        let subscriptions = bind(Some(&id), &events, &cx.graph.events());
        debug!(%kind, cell = %id, "cell created");

        Some(LiveObject::new(
            kind,
            key,
            attrs.clone(),
            subscriptions,
            LiveState::Cell(CellState {
                id,
                kind: self.kind,
                declared_parent,
                nested_in: None,
                attached_parent: None,
                written,
            }),
        ))
    }

    fn attach_to_parent(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, container: Option<Owner>) {
        let LiveState::Cell(state) = &mut obj.state else {
            return;
        };
        state.nested_in = container.map(|owner| owner.cell);
        Self::attach(cx, state);
    }

    fn patch(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, next: &Split) {
        let LiveState::Cell(state) = &mut obj.state else {
            return;
        };
        if !cx.graph.contains(&state.id) {
            trace!(cell = %state.id, "patch on a removed cell ignored");
            return;
        }

        let mut props = next.props.clone();
        state.declared_parent = props.remove(PARENT_KEY).as_ref().and_then(value_to_id);
        let canonical = cx.graph.canonical_props(state.kind, &props);
        let live = cx.graph.props(&state.id).unwrap_or_default();

        let mut changed = 0usize;
        for (key, value) in &canonical {
            if is_immutable(key) {
                continue;
            }
            if live.get(key) != Some(value) {
                cx.graph.set_prop(&state.id, key, value.clone());
                changed += 1;
            }
            state.written.insert(key.clone());
        }
        let stale: Vec<String> = state
            .written
            .iter()
            .filter(|key| !canonical.contains_key(key.as_str()))
            .cloned()
            .collect();
        for key in stale {
            cx.graph.remove_prop(&state.id, &key);
            state.written.remove(&key);
            changed += 1;
        }
        trace!(cell = %state.id, changed, "cell patched");

        Self::attach(cx, state);

        obj.subscriptions.dispose();
        obj.subscriptions = bind(Some(&state.id), &next.events, &cx.graph.events());
    }

    fn remove(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject) {
        obj.subscriptions.dispose();
        if let LiveState::Cell(state) = &obj.state {
            if cx.graph.remove_cell(&state.id) {
                debug!(cell = %state.id, "cell removed");
            }
        }
    }
}
