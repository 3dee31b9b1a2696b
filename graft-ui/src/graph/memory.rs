use super::path::{get_path, remove_path, set_path};
use super::{CellId, CellKind, GraphModel, ID_KEY, PARENT_KEY, Plugin, REMOVED_EVENT, SHAPE_KEY};
use crate::attrs::PropMap;
use crate::config::GraphOptions;
use crate::events::{EventBus, qualified_name};
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::rc::Rc;
use tracing::{debug, warn};

const CHILDREN_KEY: &str = "children";

#[derive(Debug, Clone)]
struct MemoryCell {
    kind: CellKind,
    props: PropMap,
}

/// In-memory graph engine.
///
/// Keeps cells as plain property maps and reports changes on its bus. It
/// does no layout or drawing; it exists so the reconciler can run and be
/// inspected without a real diagram engine behind it.
pub struct MemoryGraph {
    options: GraphOptions,
    cells: IndexMap<CellId, MemoryCell>,
    plugins: Vec<Rc<dyn Plugin>>,
    bus: Rc<EventBus>,
    disposed: bool,
}

impl MemoryGraph {
    pub fn new(options: &GraphOptions) -> Self {
        Self {
            options: options.clone(),
            cells: IndexMap::new(),
            plugins: Vec::new(),
            bus: Rc::new(EventBus::new()),
            disposed: false,
        }
    }

    /// Options the graph was created with.
    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    /// Cell ids in insertion order.
    pub fn cell_ids(&self) -> Vec<CellId> {
        self.cells.keys().cloned().collect()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Kind of the cell `id`.
    pub fn kind(&self, id: &str) -> Option<CellKind> {
        self.cells.get(id).map(|c| c.kind)
    }

    /// Parent the cell `id` is embedded in.
    pub fn parent_of(&self, id: &str) -> Option<CellId> {
        self.cells
            .get(id)?
            .props
            .get(PARENT_KEY)
            .and_then(Value::as_str)
            .map(Into::into)
    }

    /// Names of installed plugins, in install order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// Whether `dispose` has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn emit(&self, event: &str, cell: &str, data: Value) {
        self.bus.emit(&qualified_name(event), Some(cell), data);
    }

    /// Cell id of an edge endpoint, either `"n1"` or `{ "cell": "n1", .. }`.
    fn endpoint(value: Option<&Value>) -> Option<&str> {
        match value? {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("cell").and_then(Value::as_str),
            _ => None,
        }
    }

    /// `id` plus every cell that goes away with it: descendants, then edges
    /// attached to any of those.
    fn removal_set(&self, id: &str) -> Vec<CellId> {
        let mut doomed: Vec<CellId> = vec![id.into()];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor].clone();
            for (child, cell) in &self.cells {
                let is_child =
                    cell.props.get(PARENT_KEY).and_then(Value::as_str) == Some(current.as_str());
                if is_child && !doomed.contains(child) {
                    doomed.push(child.clone());
                }
            }
            cursor += 1;
        }
        for (edge, cell) in &self.cells {
            if cell.kind != CellKind::Edge || doomed.contains(edge) {
                continue;
            }
            let source = Self::endpoint(cell.props.get("source"));
            let target = Self::endpoint(cell.props.get("target"));
            let dangling = [source, target]
                .into_iter()
                .flatten()
                .any(|end| doomed.iter().any(|d| d.as_str() == end));
            if dangling {
                doomed.push(edge.clone());
            }
        }
        doomed
    }

    fn detach_from_parent(&mut self, child: &str) {
        let Some(parent) = self.parent_of(child) else {
            return;
        };
        if let Some(Value::Array(children)) = self
            .cells
            .get_mut(parent.as_str())
            .and_then(|p| p.props.get_mut(CHILDREN_KEY))
        {
            children.retain(|c| c.as_str() != Some(child));
        }
    }
}

impl GraphModel for MemoryGraph {
    fn canonical_props(&self, kind: CellKind, props: &PropMap) -> PropMap {
        let mut canonical = props.clone();
        canonical
            .entry(SHAPE_KEY)
            .or_insert_with(|| Value::String(kind.default_shape().to_string()));
        canonical
    }

    fn add_cell(&mut self, kind: CellKind, props: PropMap) -> CellId {
        let mut props = self.canonical_props(kind, &props);
        let id: CellId = match props.get(ID_KEY).and_then(super::value_to_id) {
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string().into(),
        };
        props.insert(ID_KEY.to_string(), Value::String(id.to_string()));
        if self.cells.contains_key(id.as_str()) {
            warn!(cell = %id, "duplicate cell id, replacing existing cell");
            self.cells.shift_remove(id.as_str());
        }
        self.cells.insert(id.clone(), MemoryCell { kind, props });
        self.emit("added", &id, Value::Null);
        id
    }

    fn remove_cell(&mut self, id: &str) -> bool {
        if !self.cells.contains_key(id) {
            return false;
        }
        let doomed = self.removal_set(id);
        self.detach_from_parent(id);
        for cell in &doomed {
            self.cells.shift_remove(cell.as_str());
        }
        debug!(cell = id, cascade = doomed.len() - 1, "cell removed");
        for cell in &doomed {
            let implicit = cell.as_str() != id;
            self.emit(REMOVED_EVENT, cell, json!({ "implicit": implicit }));
        }
        true
    }

    fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    fn add_child(&mut self, parent: &str, child: &str) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        self.detach_from_parent(child);
        if let Some(cell) = self.cells.get_mut(child) {
            cell.props
                .insert(PARENT_KEY.to_string(), Value::String(parent.to_string()));
        }
        if let Some(cell) = self.cells.get_mut(parent) {
            let children = cell
                .props
                .entry(CHILDREN_KEY)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(children) = children {
                children.push(Value::String(child.to_string()));
            }
        }
        self.emit("change:parent", child, json!({ "current": parent }));
        true
    }

    fn props(&self, id: &str) -> Option<PropMap> {
        self.cells.get(id).map(|c| c.props.clone())
    }

    fn prop(&self, id: &str, key: &str) -> Option<Value> {
        self.cells.get(id)?.props.get(key).cloned()
    }

    fn set_prop(&mut self, id: &str, key: &str, value: Value) {
        let Some(cell) = self.cells.get_mut(id) else {
            return;
        };
        let previous = cell.props.insert(key.to_string(), value.clone());
        if previous.as_ref() != Some(&value) {
            self.emit(
                &format!("change:{key}"),
                id,
                json!({ "current": value, "previous": previous }),
            );
        }
    }

    fn remove_prop(&mut self, id: &str, key: &str) {
        let Some(cell) = self.cells.get_mut(id) else {
            return;
        };
        if let Some(previous) = cell.props.remove(key) {
            self.emit(
                &format!("change:{key}"),
                id,
                json!({ "current": null, "previous": previous }),
            );
        }
    }

    fn prop_by_path(&self, id: &str, path: &str) -> Option<Value> {
        get_path(&self.cells.get(id)?.props, path).cloned()
    }

    fn set_prop_by_path(&mut self, id: &str, path: &str, value: Value) {
        let Some(cell) = self.cells.get_mut(id) else {
            return;
        };
        set_path(&mut cell.props, path, value);
        let root = path.split('/').find(|s| !s.is_empty()).unwrap_or(path);
        self.emit(&format!("change:{root}"), id, json!({ "path": path }));
    }

    fn remove_prop_by_path(&mut self, id: &str, path: &str) {
        let Some(cell) = self.cells.get_mut(id) else {
            return;
        };
        if remove_path(&mut cell.props, path).is_some() {
            let root = path.split('/').find(|s| !s.is_empty()).unwrap_or(path);
            self.emit(&format!("change:{root}"), id, json!({ "path": path }));
        }
    }

    fn use_plugin(&mut self, plugin: Rc<dyn Plugin>) {
        debug!(plugin = plugin.name(), "plugin installed");
        self.plugins.push(plugin);
    }

    fn remove_plugin(&mut self, plugin: &Rc<dyn Plugin>) -> bool {
        let before = self.plugins.len();
        self.plugins
            .retain(|installed| !std::ptr::addr_eq(Rc::as_ptr(installed), Rc::as_ptr(plugin)));
        let removed = self.plugins.len() != before;
        if removed {
            debug!(plugin = plugin.name(), "plugin uninstalled");
        }
        removed
    }

    fn events(&self) -> Rc<EventBus> {
        self.bus.clone()
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for plugin in self.plugins.drain(..) {
            plugin.dispose();
        }
        self.cells.clear();
        self.bus.clear();
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CellEvent;
    use std::cell::RefCell;

    fn props(value: Value) -> PropMap {
        value.as_object().cloned().unwrap()
    }

    fn graph() -> MemoryGraph {
        MemoryGraph::new(&GraphOptions::default())
    }

    #[test]
    fn test_add_cell_uses_explicit_id() {
        let mut g = graph();
        let id = g.add_cell(CellKind::Node, props(json!({ "id": "n1", "x": 10 })));
        assert_eq!(id.as_str(), "n1");
        assert_eq!(g.prop("n1", "shape"), Some(json!("rect")));
        assert_eq!(g.prop("n1", "x"), Some(json!(10)));
    }

    #[test]
    fn test_add_cell_generates_id() {
        let mut g = graph();
        let a = g.add_cell(CellKind::Edge, PropMap::new());
        let b = g.add_cell(CellKind::Edge, PropMap::new());
        assert_ne!(a, b);
        assert_eq!(g.len(), 2);
        assert_eq!(g.kind(&a), Some(CellKind::Edge));
    }

    #[test]
    fn test_remove_node_drops_attached_edges_and_children() {
        let mut g = graph();
        g.add_cell(CellKind::Node, props(json!({ "id": "n1" })));
        g.add_cell(CellKind::Node, props(json!({ "id": "n2" })));
        g.add_cell(CellKind::Node, props(json!({ "id": "inner" })));
        g.add_cell(
            CellKind::Edge,
            props(json!({ "id": "e1", "source": "n1", "target": { "cell": "n2" } })),
        );
        assert!(g.add_child("n1", "inner"));

        let removed = Rc::new(RefCell::new(Vec::new()));
        let log = removed.clone();
        g.events().on(
            &qualified_name(REMOVED_EVENT),
            Rc::new(move |e: &CellEvent| log.borrow_mut().push(e.cell.clone().unwrap())),
        );

        assert!(g.remove_cell("n1"));
        assert!(!g.remove_cell("n1"));
        assert_eq!(g.cell_ids(), vec![CellId::from("n2")]);
        assert_eq!(
            *removed.borrow(),
            vec![CellId::from("n1"), CellId::from("inner"), CellId::from("e1")]
        );
    }

    #[test]
    fn test_add_child_moves_between_parents() {
        let mut g = graph();
        for id in ["a", "b", "c"] {
            g.add_cell(CellKind::Node, props(json!({ "id": id })));
        }
        assert!(g.add_child("a", "c"));
        assert!(g.add_child("b", "c"));
        assert!(!g.add_child("c", "c"));
        assert!(!g.add_child("missing", "c"));

        assert_eq!(g.parent_of("c"), Some(CellId::from("b")));
        assert_eq!(g.prop("a", "children"), Some(json!([])));
        assert_eq!(g.prop("b", "children"), Some(json!(["c"])));
    }

    #[test]
    fn test_set_prop_reports_changes_only() {
        let mut g = graph();
        g.add_cell(CellKind::Node, props(json!({ "id": "n1", "x": 1 })));
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        g.events().on(
            "cell:change:x",
            Rc::new(move |_: &CellEvent| *counter.borrow_mut() += 1),
        );

        g.set_prop("n1", "x", json!(1));
        g.set_prop("n1", "x", json!(2));
        g.remove_prop("n1", "x");
        g.remove_prop("n1", "x");
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn test_list_accessors_use_paths() {
        let mut g = graph();
        g.add_cell(CellKind::Node, props(json!({ "id": "n1" })));
        g.set_ports("n1", vec![json!({ "id": "p1" })]);
        g.set_labels("n1", vec![json!({ "text": "hi" })]);

        assert_eq!(g.prop_by_path("n1", "ports/items/0/id"), Some(json!("p1")));
        assert_eq!(g.labels("n1"), vec![json!({ "text": "hi" })]);
        assert!(g.tools("n1").is_empty());
    }

    struct Counting {
        bus: Rc<EventBus>,
        disposed: Rc<RefCell<usize>>,
    }

    impl Plugin for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn events(&self) -> Rc<EventBus> {
            self.bus.clone()
        }

        fn dispose(&self) {
            *self.disposed.borrow_mut() += 1;
        }
    }

    #[test]
    fn test_removed_plugin_is_not_disposed_by_the_graph() {
        let mut g = graph();
        let disposed = Rc::new(RefCell::new(0));
        let plugin: Rc<dyn Plugin> = Rc::new(Counting {
            bus: Rc::new(EventBus::new()),
            disposed: disposed.clone(),
        });
        g.use_plugin(plugin.clone());
        assert_eq!(g.plugin_names(), vec!["counting".to_string()]);

        assert!(g.remove_plugin(&plugin));
        assert!(!g.remove_plugin(&plugin));
        assert!(g.plugin_names().is_empty());

        g.dispose();
        assert_eq!(*disposed.borrow(), 0);
    }

    #[test]
    fn test_dispose_clears_everything() {
        let mut g = graph();
        g.add_cell(CellKind::Node, props(json!({ "id": "n1" })));
        g.events().on("cell:click", Rc::new(|_: &CellEvent| {}));

        g.dispose();
        assert!(g.is_disposed());
        assert!(g.is_empty());
        assert!(g.events().is_empty());
    }
}
