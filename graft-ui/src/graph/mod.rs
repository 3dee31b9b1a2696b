mod memory;
mod path;

pub use memory::MemoryGraph;
pub use path::{get_path, remove_path, set_path};

use crate::attrs::{Name, PropMap};
use crate::events::EventBus;
use serde_json::Value;
use std::rc::Rc;

/// Identifier of a cell inside the graph engine.
pub type CellId = Name;

pub const ID_KEY: &str = "id";
pub const PARENT_KEY: &str = "parent";
pub const SHAPE_KEY: &str = "shape";

/// Keys fixed at creation; patches never rewrite them.
pub const IMMUTABLE_KEYS: [&str; 3] = [ID_KEY, PARENT_KEY, SHAPE_KEY];

pub const LABELS_PATH: &str = "labels";
pub const PORTS_PATH: &str = "ports/items";
pub const TOOLS_PATH: &str = "tools";

/// Reported by the engine for every cell it removes, including cells it
/// removes on its own (children of a removed node, connectors whose endpoint
/// vanished).
pub const REMOVED_EVENT: &str = "removed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Node,
    Edge,
}

impl CellKind {
    /// Engine shape used when none is declared.
    pub fn default_shape(self) -> &'static str {
        match self {
            CellKind::Node => "rect",
            CellKind::Edge => "edge",
        }
    }
}

/// Keys fixed at creation; changing one re-creates the cell.
pub fn is_immutable(key: &str) -> bool {
    IMMUTABLE_KEYS.contains(&key)
}

/// String form of an id-like property value.
pub fn value_to_id(value: &Value) -> Option<CellId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.as_str().into()),
        Value::Number(n) => Some(n.to_string().into()),
        _ => None,
    }
}

/// Behaviour plugin installed on a graph model.
pub trait Plugin {
    fn name(&self) -> &str;

    /// Bus the plugin reports its own events on.
    fn events(&self) -> Rc<EventBus>;

    /// Receive updated options after a declarative patch.
    fn set_options(&self, _options: &PropMap) {}

    fn dispose(&self);
}

/// Capabilities the reconciler needs from a graph engine.
///
/// Cells are addressed by id; the engine owns their storage, their
/// parent/child cascade and the removal of connectors whose endpoints go
/// away.
pub trait GraphModel {
    /// Canonical property set of a throwaway cell built from `props`.
    /// The cell is not added to the model.
    fn canonical_props(&self, kind: CellKind, props: &PropMap) -> PropMap;

    /// Add a new cell and return its id (the `id` property when given).
    fn add_cell(&mut self, kind: CellKind, props: PropMap) -> CellId;

    /// Remove a cell. Returns false when the cell did not exist.
    fn remove_cell(&mut self, id: &str) -> bool;

    fn contains(&self, id: &str) -> bool;

    fn add_child(&mut self, parent: &str, child: &str) -> bool;

    fn props(&self, id: &str) -> Option<PropMap>;

    fn prop(&self, id: &str, key: &str) -> Option<Value> {
        self.props(id)?.get(key).cloned()
    }

    fn set_prop(&mut self, id: &str, key: &str, value: Value);

    fn remove_prop(&mut self, id: &str, key: &str);

    fn prop_by_path(&self, id: &str, path: &str) -> Option<Value>;

    fn set_prop_by_path(&mut self, id: &str, path: &str, value: Value);

    fn remove_prop_by_path(&mut self, id: &str, path: &str);

    fn labels(&self, id: &str) -> Vec<Value> {
        list_at(self.prop_by_path(id, LABELS_PATH))
    }

    fn set_labels(&mut self, id: &str, labels: Vec<Value>) {
        self.set_prop_by_path(id, LABELS_PATH, Value::Array(labels));
    }

    fn ports(&self, id: &str) -> Vec<Value> {
        list_at(self.prop_by_path(id, PORTS_PATH))
    }

    fn set_ports(&mut self, id: &str, ports: Vec<Value>) {
        self.set_prop_by_path(id, PORTS_PATH, Value::Array(ports));
    }

    fn tools(&self, id: &str) -> Vec<Value> {
        list_at(self.prop_by_path(id, TOOLS_PATH))
    }

    fn set_tools(&mut self, id: &str, tools: Vec<Value>) {
        self.set_prop_by_path(id, TOOLS_PATH, Value::Array(tools));
    }

    fn use_plugin(&mut self, plugin: Rc<dyn Plugin>);

    /// Uninstall `plugin` without disposing it. Returns false when it was
    /// not installed.
    fn remove_plugin(&mut self, plugin: &Rc<dyn Plugin>) -> bool;

    fn events(&self) -> Rc<EventBus>;

    /// Release every cell, plugin and subscription of the model.
    fn dispose(&mut self);
}

fn list_at(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}
