//! One factory per declarative kind, each owning the lifecycle of the live
//! objects it builds.

mod cell;
mod list;
mod plugin;
mod slot;

pub use cell::CellFactory;
pub use list::{ListFactory, ListSlot};
pub use plugin::{PluginCtor, PluginFactory};
pub use slot::{NamedSlot, SlotFactory};

use crate::attrs::{AttrMap, PropMap, Split};
use crate::graph::{CellId, CellKind, GraphModel, PARENT_KEY, Plugin, value_to_id};
use crate::identity::IdentityKey;
use crate::live::{LiveId, LiveObject, Owner};
use crate::vtree::components;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// What a factory may touch while it works: the engine and the index of
/// cells this tree manages.
pub struct FactoryCx<'a> {
    pub graph: &'a mut dyn GraphModel,
    pub cells: &'a FxHashMap<CellId, LiveId>,
}

impl<'a> FactoryCx<'a> {
    pub fn new(graph: &'a mut dyn GraphModel, cells: &'a FxHashMap<CellId, LiveId>) -> Self {
        Self { graph, cells }
    }

    /// Owner for a declared `parent` id, if the engine has that cell.
    pub fn owner_of_cell(&self, id: &str) -> Option<Owner> {
        if !self.graph.contains(id) {
            return None;
        }
        Some(Owner {
            live: self.cells.get(id).copied(),
            cell: id.into(),
        })
    }
}

/// Declared `parent` of an attribute bag, as a cell id.
pub(crate) fn declared_parent(split: &Split) -> Option<CellId> {
    split.props.get(PARENT_KEY).and_then(value_to_id)
}

/// Lifecycle of one kind of live object.
///
/// Every method must tolerate an object whose engine counterpart is gone.
pub trait EntityFactory {
    /// Build the object. Cells are added to the engine here; list entries and
    /// slots wait for `attach_to_parent`.
    fn create(
        &self,
        cx: &mut FactoryCx<'_>,
        kind: &str,
        key: Option<&IdentityKey>,
        attrs: &AttrMap,
    ) -> Option<LiveObject>;

    /// `container` is the owning cell of the object the differ inserted this
    /// one into, if any.
    fn attach_to_parent(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, container: Option<Owner>);

    /// Apply the full declared attribute set after a coalesced update.
    fn patch(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, next: &Split);

    fn remove(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject);

    /// The owner of this object finished a patch.
    fn settle(&self, _cx: &mut FactoryCx<'_>, _obj: &mut LiveObject) {}
}

/// Factories by kind tag.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: FxHashMap<String, Rc<dyn EntityFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in component kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let node: Rc<dyn EntityFactory> = Rc::new(CellFactory::new(CellKind::Node));
        let edge: Rc<dyn EntityFactory> = Rc::new(CellFactory::new(CellKind::Edge));
        registry.insert(components::SHAPE, node.clone());
        registry.insert(components::NODE, node);
        registry.insert(components::CONNECTOR, edge.clone());
        registry.insert(components::EDGE, edge);

        let tools: Rc<dyn EntityFactory> = Rc::new(ListFactory::new(ListSlot::Tools));
        registry.insert(components::LABEL, Rc::new(ListFactory::new(ListSlot::Labels)));
        registry.insert(components::PORT, Rc::new(ListFactory::new(ListSlot::Ports)));
        registry.insert(components::SHAPE_TOOL, tools.clone());
        registry.insert(components::CONNECTOR_TOOL, tools);

        registry.insert(components::SOURCE_DECORATION, Rc::new(SlotFactory::source_marker()));
        registry.insert(components::TARGET_DECORATION, Rc::new(SlotFactory::target_marker()));
        registry.insert(components::PORT_GROUP, Rc::new(SlotFactory::port_group()));
        registry
    }

    fn insert(&mut self, kind: &str, factory: Rc<dyn EntityFactory>) {
        self.factories.insert(kind.to_string(), factory);
    }

    /// Register or replace the factory for `kind`.
    pub fn register(&mut self, kind: &str, factory: impl EntityFactory + 'static) {
        self.insert(kind, Rc::new(factory));
    }

    /// Register a behaviour plugin under `kind`. `ctor` receives the
    /// plugin's options, `enabled` included.
    pub fn register_plugin<F>(&mut self, kind: &str, ctor: F)
    where
        F: Fn(&PropMap) -> Rc<dyn Plugin> + 'static,
    {
        self.insert(kind, Rc::new(PluginFactory::new(Rc::new(ctor))));
    }

    /// Factory registered for `kind`.
    pub fn get(&self, kind: &str) -> Option<Rc<dyn EntityFactory>> {
        self.factories.get(kind).cloned()
    }

    /// Whether a factory is registered for `kind`.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}
