//! Live model objects: what a factory built for one declarative node.

mod arena;

pub use arena::{LiveArena, LiveId};

use crate::attrs::{AttrMap, Name, PropMap};
use crate::events::Disposer;
use crate::factory::{ListSlot, NamedSlot};
use crate::graph::{CellId, CellKind, Plugin};
use crate::identity::IdentityKey;
use crate::renderer::Parent;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Cell that hosts a list entry or a named slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    /// Live object of the owning cell; `None` when the owner was resolved by
    /// id and is not managed by this tree.
    pub live: Option<LiveId>,
    pub cell: CellId,
}

#[derive(Debug, Clone)]
pub struct CellState {
    pub id: CellId,
    pub kind: CellKind,
    /// Parent id from the `parent` property, if any.
    pub declared_parent: Option<CellId>,
    /// Cell the differ inserted this one into.
    pub nested_in: Option<CellId>,
    /// Parent the engine currently has this cell under.
    pub attached_parent: Option<CellId>,
    /// Mutable keys this object has written to the engine.
    pub written: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct EntryState {
    pub slot: ListSlot,
    /// Value of the entry's identity field.
    pub identity: Name,
    pub owner: Option<Owner>,
    pub props: PropMap,
}

#[derive(Debug, Clone)]
pub struct SlotState {
    pub slot: NamedSlot,
    pub owner: Option<Owner>,
    pub props: PropMap,
}

pub struct PluginState {
    pub plugin: Rc<dyn Plugin>,
    pub installed: bool,
}

pub enum LiveState {
    Cell(CellState),
    Entry(EntryState),
    Slot(SlotState),
    Plugin(PluginState),
}

pub struct LiveObject {
    pub kind: Name,
    pub key: Option<IdentityKey>,
    /// Accumulated declarative attributes, including coalesced patches.
    pub declared: AttrMap,
    /// Where the differ inserted this object.
    pub container: Option<Parent<LiveId>>,
    /// Objects the differ inserted into this one.
    pub children: Vec<LiveId>,
    pub subscriptions: Disposer,
    pub state: LiveState,
}

impl LiveObject {
    pub fn new(
        kind: &str,
        key: Option<&IdentityKey>,
        declared: AttrMap,
        subscriptions: Disposer,
        state: LiveState,
    ) -> Self {
        Self {
            kind: kind.into(),
            key: key.cloned(),
            declared,
            container: None,
            children: Vec::new(),
            subscriptions,
            state,
        }
    }

    /// Engine id when this object is a cell.
    pub fn cell_id(&self) -> Option<&CellId> {
        match &self.state {
            LiveState::Cell(cell) => Some(&cell.id),
            _ => None,
        }
    }

    /// Owning cell of a list entry or named slot.
    pub fn owner(&self) -> Option<&Owner> {
        match &self.state {
            LiveState::Entry(entry) => entry.owner.as_ref(),
            LiveState::Slot(slot) => slot.owner.as_ref(),
            _ => None,
        }
    }

    /// Live object this one was inserted into.
    pub fn container_id(&self) -> Option<LiveId> {
        match self.container {
            Some(Parent::Element(id)) => Some(id),
            _ => None,
        }
    }
}
