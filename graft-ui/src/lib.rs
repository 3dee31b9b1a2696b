//! Reconciler that keeps a diagram model in sync with a declarative tree.
//!
//! Applications describe shapes, connectors, labels, ports, decorations and
//! plugins as [`VNode`] trees and hand them to a [`GraphRoot`]. The root
//! stamps stable identities on the tree, diffs it against the previous one
//! and drives a [`Dispatcher`], which turns every create/insert/remove/patch
//! into calls on a [`GraphModel`].

pub mod attrs;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod graph;
pub mod identity;
pub mod live;
pub mod renderer;
pub mod root;
pub mod scheduler;
pub mod vtree;

pub use attrs::{Attr, AttrMap, PropMap};
pub use config::{GraphOptions, ReconcilerConfig};
pub use error::{Error, Result};
pub use events::{CellEvent, EventBus};
pub use factory::{EntityFactory, FactoryRegistry};
pub use graph::{GraphModel, MemoryGraph, Plugin};
pub use renderer::{Dispatcher, Parent, RendererBackend};
pub use root::GraphRoot;
pub use vtree::{KeyedDiffer, VNode, components};
