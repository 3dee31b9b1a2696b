use crate::attrs::{AttrMap, Split, split};
use crate::config::{GraphOptions, ReconcilerConfig};
use crate::error::{Error, Result};
use crate::events::{Disposer, bind};
use crate::factory::FactoryRegistry;
use crate::graph::GraphModel;
use crate::identity::{IdentityTable, ROOT_SCOPE, stamp};
use crate::live::LiveId;
use crate::renderer::Dispatcher;
use crate::vtree::{KeyedDiffer, VNode};
use std::time::Instant;
use tracing::debug;

const SURFACE_PREFIX: &str = "graft-surface-";

struct MountedRoot<G: GraphModel> {
    dispatcher: Dispatcher<G>,
    differ: KeyedDiffer<LiveId>,
    root_events: Disposer,
    options: GraphOptions,
}

enum RootState<G: GraphModel> {
    Unmounted,
    Mounted(Box<MountedRoot<G>>),
    Finished,
}

/// Owns one graph model and keeps it in sync with a declarative tree.
///
/// A root mounts once. After `unmount` it cannot be mounted again.
pub struct GraphRoot<G: GraphModel> {
    config: ReconcilerConfig,
    registry: Option<FactoryRegistry>,
    identities: IdentityTable,
    state: RootState<G>,
}

impl<G: GraphModel> GraphRoot<G> {
    /// Unmounted root with the built-in factories.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self::with_registry(config, FactoryRegistry::with_builtins())
    }

    /// Unmounted root using `registry` instead of the built-in factories.
    pub fn with_registry(config: ReconcilerConfig, registry: FactoryRegistry) -> Self {
        Self {
            config,
            registry: Some(registry),
            identities: IdentityTable::new(),
            state: RootState::Unmounted,
        }
    }

    /// Factory registry, available until the root mounts.
    pub fn registry_mut(&mut self) -> Option<&mut FactoryRegistry> {
        self.registry.as_mut()
    }

    /// Build the graph model from the root attributes and render `children`.
    ///
    /// Root properties become [`GraphOptions`]; root `on<Event>` handlers are
    /// bound on the model's bus for every cell.
    pub fn mount<F>(&mut self, attrs: &AttrMap, children: Vec<VNode>, build: F) -> Result<()>
    where
        F: FnOnce(&GraphOptions) -> G,
    {
        match self.state {
            RootState::Unmounted => {}
            RootState::Mounted(_) => return Err(Error::AlreadyMounted),
            RootState::Finished => return Err(Error::Finished),
        }

        let Split { props, events } = split(attrs);
        let mut options = GraphOptions::from_props(&props)?;
        if options.container.is_none() {
            options.container = Some(format!("{SURFACE_PREFIX}{}", uuid::Uuid::new_v4()));
        }

        let graph = build(&options);
        let root_events = bind(None, &events, &graph.events());
        let registry = self
            .registry
            .take()
            .unwrap_or_else(FactoryRegistry::with_builtins);
        let dispatcher = Dispatcher::new(graph, registry, &self.config);
        debug!(
            container = options.container.as_deref().unwrap_or_default(),
            width = options.width,
            height = options.height,
            "graph root mounted"
        );

        self.state = RootState::Mounted(Box::new(MountedRoot {
            dispatcher,
            differ: KeyedDiffer::new(),
            root_events,
            options,
        }));
        self.render(children)
    }

    /// Submit the next tree. Only the difference to the previous tree reaches
    /// the model.
    pub fn render(&mut self, mut children: Vec<VNode>) -> Result<()> {
        let mounted = match &mut self.state {
            RootState::Mounted(mounted) => mounted,
            RootState::Unmounted => return Err(Error::NotMounted),
            RootState::Finished => return Err(Error::Finished),
        };
        stamp(&mut self.identities, ROOT_SCOPE, &mut children);
        self.identities.sweep();
        mounted.differ.render(&mut mounted.dispatcher, &children);
        if self.config.flush_on_commit {
            mounted.dispatcher.flush();
        }
        Ok(())
    }

    /// Apply every pending patch now.
    pub fn flush(&mut self) -> Result<usize> {
        Ok(self.mounted_mut()?.dispatcher.flush())
    }

    /// Apply patches whose deadline passed. For hosts that drive their own
    /// event loop with `flush_on_commit` turned off.
    pub fn tick(&mut self, now: Instant) -> Result<usize> {
        Ok(self.mounted_mut()?.dispatcher.tick(now))
    }

    /// Dispose every live object, subscription and the model itself.
    pub fn unmount(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, RootState::Finished) {
            RootState::Mounted(mut mounted) => {
                mounted.root_events.dispose();
                mounted.differ.clear();
                mounted.dispatcher.dispose();
                self.identities.clear();
                debug!("graph root unmounted");
                Ok(())
            }
            RootState::Unmounted => {
                self.state = RootState::Unmounted;
                Err(Error::NotMounted)
            }
            RootState::Finished => Err(Error::Finished),
        }
    }

    /// Whether the root currently owns a graph.
    pub fn is_mounted(&self) -> bool {
        matches!(self.state, RootState::Mounted(_))
    }

    /// The mounted graph.
    pub fn graph(&self) -> Option<&G> {
        self.mounted().map(|m| m.dispatcher.graph())
    }

    /// Mutable access to the mounted graph.
    pub fn graph_mut(&mut self) -> Option<&mut G> {
        match &mut self.state {
            RootState::Mounted(mounted) => Some(mounted.dispatcher.graph_mut()),
            _ => None,
        }
    }

    /// The mounted dispatcher.
    pub fn dispatcher(&self) -> Option<&Dispatcher<G>> {
        self.mounted().map(|m| &m.dispatcher)
    }

    /// Options the graph was mounted with.
    pub fn options(&self) -> Option<&GraphOptions> {
        self.mounted().map(|m| &m.options)
    }

    /// Identity tokens of the current tree.
    pub fn identities(&self) -> &IdentityTable {
        &self.identities
    }

    fn mounted(&self) -> Option<&MountedRoot<G>> {
        match &self.state {
            RootState::Mounted(mounted) => Some(mounted),
            _ => None,
        }
    }

    fn mounted_mut(&mut self) -> Result<&mut MountedRoot<G>> {
        match &mut self.state {
            RootState::Mounted(mounted) => Ok(mounted),
            RootState::Unmounted => Err(Error::NotMounted),
            RootState::Finished => Err(Error::Finished),
        }
    }
}

impl<G: GraphModel> Drop for GraphRoot<G> {
    fn drop(&mut self) {
        if self.is_mounted() {
            let _ = self.unmount();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::Attr;
    use crate::graph::MemoryGraph;
    use crate::vtree::components::shape;
    use serde_json::json;

    fn root() -> GraphRoot<MemoryGraph> {
        GraphRoot::new(ReconcilerConfig::default())
    }

    #[test]
    fn test_mount_derives_options() {
        let mut root = root();
        let mut attrs = AttrMap::new();
        attrs.insert("width".into(), Attr::Value(json!(1024)));
        attrs.insert("grid".into(), Attr::Value(json!(true)));

        root.mount(&attrs, vec![], MemoryGraph::new).unwrap();
        let options = root.options().unwrap();
        assert_eq!(options.width, 1024.0);
        assert_eq!(options.height, 600.0);
        assert_eq!(options.extra.get("grid"), Some(&json!(true)));
        assert!(
            options
                .container
                .as_deref()
                .is_some_and(|c| c.starts_with(SURFACE_PREFIX))
        );
        assert_eq!(root.graph().unwrap().options(), options);
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut root = root();
        assert!(matches!(root.render(vec![]), Err(Error::NotMounted)));
        assert!(matches!(root.unmount(), Err(Error::NotMounted)));

        root.mount(&AttrMap::new(), vec![shape().id("n1")], MemoryGraph::new)
            .unwrap();
        assert!(root.is_mounted());
        assert!(matches!(
            root.mount(&AttrMap::new(), vec![], MemoryGraph::new),
            Err(Error::AlreadyMounted)
        ));

        root.unmount().unwrap();
        assert!(root.graph().is_none());
        assert!(matches!(
            root.mount(&AttrMap::new(), vec![], MemoryGraph::new),
            Err(Error::Finished)
        ));
        assert!(matches!(root.flush(), Err(Error::Finished)));
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let mut root = root();
        let mut attrs = AttrMap::new();
        attrs.insert("width".into(), Attr::Value(json!("wide")));
        assert!(matches!(
            root.mount(&attrs, vec![], MemoryGraph::new),
            Err(Error::Options(_))
        ));
        assert!(!root.is_mounted());
    }
}
