use super::{Parent, RendererBackend};
use crate::attrs::{Attr, AttrMap, EventMap, split};
use crate::config::ReconcilerConfig;
use crate::events::{CellEvent, Disposer, RemovalQueue, bind};
use crate::factory::{EntityFactory, FactoryCx, FactoryRegistry};
use crate::graph::{CellId, GraphModel, REMOVED_EVENT};
use crate::identity::IdentityKey;
use crate::live::{LiveArena, LiveId, LiveObject, LiveState, Owner};
use crate::scheduler::{Coalescer, PatchBatch};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, trace};

/// Renderer backend over a graph model.
///
/// Each operation looks up the factory registered for the object's kind and
/// delegates to it. Attribute writes go through the coalescer and are applied
/// on `flush`/`tick`. Cells the engine removes on its own are reported on its
/// bus, queued, and invalidated after the operation that caused them.
pub struct Dispatcher<G: GraphModel> {
    graph: G,
    registry: FactoryRegistry,
    objects: LiveArena,
    cells: FxHashMap<CellId, LiveId>,
    /// Objects re-materialized after their owner is patched, by owner.
    listeners: FxHashMap<LiveId, SmallVec<[LiveId; 4]>>,
    coalescer: Coalescer,
    removals: RemovalQueue,
    removal_watch: Disposer,
}

impl<G: GraphModel> Dispatcher<G> {
    pub fn new(graph: G, registry: FactoryRegistry, config: &ReconcilerConfig) -> Self {
        let removals = RemovalQueue::new();
        let queue = removals.clone();
        let mut events = EventMap::new();
        events.insert(
            REMOVED_EVENT.into(),
            Rc::new(move |event: &CellEvent| {
                if let Some(cell) = &event.cell {
                    queue.push(cell.clone());
                }
            }),
        );
        let removal_watch = bind(None, &events, &graph.events());
        Self {
            graph,
            registry,
            objects: LiveArena::new(),
            cells: FxHashMap::default(),
            listeners: FxHashMap::default(),
            coalescer: Coalescer::new(config.coalesce_delay()),
            removals,
            removal_watch,
        }
    }

    /// The engine behind this dispatcher.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Mutable access to the engine.
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Factories used to create elements.
    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    /// Live object behind `id`, if it is still live.
    pub fn object(&self, id: LiveId) -> Option<&LiveObject> {
        self.objects.get(id)
    }

    /// Live object currently holding `cell`.
    pub fn object_for_cell(&self, cell: &str) -> Option<LiveId> {
        self.cells.get(cell).copied()
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    /// Objects with patches not yet applied.
    pub fn pending_patches(&self) -> usize {
        self.coalescer.pending_count()
    }

    /// Run `f` with the object's factory and a context over the engine.
    fn with_factory<R>(
        &mut self,
        id: LiveId,
        f: impl FnOnce(&dyn EntityFactory, &mut FactoryCx<'_>, &mut LiveObject) -> R,
    ) -> Option<R> {
        let obj = self.objects.get_mut(id)?;
        let factory = self.registry.get(&obj.kind)?;
        let mut cx = FactoryCx::new(&mut self.graph, &self.cells);
        Some(f(factory.as_ref(), &mut cx, obj))
    }

    /// Owning cell for objects inserted into `container`.
    fn owner_for(&self, container: LiveId) -> Option<Owner> {
        let obj = self.objects.get(container)?;
        match obj.cell_id() {
            Some(cell) => Some(Owner {
                live: Some(container),
                cell: cell.clone(),
            }),
            None => obj.owner().cloned(),
        }
    }

    fn listen(&mut self, id: LiveId) {
        let owner = self.objects.get(id).and_then(|o| o.owner()).and_then(|o| o.live);
        if let Some(owner) = owner {
            let listeners = self.listeners.entry(owner).or_default();
            if !listeners.contains(&id) {
                listeners.push(id);
            }
        }
    }

    fn unlisten(&mut self, id: LiveId, owner: Option<LiveId>) {
        if let Some(owner) = owner {
            if let Some(listeners) = self.listeners.get_mut(&owner) {
                listeners.retain(|l| *l != id);
                if listeners.is_empty() {
                    self.listeners.remove(&owner);
                }
            }
        }
    }

    /// Apply one coalesced batch: fold it into the declared attributes, patch
    /// through the factory, then let dependents re-materialize.
    fn apply_patch(&mut self, id: LiveId, batch: PatchBatch) {
        let Some(obj) = self.objects.get_mut(id) else {
            trace!(?id, "patch for a removed object dropped");
            return;
        };
        for (key, value) in batch {
            match value {
                Some(attr) => {
                    obj.declared.insert(key, attr);
                }
                None => {
                    obj.declared.remove(&key);
                }
            }
        }
        let next = split(&obj.declared);
        let previous_owner = obj.owner().and_then(|o| o.live);

        self.with_factory(id, |factory, cx, obj| factory.patch(cx, obj, &next));

        let owner = self.objects.get(id).and_then(|o| o.owner()).and_then(|o| o.live);
        if owner != previous_owner {
            self.unlisten(id, previous_owner);
            self.listen(id);
        }
        self.process_removals();
        self.settle_dependents(id);
    }

    fn settle_dependents(&mut self, owner: LiveId) {
        let Some(dependents) = self.listeners.get(&owner).cloned() else {
            return;
        };
        for dependent in dependents {
            self.with_factory(dependent, |factory, cx, obj| factory.settle(cx, obj));
        }
    }

    /// Drop the bookkeeping of one object without touching the engine.
    fn forget(&mut self, id: LiveId) {
        let Some(mut obj) = self.objects.remove(id) else {
            return;
        };
        obj.subscriptions.dispose();
        self.coalescer.cancel(id);
        if let Some(cell) = obj.cell_id() {
            if self.cells.get(cell) == Some(&id) {
                self.cells.remove(cell);
            }
        }
        self.listeners.remove(&id);
        self.unlisten(id, obj.owner().and_then(|o| o.live));
        if let Some(container) = obj.container_id().and_then(|c| self.objects.get_mut(c)) {
            container.children.retain(|c| *c != id);
        }
    }

    /// Remove an object and everything declared under it.
    ///
    /// `gone` holds cells the engine has removed or is about to remove along
    /// with their engine children. Objects inside one of them are only
    /// forgotten; everything else goes through its factory.
    fn teardown(&mut self, id: LiveId, gone: &mut Vec<CellId>) {
        let Some(obj) = self.objects.get(id) else {
            return;
        };
        let covered = match &obj.state {
            LiveState::Cell(cell) => {
                gone.contains(&cell.id)
                    || cell.attached_parent.as_ref().is_some_and(|p| gone.contains(p))
            }
            LiveState::Entry(_) | LiveState::Slot(_) => {
                obj.owner().is_some_and(|owner| gone.contains(&owner.cell))
            }
            LiveState::Plugin(_) => false,
        };
        if let Some(cell) = obj.cell_id() {
            if !gone.contains(cell) {
                gone.push(cell.clone());
            }
        }
        let children = obj.children.clone();
        for child in children {
            self.teardown(child, gone);
        }
        if !covered {
            self.coalescer.cancel(id);
            self.with_factory(id, |factory, cx, obj| factory.remove(cx, obj));
        }
        self.forget(id);
    }

    /// Invalidate objects whose cells the engine removed without being asked.
    fn process_removals(&mut self) {
        loop {
            let removed = self.removals.drain();
            if removed.is_empty() {
                break;
            }
            for cell in removed {
                if let Some(id) = self.cells.get(&cell).copied() {
                    debug!(%cell, "cell removed by the engine, invalidating");
                    self.teardown(id, &mut vec![cell]);
                }
            }
        }
    }

    /// Apply every pending patch.
    pub fn flush(&mut self) -> usize {
        let batches = self.coalescer.take_all();
        let applied = batches.len();
        for (id, batch) in batches {
            self.apply_patch(id, batch);
        }
        applied
    }

    /// Apply patches whose deadline passed.
    pub fn tick(&mut self, now: Instant) -> usize {
        let batches = self.coalescer.take_due(now);
        let applied = batches.len();
        for (id, batch) in batches {
            self.apply_patch(id, batch);
        }
        applied
    }

    /// Earliest instant at which a pending batch is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.coalescer.next_deadline()
    }

    /// Release every live object and subscription, then dispose the model.
    pub fn dispose(&mut self) {
        for id in self.objects.ids() {
            self.forget(id);
        }
        self.listeners.clear();
        self.removal_watch.dispose();
        self.graph.dispose();
        self.removals.clear();
        debug!("dispatcher disposed");
    }
}

impl<G: GraphModel> RendererBackend for Dispatcher<G> {
    type Element = LiveId;

    fn create_element(
        &mut self,
        kind: &str,
        key: Option<&IdentityKey>,
        attrs: &AttrMap,
    ) -> Option<LiveId> {
        let Some(factory) = self.registry.get(kind) else {
            trace!(%kind, "no factory registered, node ignored");
            return None;
        };
        let obj = {
            let mut cx = FactoryCx::new(&mut self.graph, &self.cells);
            factory.create(&mut cx, kind, key, attrs)?
        };
        let cell = obj.cell_id().cloned();
        let id = self.objects.insert(obj);
        if let Some(cell) = cell {
            self.cells.insert(cell, id);
        }
        self.process_removals();
        Some(id)
    }

    fn insert(&mut self, el: &LiveId, parent: &Parent<LiveId>) {
        let id = *el;
        if !self.objects.contains(id) {
            return;
        }
        let container = match parent {
            Parent::Root => None,
            Parent::Element(p) => {
                if let Some(obj) = self.objects.get_mut(*p) {
                    obj.children.push(id);
                }
                self.owner_for(*p)
            }
        };
        if let Some(obj) = self.objects.get_mut(id) {
            obj.container = Some(*parent);
        }
        self.with_factory(id, |factory, cx, obj| factory.attach_to_parent(cx, obj, container));
        self.listen(id);
        self.process_removals();
    }

    fn remove(&mut self, el: &LiveId) {
        let id = *el;
        if !self.objects.contains(id) {
            trace!(?id, "remove on a missing object ignored");
            return;
        }
        self.teardown(id, &mut Vec::new());
        self.process_removals();
    }

    fn patch_prop(&mut self, el: &LiveId, key: &str, _prev: Option<&Attr>, next: Option<&Attr>) {
        if !self.objects.contains(*el) {
            trace!(?el, %key, "patch on a missing object ignored");
            return;
        }
        self.coalescer.schedule_patch(*el, key, next.cloned());
    }

    fn create_text(&mut self, _text: &str) -> Option<LiveId> {
        None
    }

    fn create_comment(&mut self, _text: &str) -> Option<LiveId> {
        None
    }

    fn set_text(&mut self, _el: &LiveId, _text: &str) {}

    fn set_element_text(&mut self, _el: &LiveId, _text: &str) {}

    fn parent_node(&self, el: &LiveId) -> Option<Parent<LiveId>> {
        self.objects.get(*el)?.container
    }

    fn next_sibling(&self, _el: &LiveId) -> Option<LiveId> {
        None
    }

    fn is_live(&self, el: &LiveId) -> bool {
        self.objects.contains(*el)
    }

    fn commit(&mut self) {
        self.process_removals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphOptions;
    use crate::graph::MemoryGraph;
    use serde_json::{Value, json};

    fn dispatcher() -> Dispatcher<MemoryGraph> {
        Dispatcher::new(
            MemoryGraph::new(&GraphOptions::default()),
            FactoryRegistry::with_builtins(),
            &ReconcilerConfig::default(),
        )
    }

    fn attrs(value: Value) -> AttrMap {
        value
            .as_object()
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.as_str().into(), Attr::Value(v.clone())))
            .collect()
    }

    fn value(v: Value) -> Attr {
        Attr::Value(v)
    }

    #[test]
    fn test_unknown_kind_yields_nothing() {
        let mut d = dispatcher();
        assert!(d.create_element("Fragment", None, &AttrMap::new()).is_none());
        assert_eq!(d.live_count(), 0);
    }

    #[test]
    fn test_patches_wait_for_flush() {
        let mut d = dispatcher();
        let n1 = d.create_element("Shape", None, &attrs(json!({"id": "n1", "x": 0}))).unwrap();
        d.insert(&n1, &Parent::Root);

        d.patch_prop(&n1, "x", None, Some(&value(json!(5))));
        assert_eq!(d.graph().prop("n1", "x"), Some(json!(0)));
        assert_eq!(d.pending_patches(), 1);

        assert_eq!(d.flush(), 1);
        assert_eq!(d.graph().prop("n1", "x"), Some(json!(5)));
    }

    #[test]
    fn test_tick_applies_only_due_batches() {
        let mut d = dispatcher();
        let n1 = d.create_element("Shape", None, &attrs(json!({"id": "n1"}))).unwrap();
        d.patch_prop(&n1, "x", None, Some(&value(json!(1))));

        let deadline = d.next_deadline().unwrap();
        assert_eq!(d.tick(deadline - std::time::Duration::from_micros(1)), 0);
        assert_eq!(d.tick(deadline), 1);
        assert_eq!(d.graph().prop("n1", "x"), Some(json!(1)));
    }

    #[test]
    fn test_nested_label_materializes_into_owner() {
        let mut d = dispatcher();
        let e1 = d.create_element("Connector", None, &attrs(json!({"id": "e1"}))).unwrap();
        d.insert(&e1, &Parent::Root);
        let key = IdentityKey::from("l1");
        let label = d
            .create_element("Label", Some(&key), &attrs(json!({"text": "hi"})))
            .unwrap();
        d.insert(&label, &Parent::Element(e1));

        assert_eq!(d.graph().labels("e1"), vec![json!({"key": "l1", "text": "hi"})]);
        assert_eq!(d.parent_node(&label), Some(Parent::Element(e1)));

        d.remove(&label);
        assert!(d.graph().labels("e1").is_empty());
        assert!(!d.is_live(&label));
    }

    #[test]
    fn test_removing_owner_releases_descendants() {
        let mut d = dispatcher();
        let e1 = d.create_element("Connector", None, &attrs(json!({"id": "e1"}))).unwrap();
        d.insert(&e1, &Parent::Root);
        let label = d.create_element("Label", None, &attrs(json!({"text": "x"}))).unwrap();
        d.insert(&label, &Parent::Element(e1));
        assert_eq!(d.live_count(), 2);

        d.remove(&e1);
        assert_eq!(d.live_count(), 0);
        assert!(!d.graph().contains("e1"));
        assert!(!d.is_live(&label));
    }

    #[test]
    fn test_engine_cascade_invalidates_connector() {
        let mut d = dispatcher();
        let n1 = d.create_element("Shape", None, &attrs(json!({"id": "n1"}))).unwrap();
        d.insert(&n1, &Parent::Root);
        let e1 = d
            .create_element("Connector", None, &attrs(json!({"id": "e1", "source": "n1", "target": "n1"})))
            .unwrap();
        d.insert(&e1, &Parent::Root);

        d.patch_prop(&e1, "label", None, Some(&value(json!("late"))));
        d.remove(&n1);

        assert!(!d.graph().contains("e1"));
        assert!(!d.is_live(&e1));
        assert_eq!(d.object_for_cell("e1"), None);
        assert_eq!(d.pending_patches(), 0);
        d.remove(&e1);
        d.patch_prop(&e1, "x", None, Some(&value(json!(1))));
        assert_eq!(d.flush(), 0);
    }

    #[test]
    fn test_owner_patch_resettles_entries() {
        let mut d = dispatcher();
        let n1 = d
            .create_element("Shape", None, &attrs(json!({"id": "n1", "ports": {"items": []}})))
            .unwrap();
        d.insert(&n1, &Parent::Root);
        let port = d.create_element("Port", None, &attrs(json!({"id": "p1"}))).unwrap();
        d.insert(&port, &Parent::Element(n1));
        assert_eq!(d.graph().ports("n1"), vec![json!({"id": "p1"})]);

        d.patch_prop(&n1, "ports", None, Some(&value(json!({"items": [], "groups": {}}))));
        d.flush();
        assert_eq!(d.graph().ports("n1"), vec![json!({"id": "p1"})]);
    }

    #[test]
    fn test_dispose_releases_everything() {
        let mut d = dispatcher();
        let bus = d.graph().events();
        let n1 = d.create_element("Shape", None, &attrs(json!({"id": "n1"}))).unwrap();
        d.insert(&n1, &Parent::Root);
        assert!(!bus.is_empty());

        d.dispose();
        assert_eq!(d.live_count(), 0);
        assert!(bus.is_empty());
        assert!(d.graph().is_disposed());
    }
}
