use super::VNode;
use crate::attrs::{AttrMap, Name};
use crate::identity::IdentityKey;
use crate::renderer::{Parent, RendererBackend};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// A node as it was last submitted, plus the element created for it.
#[derive(Debug, Clone)]
pub struct Mounted<E> {
    pub key: Option<IdentityKey>,
    pub kind: Name,
    pub attrs: AttrMap,
    pub element: Option<E>,
    pub children: Vec<Mounted<E>>,
}

/// Keyed child-list differ.
///
/// Children are matched by identity key and kind. Unmatched previous
/// children are removed first, then new children are created and inserted
/// and matched ones patched attribute by attribute, in tree order. There is
/// no move operation: the graph model has no sibling order.
pub struct KeyedDiffer<E> {
    mounted: Vec<Mounted<E>>,
}

impl<E: Clone> KeyedDiffer<E> {
    pub fn new() -> Self {
        Self {
            mounted: Vec::new(),
        }
    }

    /// Diff `next` against the previous submission and drive `backend`.
    pub fn render<B>(&mut self, backend: &mut B, next: &[VNode])
    where
        B: RendererBackend<Element = E>,
    {
        let previous = std::mem::take(&mut self.mounted);
        self.mounted = patch_children(backend, previous, next, &Parent::Root);
        backend.commit();
    }

    /// Top-level elements of the last committed tree.
    pub fn mounted(&self) -> &[Mounted<E>] {
        &self.mounted
    }

    /// Forget the previous submission without touching the backend.
    pub fn clear(&mut self) {
        self.mounted.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }
}

impl<E: Clone> Default for KeyedDiffer<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// `next` with duplicate keys collapsed: a later duplicate replaces the
/// earlier one in place.
fn dedupe(next: &[VNode]) -> Vec<&VNode> {
    let mut out: Vec<&VNode> = Vec::with_capacity(next.len());
    let mut positions: FxHashMap<&str, usize> = FxHashMap::default();
    for node in next {
        match node.key.as_deref() {
            Some(key) => match positions.get(key) {
                Some(&at) => {
                    debug!(%key, kind = %node.kind, "duplicate identity in one child list");
                    out[at] = node;
                }
                None => {
                    positions.insert(key, out.len());
                    out.push(node);
                }
            },
            None => out.push(node),
        }
    }
    out
}

fn patch_children<B: RendererBackend>(
    backend: &mut B,
    previous: Vec<Mounted<B::Element>>,
    next: &[VNode],
    parent: &Parent<B::Element>,
) -> Vec<Mounted<B::Element>> {
    let next = dedupe(next);
    let wanted: FxHashMap<&str, &str> = next
        .iter()
        .filter_map(|n| Some((n.key.as_deref()?, n.kind.as_str())))
        .collect();

    let mut reusable: FxHashMap<IdentityKey, Mounted<B::Element>> = FxHashMap::default();
    for entry in previous {
        let keep = match entry.key.as_deref() {
            Some(key) => {
                wanted.get(key) == Some(&entry.kind.as_str())
                    && entry.element.as_ref().is_none_or(|el| backend.is_live(el))
            }
            None => false,
        };
        match (keep, entry.key.clone()) {
            (true, Some(key)) => {
                reusable.insert(key, entry);
            }
            _ => unmount(backend, entry),
        }
    }

    next.into_iter()
        .map(|node| {
            match node.key.as_ref().and_then(|k| reusable.remove(k)) {
                Some(previous) => patch(backend, previous, node, parent),
                None => mount(backend, node, parent),
            }
        })
        .collect()
}

fn mount<B: RendererBackend>(
    backend: &mut B,
    node: &VNode,
    parent: &Parent<B::Element>,
) -> Mounted<B::Element> {
    let element = if node.is_text() {
        backend.create_text(node.text_content().unwrap_or_default())
    } else {
        backend.create_element(&node.kind, node.key.as_ref(), &node.attrs)
    };
    if let Some(el) = &element {
        backend.insert(el, parent);
    } else {
        trace!(kind = %node.kind, "no element created; children mount into the enclosing parent");
    }
    let child_parent = match &element {
        Some(el) => Parent::Element(el.clone()),
        None => parent.clone(),
    };
    let children = node
        .children
        .iter()
        .map(|child| mount(backend, child, &child_parent))
        .collect();
    Mounted {
        key: node.key.clone(),
        kind: node.kind.clone(),
        attrs: node.attrs.clone(),
        element,
        children,
    }
}

fn patch<B: RendererBackend>(
    backend: &mut B,
    previous: Mounted<B::Element>,
    node: &VNode,
    parent: &Parent<B::Element>,
) -> Mounted<B::Element> {
    let Mounted {
        element,
        attrs: before,
        children,
        ..
    } = previous;
    if let Some(el) = &element {
        if node.is_text() {
            let (old, new) = (text_of(&before), node.text_content());
            if old != new {
                backend.set_text(el, new.unwrap_or_default());
            }
        } else {
            for (key, next) in &node.attrs {
                let prev = before.get(key);
                if prev != Some(next) {
                    backend.patch_prop(el, key, prev, Some(next));
                }
            }
            for (key, prev) in &before {
                if !node.attrs.contains_key(key) {
                    backend.patch_prop(el, key, Some(prev), None);
                }
            }
        }
    }
    // Without an element the node is a transparent group.
    let child_parent = match &element {
        Some(el) => Parent::Element(el.clone()),
        None => parent.clone(),
    };
    let children = patch_children(backend, children, &node.children, &child_parent);
    Mounted {
        key: node.key.clone(),
        kind: node.kind.clone(),
        attrs: node.attrs.clone(),
        element,
        children,
    }
}

fn text_of(attrs: &AttrMap) -> Option<&str> {
    attrs.get("text")?.as_value()?.as_str()
}

fn unmount<B: RendererBackend>(backend: &mut B, entry: Mounted<B::Element>) {
    match &entry.element {
        // The backend releases the element's whole subtree.
        Some(el) => backend.remove(el),
        None => {
            for child in entry.children {
                unmount(backend, child);
            }
        }
    }
}
