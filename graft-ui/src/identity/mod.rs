//! Stable identity keys for declarative nodes.
//!
//! A node with an explicit `id` is keyed by `(scope, kind, id)`. A node
//! without one is keyed by a hash of its properties inside its parent scope,
//! mapped to a token minted the first time that hash is seen. Connectors
//! without an explicit id never reuse a token: the engine may delete them on
//! its own when an endpoint goes away, so reusing the old identity would
//! point at a dead cell.

use crate::attrs::{Name, PropMap, split};
use crate::vtree::VNode;
use crate::vtree::components::is_connector;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use std::hash::{Hash, Hasher};
use tracing::trace;

pub type IdentityKey = Name;

/// Scope of nodes declared directly under the graph root.
pub const ROOT_SCOPE: &str = "$root";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FallbackKey {
    scope: Name,
    kind: Name,
    hash: u64,
}

/// Tokens minted for nodes without an explicit id. One table per root.
///
/// Tokens not resolved since the last [`sweep`](IdentityTable::sweep) are
/// dropped by it, so the table only holds identities of the current tree.
#[derive(Debug, Default)]
pub struct IdentityTable {
    tokens: FxHashMap<FallbackKey, IdentityKey>,
    seen: FxHashSet<FallbackKey>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens currently held.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drop every token, as on unmount.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.seen.clear();
    }

    /// Forget every token not resolved since the previous sweep.
    pub fn sweep(&mut self) {
        let seen = std::mem::take(&mut self.seen);
        let before = self.tokens.len();
        self.tokens.retain(|key, _| seen.contains(key));
        trace!(dropped = before - self.tokens.len(), "identity table swept");
    }
}

/// Deterministic hash of a property snapshot.
pub fn content_hash(props: &PropMap) -> u64 {
    let serialized = serde_json::to_string(props).unwrap_or_default();
    let mut hasher = FxHasher::default();
    serialized.hash(&mut hasher);
    hasher.finish()
}

fn fresh_token() -> IdentityKey {
    uuid::Uuid::new_v4().to_string().into()
}

/// Identity key of one node inside `scope`.
pub fn resolve(
    table: &mut IdentityTable,
    scope: &str,
    kind: &str,
    explicit_id: Option<&str>,
    props: &PropMap,
) -> IdentityKey {
    if let Some(id) = explicit_id {
        return format!("{scope}/{kind}#{id}").into();
    }
    if is_connector(kind) {
        return fresh_token();
    }
    let key = FallbackKey {
        scope: scope.into(),
        kind: kind.into(),
        hash: content_hash(props),
    };
    table.seen.insert(key.clone());
    table
        .tokens
        .entry(key)
        .or_insert_with(|| {
            let token = fresh_token();
            trace!(%scope, %kind, %token, "minted identity token");
            token
        })
        .clone()
}

/// Stamp identity keys on `nodes` and their descendants.
///
/// Keys already set on a node are kept. A node's key is the scope of its
/// children.
pub fn stamp(table: &mut IdentityTable, scope: &str, nodes: &mut [VNode]) {
    for node in nodes {
        if node.key.is_none() {
            let props = split(&node.attrs).props;
            let explicit = node.explicit_id();
            node.key = Some(resolve(table, scope, &node.kind, explicit.as_deref(), &props));
        }
        if let Some(key) = node.key.clone() {
            stamp(table, &key, &mut node.children);
        }
    }
}
