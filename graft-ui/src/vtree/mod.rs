pub mod components;
mod diff;

pub use diff::{KeyedDiffer, Mounted};

use crate::attrs::{Attr, AttrMap, Name};
use crate::events::CellEvent;
use crate::graph::{ID_KEY, PARENT_KEY, value_to_id};
use crate::identity::IdentityKey;
use serde_json::Value;

/// Kind tag of text leaves.
pub const TEXT_KIND: &str = "#text";
const TEXT_ATTR: &str = "text";

/// One entity description for one render pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VNode {
    pub kind: Name,
    /// Identity key; stamped by the root before diffing when left unset.
    pub key: Option<IdentityKey>,
    pub attrs: AttrMap,
    pub children: Vec<VNode>,
}

impl VNode {
    /// Empty element of `kind`.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Loose text; never reaches the model.
    pub fn text(text: &str) -> Self {
        Self::new(TEXT_KIND).prop(TEXT_ATTR, text)
    }

    /// Set the identity key explicitly.
    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the cell id, which is also the identity.
    pub fn id(self, id: &str) -> Self {
        self.prop(ID_KEY, id)
    }

    /// Declared parent cell, resolved by id when the node is attached.
    pub fn parent(self, parent: &str) -> Self {
        self.prop(PARENT_KEY, parent)
    }

    /// Set a plain value property.
    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), Attr::Value(value.into()));
        self
    }

    /// Boolean flag shorthand: the attribute is present with an empty value.
    pub fn flag(self, name: &str) -> Self {
        self.prop(name, "")
    }

    /// Set a raw attribute.
    pub fn attr(mut self, name: &str, attr: Attr) -> Self {
        self.attrs.insert(name.into(), attr);
        self
    }

    /// Subscribe `callback` as `on<Event>`; `event` is given without prefix.
    ///
    /// Labels, ports, tools and decorations have no cell of their own. Their
    /// handlers are bound to the owning cell and fire for every event of
    /// that cell, not only for the part they declare.
    pub fn on(self, event: &str, callback: impl Fn(&CellEvent) + 'static) -> Self {
        let mut chars = event.chars();
        let name = match chars.next() {
            Some(first) => format!("on{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => return self,
        };
        self.attr(&name, Attr::handler(callback))
    }

    /// Append one child node.
    pub fn child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append every node of `children`.
    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// The declared `id`, if it is a string or a number.
    pub fn explicit_id(&self) -> Option<Name> {
        self.attrs.get(ID_KEY)?.as_value().and_then(value_to_id)
    }

    pub fn is_text(&self) -> bool {
        self.kind.as_str() == TEXT_KIND
    }

    /// Text of a text node.
    pub fn text_content(&self) -> Option<&str> {
        self.attrs.get(TEXT_ATTR)?.as_value()?.as_str()
    }
}
