use crate::attrs::{Attr, AttrMap};
use crate::identity::IdentityKey;

/// Container an element is inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent<E> {
    /// The graph itself.
    Root,
    Element(E),
}

/// Host operations a declarative framework drives while applying a tree diff.
///
/// Every operation must tolerate elements that no longer exist; the framework
/// may still hold handles to objects the model removed on its own.
pub trait RendererBackend {
    type Element: Clone;

    /// Build the live object for `kind`. `None` for kinds the host does not
    /// know; the framework then treats the node as a transparent group.
    fn create_element(
        &mut self,
        kind: &str,
        key: Option<&IdentityKey>,
        attrs: &AttrMap,
    ) -> Option<Self::Element>;

    fn insert(&mut self, el: &Self::Element, parent: &Parent<Self::Element>);

    fn remove(&mut self, el: &Self::Element);

    /// One attribute changed. `next` is `None` when the attribute went away.
    fn patch_prop(
        &mut self,
        el: &Self::Element,
        key: &str,
        prev: Option<&Attr>,
        next: Option<&Attr>,
    );

    fn create_text(&mut self, text: &str) -> Option<Self::Element>;

    fn create_comment(&mut self, text: &str) -> Option<Self::Element>;

    fn set_text(&mut self, el: &Self::Element, text: &str);

    fn set_element_text(&mut self, el: &Self::Element, text: &str);

    fn parent_node(&self, el: &Self::Element) -> Option<Parent<Self::Element>>;

    fn next_sibling(&self, el: &Self::Element) -> Option<Self::Element>;

    /// Whether `el` still refers to a live object.
    fn is_live(&self, _el: &Self::Element) -> bool {
        true
    }

    /// Called once at the end of every diff burst.
    fn commit(&mut self) {}
}
