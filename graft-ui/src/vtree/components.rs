//! Declarative components exposed to applications.

use super::VNode;

pub const SHAPE: &str = "Shape";
pub const CONNECTOR: &str = "Connector";
/// Alias kept for trees written against engine naming.
pub const NODE: &str = "Node";
pub const EDGE: &str = "Edge";
pub const LABEL: &str = "Label";
pub const PORT: &str = "Port";
pub const PORT_GROUP: &str = "PortGroup";
pub const SOURCE_DECORATION: &str = "SourceDecoration";
pub const TARGET_DECORATION: &str = "TargetDecoration";
pub const SHAPE_TOOL: &str = "ShapeTool";
pub const CONNECTOR_TOOL: &str = "ConnectorTool";

/// Whether `kind` names a connector (`Connector` or `Edge`).
pub fn is_connector(kind: &str) -> bool {
    kind == CONNECTOR || kind == EDGE
}

/// A node cell.
pub fn shape() -> VNode {
    VNode::new(SHAPE)
}

/// An edge cell between `source` and `target`.
pub fn connector() -> VNode {
    VNode::new(CONNECTOR)
}

/// An entry in the owner's `labels` list.
pub fn label() -> VNode {
    VNode::new(LABEL)
}

/// An entry in the owner's `ports/items` list.
pub fn port() -> VNode {
    VNode::new(PORT)
}

/// The port group `name` of the owner.
pub fn port_group(name: &str) -> VNode {
    VNode::new(PORT_GROUP).prop("name", name)
}

/// The marker at the source end of the owning connector.
pub fn source_decoration(name: &str) -> VNode {
    VNode::new(SOURCE_DECORATION).prop("name", name)
}

/// The marker at the target end of the owning connector.
pub fn target_decoration(name: &str) -> VNode {
    VNode::new(TARGET_DECORATION).prop("name", name)
}

/// A tool entry on the owning shape.
pub fn shape_tool(name: &str) -> VNode {
    VNode::new(SHAPE_TOOL).prop("name", name)
}

/// A tool entry on the owning connector.
pub fn connector_tool(name: &str) -> VNode {
    VNode::new(CONNECTOR_TOOL).prop("name", name)
}

/// Wrapper for a plugin kind registered with `FactoryRegistry::register_plugin`.
pub fn plugin(kind: &str) -> VNode {
    VNode::new(kind)
}
