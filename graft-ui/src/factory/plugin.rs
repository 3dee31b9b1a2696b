use super::{EntityFactory, FactoryCx};
use crate::attrs::{AttrMap, PropMap, Split, split};
use crate::events::bind;
use crate::graph::Plugin;
use crate::identity::IdentityKey;
use crate::live::{LiveObject, LiveState, Owner, PluginState};
use serde_json::Value;
use std::rc::Rc;
use tracing::debug;

/// Builds a plugin from its options.
pub type PluginCtor = Rc<dyn Fn(&PropMap) -> Rc<dyn Plugin>>;

const ENABLED_KEY: &str = "enabled";

/// Plugin options: declared properties over `enabled: true`.
fn options(split: &Split) -> PropMap {
    let mut options = PropMap::new();
    options.insert(ENABLED_KEY.to_string(), Value::Bool(true));
    options.extend(split.props.clone());
    options
}

/// Behaviour plugins installed on the graph when inserted.
pub struct PluginFactory {
    ctor: PluginCtor,
}

impl PluginFactory {
    pub fn new(ctor: PluginCtor) -> Self {
        Self { ctor }
    }
}

impl EntityFactory for PluginFactory {
    fn create(
        &self,
        _cx: &mut FactoryCx<'_>,
        kind: &str,
        key: Option<&IdentityKey>,
        attrs: &AttrMap,
    ) -> Option<LiveObject> {
        let split = split(attrs);
        let plugin = (self.ctor)(&options(&split));
        let subscriptions = bind(None, &split.events, &plugin.events());
        debug!(%kind, plugin = plugin.name(), "plugin created");
        Some(LiveObject::new(
            kind,
            key,
            attrs.clone(),
            subscriptions,
            LiveState::Plugin(PluginState {
                plugin,
                installed: false,
            }),
        ))
    }

    fn attach_to_parent(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject, _container: Option<Owner>) {
        if let LiveState::Plugin(state) = &mut obj.state {
            if !state.installed {
                cx.graph.use_plugin(state.plugin.clone());
                state.installed = true;
            }
        }
    }

    fn patch(&self, _cx: &mut FactoryCx<'_>, obj: &mut LiveObject, next: &Split) {
        let LiveState::Plugin(state) = &obj.state else {
            return;
        };
        state.plugin.set_options(&options(next));
        obj.subscriptions.dispose();
        obj.subscriptions = bind(None, &next.events, &state.plugin.events());
    }

    fn remove(&self, cx: &mut FactoryCx<'_>, obj: &mut LiveObject) {
        obj.subscriptions.dispose();
        if let LiveState::Plugin(state) = &mut obj.state {
            if state.installed {
                cx.graph.remove_plugin(&state.plugin);
                state.installed = false;
            }
            debug!(plugin = state.plugin.name(), "plugin disposed");
            state.plugin.dispose();
        }
    }
}
