use crate::attrs::PropMap;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_WIDTH: f64 = 800.0;
const DEFAULT_HEIGHT: f64 = 600.0;
const DEFAULT_COALESCE_DELAY_MS: u64 = 1;

/// Options handed to the graph engine when the root mounts.
///
/// `width`/`height` and `container` are understood by the root; every other
/// root property passes through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphOptions {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    /// Display surface to bind to. Created by the root when absent.
    #[serde(default)]
    pub container: Option<String>,
    #[serde(flatten)]
    pub extra: PropMap,
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_HEIGHT
}

impl GraphOptions {
    /// Graph options from the props given to the root.
    pub fn from_props(props: &PropMap) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(props.clone()))?)
    }
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            container: None,
            extra: PropMap::new(),
        }
    }
}

/// Tuning knobs for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Drain the patch coalescer at the end of every render burst.
    /// When off, the host drives application through `tick`/`flush`.
    pub flush_on_commit: bool,
    pub coalesce_delay_ms: u64,
}

impl ReconcilerConfig {
    /// Delay before a patch batch is due.
    pub fn coalesce_delay(&self) -> Duration {
        Duration::from_millis(self.coalesce_delay_ms)
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            flush_on_commit: true,
            coalesce_delay_ms: DEFAULT_COALESCE_DELAY_MS,
        }
    }
}
