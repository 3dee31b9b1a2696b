mod dispatcher;
mod traits;

pub use dispatcher::Dispatcher;
pub use traits::{Parent, RendererBackend};
