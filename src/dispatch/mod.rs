//! Path-based dispatch: `/{resource}/{action}/{args...}` to registered actions.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod resolve;

pub use context::RequestContext;
pub use dispatcher::{Dispatch, DispatchSettings, Dispatcher};
pub use error::{ActionResult, DispatchError};
pub use registry::{
    Action, ActionFn, HandlerDescriptor, HandlerKey, Registry, RegistryBuilder, Resource, Services,
};
pub use resolve::{Resolution, DEFAULT_ACTION};
