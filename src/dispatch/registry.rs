use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::RequestContext;
use super::error::{ActionResult, DispatchError};
use crate::auth::Authenticator;

/// Process-wide collaborators injected into every resource instance
#[derive(Clone)]
pub struct Services {
    pub authenticator: Arc<dyn Authenticator>,
}

/// Signature shared by every dispatchable action
pub type ActionFn<R> = for<'a> fn(&'a mut R, &'a mut RequestContext) -> BoxFuture<'a, ActionResult>;

/// One dispatchable operation of a resource
pub struct Action<R> {
    pub name: &'static str,
    pub handler: ActionFn<R>,
    pub requires_authentication: bool,
}

impl<R> Action<R> {
    /// Action reachable without a logged-in session
    pub fn public(name: &'static str, handler: ActionFn<R>) -> Self {
        Self {
            name,
            handler,
            requires_authentication: false,
        }
    }

    /// Action guarded by the authentication gate
    pub fn protected(name: &'static str, handler: ActionFn<R>) -> Self {
        Self {
            name,
            handler,
            requires_authentication: true,
        }
    }
}

/// A family of actions addressed by the first path segment.
///
/// A fresh value is created for every dispatched request, so implementations
/// carry per-request state only.
pub trait Resource: Send + Sized + 'static {
    /// Type identifier; the lower-cased form is the first path segment
    const NAME: &'static str;

    fn create(services: &Services) -> Result<Self, DispatchError>;

    fn actions() -> Vec<Action<Self>>;
}

/// Type-erased "instantiate the resource, then run the action"
#[async_trait]
trait Invoke: Send + Sync {
    async fn invoke(&self, services: &Services, ctx: &mut RequestContext) -> ActionResult;
}

struct BoundAction<R: Resource> {
    handler: ActionFn<R>,
}

#[async_trait]
impl<R: Resource> Invoke for BoundAction<R> {
    async fn invoke(&self, services: &Services, ctx: &mut RequestContext) -> ActionResult {
        let mut resource = R::create(services)?;
        (self.handler)(&mut resource, ctx).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerKey {
    resource: String,
    action: String,
}

impl HandlerKey {
    pub fn new(resource: &str, action: &str) -> Self {
        Self {
            resource: resource.to_lowercase(),
            action: action.to_lowercase(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.action)
    }
}

pub struct HandlerDescriptor {
    resource_type: &'static str,
    action: &'static str,
    requires_authentication: bool,
    invoker: Box<dyn Invoke>,
}

impl HandlerDescriptor {
    /// Owning resource type identifier, e.g. `Register`
    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    pub fn requires_authentication(&self) -> bool {
        self.requires_authentication
    }

    /// Create a fresh resource value and run this action on it
    pub async fn invoke(&self, services: &Services, ctx: &mut RequestContext) -> ActionResult {
        self.invoker.invoke(services, ctx).await
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("resource_type", &self.resource_type)
            .field("action", &self.action)
            .field("requires_authentication", &self.requires_authentication)
            .finish_non_exhaustive()
    }
}

/// Immutable (resource, action) -> handler table
#[derive(Debug, Default)]
pub struct Registry {
    handlers: HashMap<HandlerKey, HandlerDescriptor>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Case-insensitive lookup; `None` on miss
    pub fn lookup(&self, resource: &str, action: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(&HandlerKey::new(resource, action))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// All entries, sorted by key
    pub fn entries(&self) -> Vec<(&HandlerKey, &HandlerDescriptor)> {
        let mut entries: Vec<_> = self.handlers.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Collects resource registrations; the first registration of a key wins
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<HandlerKey, HandlerDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource<R: Resource>(mut self) -> Self {
        for action in R::actions() {
            let key = HandlerKey::new(R::NAME, action.name);
            if self.handlers.contains_key(&key) {
                tracing::warn!(
                    "Duplicate handler registration for '{}' ignored ({}.{})",
                    key,
                    R::NAME,
                    action.name
                );
                continue;
            }

            tracing::debug!("Registered handler '{}' -> {}.{}", key, R::NAME, action.name);
            self.handlers.insert(
                key,
                HandlerDescriptor {
                    resource_type: R::NAME,
                    action: action.name,
                    requires_authentication: action.requires_authentication,
                    invoker: Box::new(BoundAction::<R> { handler: action.handler }),
                },
            );
        }
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            handlers: self.handlers,
        }
    }
}
