//! Service provider module for dependency injection.
//!
//! This module contains the ServiceProvider type, scopes and activators
//! used to resolve registered services from the container.

use std::sync::Arc;

use crate::call_site::CallSite;
use crate::config::ServiceProviderOptions;
use crate::descriptors::ServiceDescriptor;
use crate::engine::Engine;
use crate::error::DiResult;
use crate::key::ServiceType;
use crate::registration::AnyArc;
use crate::traits::ResolverCore;

mod activator;
mod scope;

pub use activator::{ActivatorFactory, InstanceArgs, InstanceFactory, ServiceActivator};
pub use scope::{Scope, ScopeFactory, ScopeState};

/// Service provider for resolving dependencies from the DI container.
///
/// The `ServiceProvider` owns the root scope. Singletons are cached there,
/// scoped services are cached in the scopes created from it, and transients
/// are produced fresh on every resolution. Resolving directly from the
/// provider resolves from the root scope.
///
/// # Thread Safety
///
/// ServiceProvider is fully thread-safe and can be shared across multiple threads.
/// Concurrent first resolutions of a singleton produce a single instance,
/// and the provider can be cloned cheaply (it uses `Arc` internally).
///
/// # Reference cycles
///
/// A singleton that keeps the provider, or a [`Scope`] handle of the root,
/// is cached by the root it points to. Dropping every provider handle
/// leaves that cycle alive. Call [`dispose`](Self::dispose) (or
/// [`dispose_async`](Self::dispose_async)) before dropping the provider:
/// disposal clears the root cache and frees such singletons.
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(Database { url: "postgres://localhost".to_string() });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     Ok(UserService { db: resolver.get::<Database>()? })
/// });
///
/// let provider = collection.build();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
#[derive(Clone, Debug)]
pub struct ServiceProvider {
    root: Scope,
}

impl ServiceProvider {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self {
            root: Scope::new_root(engine),
        }
    }

    /// Creates a new scope for scoped services.
    pub fn create_scope(&self) -> Scope {
        self.root.create_scope()
    }

    /// The root scope, owner of singletons.
    pub fn root_scope(&self) -> &Scope {
        &self.root
    }

    pub fn scope_factory(&self) -> ScopeFactory {
        self.root.scope_factory()
    }

    pub fn activator_factory(&self) -> ActivatorFactory {
        self.root.activator_factory()
    }

    /// Disposes the root scope: singletons in reverse creation order.
    ///
    /// Child scopes are not disposed; they fail further resolutions of
    /// singletons once the root is gone.
    pub fn dispose(&self) -> DiResult<()> {
        self.root.dispose()
    }

    /// Disposes the root scope, awaiting async disposables.
    pub async fn dispose_async(&self) -> DiResult<()> {
        self.root.dispose_async().await
    }

    pub fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }

    /// Whether `service_type` is registered or provided by the container,
    /// without building or running anything.
    pub fn is_service(&self, service_type: &ServiceType) -> bool {
        self.root.engine().is_service(service_type)
    }

    /// The call-site graph built for `service_type`, if it is registered.
    pub fn call_site(&self, service_type: &ServiceType) -> DiResult<Option<Arc<CallSite>>> {
        self.root.engine().call_site(service_type)
    }

    pub fn options(&self) -> &ServiceProviderOptions {
        self.root.engine().options()
    }

    /// Registrations in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        self.root.engine().descriptors()
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>> {
        self.root.resolve_any(service_type)
    }
}

impl AsRef<Scope> for ServiceProvider {
    fn as_ref(&self) -> &Scope {
        &self.root
    }
}
