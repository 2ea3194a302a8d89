//! Service collection module for dependency injection.
//!
//! This module contains the ServiceCollection type used to register services
//! and build service providers.

use std::any::type_name;
use std::sync::Arc;

use tracing::debug;

use crate::config::ServiceProviderOptions;
use crate::constructor::{Injectable, Produced};
use crate::descriptors::{FactoryFn, ServiceDescriptor};
use crate::engine::Engine;
use crate::error::DiResult;
use crate::key::ServiceType;
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::provider::{Scope, ServiceProvider};
use crate::registration::AnyArc;
use crate::traits::{AsyncDispose, Dispose};

/// Ordered list of service registrations.
///
/// Registration order matters: the last registration of a service type wins
/// for single resolution, and collection resolution yields every registration
/// in the order it was added.
#[derive(Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    observers: Observers,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            observers: Observers::new(),
        }
    }

    /// Appends a descriptor.
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Appends a descriptor unless its service type is already registered.
    ///
    /// Returns `true` if the descriptor was added.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{ServiceCollection, ServiceDescriptor, ServiceType};
    /// use std::sync::Arc;
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(42usize);
    ///
    /// let fallback = ServiceDescriptor::from_instance(
    ///     ServiceType::of::<usize>(),
    ///     "usize",
    ///     Arc::new(7usize),
    /// );
    /// assert!(!services.try_add(fallback));
    /// assert_eq!(services.len(), 1);
    /// ```
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        if self.contains(descriptor.service_type()) {
            return false;
        }
        self.descriptors.push(descriptor);
        true
    }

    /// Whether any registration serves `service_type` exactly.
    pub fn contains(&self, service_type: &ServiceType) -> bool {
        self.descriptors
            .iter()
            .any(|descriptor| descriptor.service_type() == service_type)
    }

    // ----- Instances -----

    /// Registers a singleton instance that will be shared across the entire application.
    ///
    /// The instance is owned by the caller's registration and is never
    /// disposed by the container.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add(ServiceDescriptor::from_instance(
            ServiceType::of::<T>(),
            type_name::<T>(),
            Arc::new(value),
        ))
    }

    /// Registers a singleton trait-object instance.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// trait Logger: Send + Sync {
    ///     fn log(&self, message: &str) -> String;
    /// }
    ///
    /// struct ConsoleLogger;
    /// impl Logger for ConsoleLogger {
    ///     fn log(&self, message: &str) -> String {
    ///         format!("[console] {message}")
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait::<dyn Logger>(Arc::new(ConsoleLogger));
    ///
    /// let provider = services.build();
    /// let logger = provider.get_required_trait::<dyn Logger>();
    /// assert_eq!(logger.log("hi"), "[console] hi");
    /// ```
    pub fn add_singleton_trait<I: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<I>) -> &mut Self {
        self.add(ServiceDescriptor::from_instance(
            ServiceType::of::<I>(),
            type_name::<I>(),
            Arc::new(value) as AnyArc,
        ))
    }

    // ----- Implementation types -----

    /// Registers `T`, activated by the container through its constructors.
    pub fn add_type<T: Injectable>(&mut self, lifetime: Lifetime) -> &mut Self {
        self.add(ServiceDescriptor::from_type::<T>(lifetime))
    }

    pub fn add_singleton_type<T: Injectable>(&mut self) -> &mut Self {
        self.add_type::<T>(Lifetime::Singleton)
    }

    pub fn add_scoped_type<T: Injectable>(&mut self) -> &mut Self {
        self.add_type::<T>(Lifetime::Scoped)
    }

    pub fn add_transient_type<T: Injectable>(&mut self) -> &mut Self {
        self.add_type::<T>(Lifetime::Transient)
    }

    /// Registers implementation `T` as trait-object service `I`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{Constructor, Injectable, Lifetime, Resolver, ServiceCollection};
    /// # use std::sync::Arc;
    /// trait Clock: Send + Sync {
    ///     fn now(&self) -> u64;
    /// }
    ///
    /// struct FixedClock;
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> u64 { 42 }
    /// }
    /// impl Injectable for FixedClock {
    ///     fn constructors() -> Vec<Constructor> {
    ///         vec![Constructor::of::<Self>().build(|_| Ok(FixedClock))]
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_trait_type::<dyn Clock, FixedClock>(Lifetime::Singleton, |clock| clock);
    ///
    /// let provider = services.build();
    /// assert_eq!(provider.get_required_trait::<dyn Clock>().now(), 42);
    /// ```
    pub fn add_trait_type<I, T>(&mut self, lifetime: Lifetime, cast: fn(Arc<T>) -> Arc<I>) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
        T: Injectable,
    {
        self.add(ServiceDescriptor::from_type_as::<I, T>(lifetime, cast))
    }

    /// Registers the open generic definition marked by `Def`.
    ///
    /// Every closed [`Generic`](crate::Generic) type naming `Def` as its
    /// definition can then be resolved without its own registration.
    pub fn add_open_generic<Def: ?Sized + 'static>(&mut self, lifetime: Lifetime) -> &mut Self {
        self.add(ServiceDescriptor::open_generic::<Def>(lifetime))
    }

    // ----- Factories -----

    /// Registers a factory for `T` with the given lifetime.
    ///
    /// The factory receives the scope the service is being resolved for and
    /// may resolve further services from it.
    pub fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |scope: &Scope| factory(scope).map(Produced::new));
        self.add(ServiceDescriptor::from_factory(
            ServiceType::of::<T>(),
            lifetime,
            type_name::<T>(),
            factory,
        ))
    }

    /// Registers a singleton factory that creates the instance on first request.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use callsite_di::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct UserService { db: Arc<Database> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_singleton_factory::<UserService, _>(|resolver| {
    ///     Ok(UserService {
    ///         db: resolver.get::<Database>()?
    ///     })
    /// });
    /// ```
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a scoped factory that creates one instance per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a transient factory that creates a new instance on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    /// Registers a factory producing trait-object service `I`.
    pub fn add_trait_factory<I, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(&Scope) -> DiResult<Arc<I>> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |scope: &Scope| {
            factory(scope).map(|value| Produced::shared(Arc::new(value)))
        });
        self.add(ServiceDescriptor::from_factory(
            ServiceType::of::<I>(),
            lifetime,
            type_name::<I>(),
            factory,
        ))
    }

    /// Registers a factory whose instances are disposed with their owning scope.
    pub fn add_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: Dispose,
        F: Fn(&Scope) -> DiResult<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn = Arc::new(move |scope: &Scope| factory(scope).map(Produced::disposable));
        self.add(ServiceDescriptor::from_factory(
            ServiceType::of::<T>(),
            lifetime,
            type_name::<T>(),
            factory,
        ))
    }

    /// Registers a factory whose instances need async disposal.
    pub fn add_async_disposable_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: AsyncDispose,
        F: Fn(&Scope) -> DiResult<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn =
            Arc::new(move |scope: &Scope| factory(scope).map(Produced::async_disposable));
        self.add(ServiceDescriptor::from_factory(
            ServiceType::of::<T>(),
            lifetime,
            type_name::<T>(),
            factory,
        ))
    }

    // ----- Observation and introspection -----

    /// Adds a diagnostic observer notified by the built provider.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Registrations in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Owned copy of all registrations, for introspection and diagnostics.
    pub fn get_service_descriptors(&self) -> Vec<ServiceDescriptor> {
        self.descriptors.clone()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    // ----- Building -----

    /// Builds a provider with default options.
    ///
    /// Registrations are not validated; problems surface on first resolution
    /// of the affected service.
    pub fn build(self) -> ServiceProvider {
        let engine = Engine::new(self.descriptors, ServiceProviderOptions::default(), self.observers);
        ServiceProvider::new(Arc::new(engine))
    }

    /// Builds a provider with `options`.
    ///
    /// With `validate_on_build` every registration's graph is built (and,
    /// with `validate_scopes`, checked for captive dependencies) and all
    /// failures are returned together as [`DiError::Aggregate`](crate::DiError::Aggregate).
    pub fn build_with_options(self, options: ServiceProviderOptions) -> DiResult<ServiceProvider> {
        debug!(
            registrations = self.descriptors.len(),
            observers = self.observers.len(),
            "building provider"
        );
        let engine = Engine::new(self.descriptors, options, self.observers);
        if options.validate_on_build {
            engine.validate_descriptors()?;
        }
        Ok(ServiceProvider::new(Arc::new(engine)))
    }
}

impl Extend<ServiceDescriptor> for ServiceCollection {
    fn extend<I: IntoIterator<Item = ServiceDescriptor>>(&mut self, iter: I) {
        self.descriptors.extend(iter);
    }
}
