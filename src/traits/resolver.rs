//! Resolver traits for service resolution.

use std::any::type_name;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::{Generic, ServiceType};
use crate::registration::{downcast, downcast_all, downcast_trait, AnyArc};

/// Core resolver trait for object-safe service resolution.
///
/// Most users should use the [`Resolver`] trait instead, which provides
/// ergonomic generic methods built on top of this trait.
pub trait ResolverCore: Send + Sync {
    /// Resolves a service by its runtime identity.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - The resolved service
    /// * `Ok(None)` - Nothing is registered for `service_type`
    /// * `Err(DiError)` - Resolution failed (cycle, disposed scope, lifetime violation, ...)
    fn resolve_any(&self, service_type: &ServiceType) -> DiResult<Option<AnyArc>>;
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// Implemented for every [`ResolverCore`], so `ServiceProvider` and `Scope`
/// are interchangeable for resolution within their respective contexts.
///
/// # Examples
///
/// ```
/// use callsite_di::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// trait Logger: Send + Sync {
///     fn log(&self, msg: &str);
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: &str) {
///         println!("LOG: {}", msg);
///     }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(42usize);
/// collection.add_singleton_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
///
/// let provider = collection.build();
///
/// // Resolve concrete types
/// let number = provider.get_required::<usize>();
/// assert_eq!(*number, 42);
///
/// // Resolve trait objects
/// let logger = provider.get_required_trait::<dyn Logger>();
/// logger.log("Service resolved successfully");
///
/// // Optional resolution
/// assert!(provider.try_get::<String>().unwrap().is_none());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service, or `None` when it is not registered.
    fn try_get<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.resolve_any(&ServiceType::of::<T>())?
            .map(downcast::<T>)
            .transpose()
    }

    /// Resolves a concrete service type.
    ///
    /// The last registration of `T` wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{ServiceCollection, Resolver};
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton("configuration".to_string());
    ///
    /// let provider = collection.build();
    /// let config = provider.get::<String>().unwrap();
    /// assert_eq!(&*config, "configuration");
    /// ```
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.try_get::<T>()?
            .ok_or(DiError::NotFound(type_name::<T>()))
    }

    /// Resolves a concrete service type, panicking on failure.
    fn get_required<T: Send + Sync + 'static>(&self) -> Arc<T> {
        match self.get::<T>() {
            Ok(service) => service,
            Err(err) => panic!("Failed to resolve {}: {}", type_name::<T>(), err),
        }
    }

    /// Resolves a trait-object service, or `None` when it is not registered.
    fn try_get_trait<I: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<I>>> {
        self.resolve_any(&ServiceType::of::<I>())?
            .map(downcast_trait::<I>)
            .transpose()
    }

    /// Resolves a single trait implementation.
    ///
    /// Returns the most recently registered implementation for `I`. For
    /// accessing all implementations, use [`get_all_trait`](Self::get_all_trait).
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Database: Send + Sync {
    ///     fn connect(&self) -> &str;
    /// }
    ///
    /// struct PostgresDb;
    /// impl Database for PostgresDb {
    ///     fn connect(&self) -> &str { "postgres://..." }
    /// }
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton_trait(Arc::new(PostgresDb) as Arc<dyn Database>);
    ///
    /// let provider = collection.build();
    /// let db = provider.get_trait::<dyn Database>().unwrap();
    /// assert_eq!(db.connect(), "postgres://...");
    /// ```
    fn get_trait<I: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<I>> {
        self.try_get_trait::<I>()?
            .ok_or(DiError::NotFound(type_name::<I>()))
    }

    /// Resolves a trait-object service, panicking on failure.
    fn get_required_trait<I: ?Sized + Send + Sync + 'static>(&self) -> Arc<I> {
        match self.get_trait::<I>() {
            Ok(service) => service,
            Err(err) => panic!("Failed to resolve {}: {}", type_name::<I>(), err),
        }
    }

    /// Resolves every registration of a concrete service, in registration order.
    ///
    /// Returns an empty list when nothing is registered.
    fn get_all<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
        match self.resolve_any(&ServiceType::enumerable_of::<T>())? {
            Some(list) => downcast_all(list, downcast::<T>),
            None => Ok(Vec::new()),
        }
    }

    /// Resolves all registered implementations of a trait.
    ///
    /// # Examples
    ///
    /// ```
    /// use callsite_di::{ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// trait Plugin: Send + Sync {
    ///     fn name(&self) -> &str;
    /// }
    ///
    /// struct PluginA;
    /// impl Plugin for PluginA {
    ///     fn name(&self) -> &str { "Plugin A" }
    /// }
    ///
    /// struct PluginB;
    /// impl Plugin for PluginB {
    ///     fn name(&self) -> &str { "Plugin B" }
    /// }
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_singleton_trait(Arc::new(PluginA) as Arc<dyn Plugin>);
    /// collection.add_singleton_trait(Arc::new(PluginB) as Arc<dyn Plugin>);
    ///
    /// let provider = collection.build();
    /// let plugins = provider.get_all_trait::<dyn Plugin>().unwrap();
    /// let names: Vec<_> = plugins.iter().map(|p| p.name()).collect();
    /// assert_eq!(names, vec!["Plugin A", "Plugin B"]);
    /// ```
    fn get_all_trait<I: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<I>>> {
        match self.resolve_any(&ServiceType::enumerable_of::<I>())? {
            Some(list) => downcast_all(list, downcast_trait::<I>),
            None => Ok(Vec::new()),
        }
    }

    /// Resolves a closed generic service, specializing an open registration
    /// when no exact one exists.
    fn get_generic<T: Generic>(&self) -> DiResult<Arc<T>> {
        self.resolve_any(&ServiceType::generic::<T>())?
            .map(downcast::<T>)
            .transpose()?
            .ok_or(DiError::NotFound(type_name::<T>()))
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
